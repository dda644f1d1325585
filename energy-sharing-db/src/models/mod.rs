pub mod allocation_key;
pub mod identifiable;
pub mod sharing_operation;

pub use allocation_key::*;
pub use identifiable::*;
pub use sharing_operation::*;
