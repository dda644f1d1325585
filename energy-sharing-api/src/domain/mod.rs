pub mod allocation_key;
pub mod consumption;
pub mod sharing_operation;
pub mod tenant;

pub use allocation_key::*;
pub use consumption::*;
pub use sharing_operation::*;
pub use tenant::*;
