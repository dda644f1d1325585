pub mod allocator;
pub mod key_lifecycle;
pub mod percentage;
pub mod schedule;

pub use allocator::*;
pub use key_lifecycle::*;
pub use percentage::*;
pub use schedule::*;
