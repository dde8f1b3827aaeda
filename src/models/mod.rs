pub mod repair;
pub mod roster;
pub mod segment;
pub mod window;

pub use repair::*;
pub use roster::*;
pub use segment::*;
pub use window::*;
