pub mod classify;
pub mod context;
pub mod dedup;
pub mod repair;

pub use classify::*;
pub use context::*;
pub use dedup::*;
pub use repair::*;
