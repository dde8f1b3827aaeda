pub mod oracle;
pub mod prompts;
pub mod transcriber;

pub use oracle::*;
pub use prompts::*;
pub use transcriber::*;
