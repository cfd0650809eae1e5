pub mod engine;
pub mod error;
pub mod types;

pub use engine::{HookEngine, PostReplyHook};
pub use error::{HookError, Result};
pub use types::PostReplyContext;
