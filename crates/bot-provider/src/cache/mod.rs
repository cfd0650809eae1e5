pub mod fingerprint;
pub mod kv;
pub mod store;

pub use fingerprint::{bot_fingerprint, estimate_tokens, global_intuition_fingerprint};
pub use kv::DistributedKv;
pub use store::ContextCacheStore;
