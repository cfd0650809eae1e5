pub mod adapter;
pub mod history;
pub mod wire;

pub use adapter::GeminiAdapter;
