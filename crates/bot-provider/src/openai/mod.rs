pub mod adapter;

pub use adapter::OpenAiAdapter;
