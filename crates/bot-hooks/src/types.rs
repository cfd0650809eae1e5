use bot_core::types::{BotInput, BotOutput};

/// Context handed to every post-reply hook: the original input and the
/// output that was (or would have been) delivered through the transport.
#[derive(Debug, Clone)]
pub struct PostReplyContext {
    pub input: BotInput,
    pub output: BotOutput,
    /// Present only when the reply was actually sent through a transport;
    /// absent for the synchronous no-transport path.
    pub delivered: bool,
}
