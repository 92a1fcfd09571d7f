use thiserror::Error;

/// Errors surfaced by the conversation & notification engine.
///
/// The storage layer works in `anyhow::Result`; any of these variants raised
/// below it travel inside the `anyhow::Error` and are recovered by the
/// `From<anyhow::Error>` impl.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// A stored conversation is neither private nor group. Corrupt data,
    /// never a caller mistake.
    #[error("unsupported conversation kind '{0}'")]
    UnsupportedConversationKind(String),

    #[error("push channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("concurrent modification, retry the operation")]
    ConcurrentModification,

    #[error("wrong join password")]
    WrongJoinPassword,

    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CoreError>() {
            Ok(core) => core,
            Err(other) => Self::Storage(format!("{:#}", other)),
        }
    }
}
