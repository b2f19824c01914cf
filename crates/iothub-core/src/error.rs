use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

/// The seven error kinds a reply-subject or log line can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    NotFound,
    Conflict,
    Transport,
    Adapter,
    Invariant,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transport => "transport",
            ErrorKind::Adapter => "adapter",
            ErrorKind::Invariant => "invariant",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    #[error("update already in process for node {0}")]
    UpdateInProgress(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("adapter error: {0}")]
    Adapter(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Which of the seven error kinds this maps to, for reply encoding and logging.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HubError::Encode(_) => ErrorKind::Decode,
            HubError::NodeNotFound(_) | HubError::EdgeNotFound(_) => ErrorKind::NotFound,
            HubError::InvalidEdge { .. } | HubError::UpdateInProgress(_) => ErrorKind::Conflict,
            HubError::Transport(_) => ErrorKind::Transport,
            HubError::Adapter(_) => ErrorKind::Adapter,
            HubError::Invariant(_) => ErrorKind::Invariant,
            HubError::Storage(_)
            | HubError::Database(_)
            | HubError::Table(_)
            | HubError::Transaction(_)
            | HubError::Commit(_)
            | HubError::StorageOperation(_)
            | HubError::Internal(_) => ErrorKind::Internal,
        }
    }
}
