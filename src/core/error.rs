use thiserror::Error;

/// Portable classification of a backend failure.
///
/// Drivers map their native codes onto these kinds so the orchestrator can
/// react to a condition without knowing which database produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// The statement referenced a database (schema) that is not selected or attached.
    UnknownDatabase,
    /// The statement referenced a table that does not exist.
    MissingTable,
    /// A NOT NULL, UNIQUE, CHECK or key constraint rejected the statement.
    Constraint,
    Other,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unknown entity type '{0}'")]
    UnknownEntity(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Query build error: {0}")]
    QueryBuild(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query execution failed ({kind:?}): {message} (SQL = {sql})")]
    QueryExecution {
        kind: ExecutionErrorKind,
        code: Option<i32>,
        message: String,
        sql: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Token for '{entity}.{field}' could not be generated after {attempts} attempts")]
    ExhaustedRetries {
        entity: String,
        field: String,
        attempts: u32,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn execution(kind: ExecutionErrorKind, message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::QueryExecution {
            kind,
            code: None,
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Kind of the execution failure, if this is one.
    pub fn execution_kind(&self) -> Option<ExecutionErrorKind> {
        match self {
            Self::QueryExecution { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_unknown_database(&self) -> bool {
        self.execution_kind() == Some(ExecutionErrorKind::UnknownDatabase)
    }

    /// Whether the caller can reasonably fix the input and try again.
    ///
    /// Connection, configuration and unclassified execution failures are fatal
    /// for the current request.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnknownEntity(_)
            | Self::Validation(_)
            | Self::State(_)
            | Self::ExhaustedRetries { .. } => true,
            Self::QueryExecution { kind, .. } => *kind == ExecutionErrorKind::Constraint,
            Self::Schema(_) | Self::QueryBuild(_) | Self::Connection(_) | Self::Config(_) => false,
        }
    }
}
