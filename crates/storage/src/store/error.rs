#![forbid(unsafe_code)]

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    VersionConflict {
        expected: i64,
        actual: i64,
    },
    UnknownId,
    AlreadyExists,
    HierarchyCycle,
    HierarchyDepthExceeded,
    DependencyCycle,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::VersionConflict { expected, actual } => {
                write!(f, "version conflict (expected={expected}, actual={actual})")
            }
            Self::UnknownId => write!(f, "unknown id"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::HierarchyCycle => write!(f, "task hierarchy cycle"),
            Self::HierarchyDepthExceeded => write!(f, "task hierarchy depth exceeded"),
            Self::DependencyCycle => write!(f, "dependency cycle"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}
