// crates/lmnh-core/src/error.rs

use thiserror::Error;

use crate::types::InteractionKind;

/// A lookup table had no row for the identifier derived from a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no exhibition with public id '{public_id}'")]
    Exhibition { public_id: String },

    #[error("no {kind} row with {kind}_value = {value}")]
    Value { kind: InteractionKind, value: i16 },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether the backend itself is gone, as opposed to a single statement failing.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            StorageError::Sqlx(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            StorageError::Unavailable(_) => true,
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_count_as_connection_loss() {
        assert!(StorageError::Sqlx(sqlx::Error::PoolClosed).is_connection_loss());
        assert!(StorageError::Unavailable("down".into()).is_connection_loss());
        assert!(!StorageError::Sqlx(sqlx::Error::RowNotFound).is_connection_loss());
    }

    #[test]
    fn resolution_messages_name_the_identifier() {
        let err = ResolutionError::Exhibition {
            public_id: "EXH_09".into(),
        };
        assert_eq!(err.to_string(), "no exhibition with public id 'EXH_09'");

        let err = ResolutionError::Value {
            kind: InteractionKind::Request,
            value: 1,
        };
        assert_eq!(err.to_string(), "no request row with request_value = 1");
    }
}
