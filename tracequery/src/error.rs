//! Error classification shared by the HTTP and gRPC surfaces.

use http::StatusCode;
use thiserror::Error;
use tonic::Code;

use tracequery_storage::StorageError;

/// Classified errors surfaced by the query service.
///
/// Each variant maps onto one HTTP status and one gRPC code; the mapping
/// is the single place the two surfaces agree on. Adjuster warnings are
/// not errors: they ride along with successful responses.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A request parameter failed to parse or validate.
    #[error("unable to parse param '{name}': {cause}")]
    InvalidParameter { name: String, cause: String },

    /// The request is structurally invalid beyond a single parameter.
    #[error("{0}")]
    InvalidArgument(String),

    /// Tenant or credential checks failed.
    #[error("{0}")]
    Unauthorized(String),

    /// The requested trace does not exist in any configured store.
    #[error("trace not found")]
    NotFound,

    /// An archive operation was requested but no archive storage is
    /// configured.
    #[error("archive storage is not configured")]
    NoArchiveStorage,

    /// A metrics query was requested but no metrics reader is configured.
    #[error("metrics querying is not configured")]
    MetricsDisabled,

    /// A storage backend failed.
    #[error("{0}")]
    Internal(String),
}

impl QueryError {
    /// Convenience constructor for parameter errors.
    pub fn invalid_param(name: &str, cause: impl ToString) -> Self {
        QueryError::InvalidParameter {
            name: name.to_owned(),
            cause: cause.to_string(),
        }
    }

    /// The HTTP status this error maps to.
    pub fn http_status(&self) -> StatusCode {
        match self {
            QueryError::InvalidParameter { .. } | QueryError::InvalidArgument(_) => {
                StatusCode::BAD_REQUEST
            }
            QueryError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            QueryError::NotFound => StatusCode::NOT_FOUND,
            QueryError::NoArchiveStorage | QueryError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            QueryError::MetricsDisabled => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// The gRPC status code this error maps to.
    pub fn grpc_code(&self) -> Code {
        match self {
            QueryError::InvalidParameter { .. } | QueryError::InvalidArgument(_) => {
                Code::InvalidArgument
            }
            QueryError::Unauthorized(_) => Code::Unauthenticated,
            QueryError::NotFound => Code::NotFound,
            QueryError::NoArchiveStorage => Code::FailedPrecondition,
            QueryError::MetricsDisabled => Code::Unimplemented,
            QueryError::Internal(_) => Code::Internal,
        }
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TraceNotFound => QueryError::NotFound,
            StorageError::Internal(cause) => QueryError::Internal(cause),
        }
    }
}

impl From<QueryError> for tonic::Status {
    fn from(err: QueryError) -> Self {
        tonic::Status::new(err.grpc_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_errors_name_the_offending_parameter() {
        let err = QueryError::invalid_param("minDuration", "invalid duration");
        assert_eq!(
            err.to_string(),
            "unable to parse param 'minDuration': invalid duration"
        );
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.grpc_code(), Code::InvalidArgument);
    }

    #[test]
    fn storage_not_found_keeps_its_identity() {
        let err: QueryError = StorageError::TraceNotFound.into();
        assert!(matches!(err, QueryError::NotFound));
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(err.grpc_code(), Code::NotFound);
    }

    #[test]
    fn archive_and_internal_map_to_500() {
        assert_eq!(
            QueryError::NoArchiveStorage.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(QueryError::NoArchiveStorage.grpc_code(), Code::FailedPrecondition);
        assert_eq!(
            QueryError::Internal("backend down".into()).http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
