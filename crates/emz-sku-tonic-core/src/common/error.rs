//! Error type for the gRPC surface.
//!
//! Wraps [`emz_sku::Error`] and implements `From<Error>` for
//! [`tonic::Status`] so handlers can return core errors with `?`.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Allocation, derivation or storage failed.
    #[error(transparent)]
    Sku(#[from] emz_sku::Error),

    /// A request arrived while the service was shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Sku(err) => sku_status(&err),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

fn sku_status(err: &emz_sku::Error) -> Status {
    let message = err.to_string();
    match err {
        emz_sku::Error::Validation { .. } => Status::invalid_argument(message),
        emz_sku::Error::StorageUnavailable { .. } => Status::unavailable(message),
        emz_sku::Error::AllocationTimedOut { .. } => Status::deadline_exceeded(message),
        emz_sku::Error::InvariantViolation { .. } => Status::data_loss(message),
        emz_sku::Error::ItemNotFound { .. } => Status::not_found(message),
        _ => Status::internal(message),
    }
}
