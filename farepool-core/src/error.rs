use crate::payment::GatewayError;
use farepool_domain::{BookingStatus, PaymentStatus};
use uuid::Uuid;

/// Storage-layer failures. The store is responsible for the two atomic
/// operations this core depends on: the conditional seat decrement and the
/// compare-and-swap on booking status.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },

    #[error("passenger {passenger_id} already has an active booking on ride {ride_id}")]
    DuplicateActiveBooking { ride_id: Uuid, passenger_id: Uuid },

    /// Compare-and-swap lost: the booking was not in the expected status.
    #[error("booking status is {current}, expected {expected}")]
    StatusConflict {
        current: BookingStatus,
        expected: BookingStatus,
    },

    /// The payment lifecycle table forbids this edge; terminal payments are
    /// immutable and a captured charge only moves to refunded.
    #[error("payment is {current}, cannot move to {next}")]
    PaymentStateConflict {
        current: PaymentStatus,
        next: PaymentStatus,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Conflicts are never retried automatically; the caller must re-fetch state
/// and decide.
#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },

    #[error("passenger already has an active booking on this ride")]
    DuplicateActiveBooking,

    #[error("booking is {current}, transition not allowed")]
    InvalidTransition { current: BookingStatus },

    #[error("payment is {current}, cannot move to {next}")]
    PaymentTransition {
        current: PaymentStatus,
        next: PaymentStatus,
    },

    #[error("ride is no longer open for booking")]
    RideClosed,
}

/// Caller-facing error taxonomy for every orchestrator operation
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("payment failed: {0}")]
    Payment(#[from] GatewayError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("not authorized: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for BookingError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { kind, id } => BookingError::NotFound { kind, id },
            RepoError::InsufficientSeats {
                requested,
                available,
            } => BookingError::Conflict(ConflictError::InsufficientSeats {
                requested,
                available,
            }),
            RepoError::DuplicateActiveBooking { .. } => {
                BookingError::Conflict(ConflictError::DuplicateActiveBooking)
            }
            RepoError::StatusConflict { current, .. } => {
                BookingError::Conflict(ConflictError::InvalidTransition { current })
            }
            RepoError::PaymentStateConflict { current, next } => {
                BookingError::Conflict(ConflictError::PaymentTransition { current, next })
            }
            RepoError::Storage(msg) => BookingError::Internal(msg),
        }
    }
}
