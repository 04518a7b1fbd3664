use crate::error::RepoError;
use async_trait::async_trait;
use farepool_domain::{Booking, BookingStatus, Payment, PaymentStatus, Ride};
use uuid::Uuid;

/// Repository trait for ride data access. `reserve_seats` is the per-ride
/// serialization point: two concurrent reservations that together exceed
/// availability must not both succeed.
#[async_trait]
pub trait RideRepository: Send + Sync {
    async fn create_ride(&self, ride: &Ride) -> Result<(), RepoError>;

    async fn get_ride(&self, id: Uuid) -> Result<Ride, RepoError>;

    /// Atomically decrement available seats, failing with
    /// `InsufficientSeats` when the ride cannot hold the request.
    async fn reserve_seats(&self, ride_id: Uuid, seats: u32) -> Result<(), RepoError>;

    /// Return seats to the ride, clamped at capacity.
    async fn release_seats(&self, ride_id: Uuid, seats: u32) -> Result<(), RepoError>;

    async fn set_ride_cancelled(&self, ride_id: Uuid) -> Result<(), RepoError>;

    async fn set_ride_completed(&self, ride_id: Uuid) -> Result<(), RepoError>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a new booking. Fails with `DuplicateActiveBooking` when the
    /// passenger already has a PENDING or ACCEPTED booking on the ride.
    async fn create_booking(&self, booking: &Booking) -> Result<(), RepoError>;

    async fn get_booking(&self, id: Uuid) -> Result<Booking, RepoError>;

    /// Compare-and-swap on status. Fails with `StatusConflict` when the
    /// stored status does not match `expected`; this is the transition guard
    /// the orchestrator relies on. When `release_seats` is true the booking's
    /// seats are returned to its ride in the same atomic unit, so a losing
    /// CAS never releases anything.
    async fn update_booking_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        release_seats: bool,
    ) -> Result<(), RepoError>;

    /// Remove a booking. Only used by the create saga's rollback, before the
    /// booking was ever visible to the driver.
    async fn delete_booking(&self, id: Uuid) -> Result<(), RepoError>;

    async fn list_bookings_for_ride(
        &self,
        ride_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, RepoError>;
}

/// Repository trait for payment data access
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Persist a payment for a booking. A dead prior payment (FAILED or
    /// CANCELLED) is replaced; an active one is a storage error, since the
    /// orchestrator never authorizes twice for a live payment.
    async fn create_payment(&self, payment: &Payment) -> Result<(), RepoError>;

    async fn get_payment_for_booking(&self, booking_id: Uuid)
        -> Result<Option<Payment>, RepoError>;

    /// Lookup by gateway reference, the key webhooks carry.
    async fn get_payment_by_reference(&self, reference: &str)
        -> Result<Option<Payment>, RepoError>;

    /// Advance the payment along its lifecycle table. Fails with
    /// `PaymentStateConflict` on any edge `PaymentStatus::can_transition_to`
    /// forbids, so terminal rows are never rewritten.
    async fn update_payment_status(&self, id: Uuid, next: PaymentStatus) -> Result<(), RepoError>;
}
