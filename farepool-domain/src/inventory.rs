use crate::models::Ride;

/// Seat accounting for a ride. Pure counter arithmetic; callers provide the
/// per-ride serialization (the store applies these under its lock).
pub struct SeatInventory;

impl SeatInventory {
    /// Reserve seats on a ride. Fails without mutating when fewer seats are
    /// available than requested.
    pub fn reserve(ride: &mut Ride, seats: u32) -> Result<(), InventoryError> {
        if seats > ride.available_seats {
            return Err(InventoryError::InsufficientSeats {
                requested: seats,
                available: ride.available_seats,
            });
        }
        ride.available_seats -= seats;
        ride.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Return seats to a ride, clamped at capacity so a duplicate release
    /// can never overflow the counter.
    pub fn release(ride: &mut Ride, seats: u32) {
        ride.available_seats = ride.capacity.min(ride.available_seats + seats);
        ride.updated_at = chrono::Utc::now();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },
}
