use async_trait::async_trait;
use farepool_core::error::RepoError;
use farepool_core::repository::{BookingRepository, PaymentRepository, RideRepository};
use farepool_domain::{
    Booking, BookingStatus, Payment, PaymentStatus, Ride, SeatInventory,
};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct StoreInner {
    rides: HashMap<Uuid, Ride>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
}

/// In-memory reference implementation of the repository contracts. The store
/// lock plays the role of the database's row-level locking: seat decrements
/// and status compare-and-swaps are atomic under it. Gateway calls never
/// happen while it is held.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideRepository for MemoryStore {
    async fn create_ride(&self, ride: &Ride) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        inner.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn get_ride(&self, id: Uuid) -> Result<Ride, RepoError> {
        let inner = self.inner.lock().await;
        inner
            .rides
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound { kind: "ride", id })
    }

    async fn reserve_seats(&self, ride_id: Uuid, seats: u32) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        let ride = inner
            .rides
            .get_mut(&ride_id)
            .ok_or(RepoError::NotFound { kind: "ride", id: ride_id })?;

        SeatInventory::reserve(ride, seats).map_err(|e| match e {
            farepool_domain::InventoryError::InsufficientSeats {
                requested,
                available,
            } => RepoError::InsufficientSeats {
                requested,
                available,
            },
        })
    }

    async fn release_seats(&self, ride_id: Uuid, seats: u32) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        let ride = inner
            .rides
            .get_mut(&ride_id)
            .ok_or(RepoError::NotFound { kind: "ride", id: ride_id })?;
        SeatInventory::release(ride, seats);
        Ok(())
    }

    async fn set_ride_cancelled(&self, ride_id: Uuid) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        let ride = inner
            .rides
            .get_mut(&ride_id)
            .ok_or(RepoError::NotFound { kind: "ride", id: ride_id })?;
        ride.mark_cancelled();
        Ok(())
    }

    async fn set_ride_completed(&self, ride_id: Uuid) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        let ride = inner
            .rides
            .get_mut(&ride_id)
            .ok_or(RepoError::NotFound { kind: "ride", id: ride_id })?;
        ride.mark_completed();
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_booking(&self, booking: &Booking) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;

        let duplicate = inner.bookings.values().any(|b| {
            b.ride_id == booking.ride_id
                && b.passenger_id == booking.passenger_id
                && b.status.is_active()
        });
        if duplicate {
            return Err(RepoError::DuplicateActiveBooking {
                ride_id: booking.ride_id,
                passenger_id: booking.passenger_id,
            });
        }

        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Booking, RepoError> {
        let inner = self.inner.lock().await;
        inner
            .bookings
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound { kind: "booking", id })
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        release_seats: bool,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or(RepoError::NotFound { kind: "booking", id })?;

        if booking.status != expected {
            return Err(RepoError::StatusConflict {
                current: booking.status,
                expected,
            });
        }

        booking.status = next;
        booking.updated_at = chrono::Utc::now();

        if release_seats {
            let (ride_id, seats) = (booking.ride_id, booking.seats);
            if let Some(ride) = inner.rides.get_mut(&ride_id) {
                SeatInventory::release(ride, seats);
            }
        }
        Ok(())
    }

    async fn delete_booking(&self, id: Uuid) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        inner
            .bookings
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound { kind: "booking", id })
    }

    async fn list_bookings_for_ride(
        &self,
        ride_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, RepoError> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id && status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn create_payment(&self, payment: &Payment) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;

        let prior: Vec<Uuid> = inner
            .payments
            .values()
            .filter(|p| p.booking_id == payment.booking_id)
            .map(|p| {
                if p.status == PaymentStatus::Failed || p.status == PaymentStatus::Cancelled {
                    Ok(p.id)
                } else {
                    Err(RepoError::Storage(format!(
                        "booking {} already has an active payment",
                        payment.booking_id
                    )))
                }
            })
            .collect::<Result<_, _>>()?;

        for id in prior {
            inner.payments.remove(&id);
        }
        inner.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get_payment_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<Payment>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.booking_id == booking_id)
            .cloned())
    }

    async fn get_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.gateway_reference == reference)
            .cloned())
    }

    async fn update_payment_status(&self, id: Uuid, next: PaymentStatus) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        let payment = inner
            .payments
            .get_mut(&id)
            .ok_or(RepoError::NotFound { kind: "payment", id })?;
        if !payment.status.can_transition_to(next) {
            return Err(RepoError::PaymentStateConflict {
                current: payment.status,
                next,
            });
        }
        payment.status = next;
        payment.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn seeded_ride(store: &MemoryStore, capacity: u32) -> Ride {
        let ride = Ride::new(Uuid::new_v4(), capacity, 1000, Utc::now()).unwrap();
        store.create_ride(&ride).await.unwrap();
        ride
    }

    #[tokio::test]
    async fn test_reserve_seats_is_conditional() {
        let store = MemoryStore::new();
        let ride = seeded_ride(&store, 2).await;

        store.reserve_seats(ride.id, 2).await.unwrap();
        let err = store.reserve_seats(ride.id, 1).await.unwrap_err();
        assert!(matches!(err, RepoError::InsufficientSeats { .. }));

        assert_eq!(store.get_ride(ride.id).await.unwrap().available_seats, 0);
    }

    #[tokio::test]
    async fn test_duplicate_active_booking_rejected() {
        let store = MemoryStore::new();
        let ride = seeded_ride(&store, 4).await;
        let passenger = Uuid::new_v4();

        let first = Booking::new(ride.id, passenger, 1, None).unwrap();
        store.create_booking(&first).await.unwrap();

        let second = Booking::new(ride.id, passenger, 1, None).unwrap();
        let err = store.create_booking(&second).await.unwrap_err();
        assert!(matches!(err, RepoError::DuplicateActiveBooking { .. }));

        // A cancelled booking frees the slot
        store
            .update_booking_status(
                first.id,
                BookingStatus::Pending,
                BookingStatus::Cancelled,
                true,
            )
            .await
            .unwrap();
        store.create_booking(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_cas_loses_on_mismatch() {
        let store = MemoryStore::new();
        let ride = seeded_ride(&store, 4).await;
        let booking = Booking::new(ride.id, Uuid::new_v4(), 1, None).unwrap();
        store.create_booking(&booking).await.unwrap();

        store
            .update_booking_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Accepted,
                false,
            )
            .await
            .unwrap();

        let err = store
            .update_booking_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Accepted,
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::StatusConflict {
                current: BookingStatus::Accepted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_losing_cas_releases_nothing() {
        let store = MemoryStore::new();
        let ride = seeded_ride(&store, 4).await;
        let booking = Booking::new(ride.id, Uuid::new_v4(), 2, None).unwrap();
        store.reserve_seats(ride.id, 2).await.unwrap();
        store.create_booking(&booking).await.unwrap();

        store
            .update_booking_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Cancelled,
                true,
            )
            .await
            .unwrap();
        assert_eq!(store.get_ride(ride.id).await.unwrap().available_seats, 4);

        // Second cancel loses the CAS and must not release again
        let err = store
            .update_booking_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Cancelled,
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::StatusConflict { .. }));
        assert_eq!(store.get_ride(ride.id).await.unwrap().available_seats, 4);
    }

    #[tokio::test]
    async fn test_payment_terminal_states_locked() {
        let store = MemoryStore::new();
        let payment = Payment::new(Uuid::new_v4(), 2000, 200, "pi_1".to_string()).unwrap();
        store.create_payment(&payment).await.unwrap();

        store
            .update_payment_status(payment.id, PaymentStatus::Captured)
            .await
            .unwrap();

        // A captured charge is never downgraded; refund is the only exit
        let err = store
            .update_payment_status(payment.id, PaymentStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::PaymentStateConflict {
                current: PaymentStatus::Captured,
                next: PaymentStatus::Failed,
            }
        ));

        store
            .update_payment_status(payment.id, PaymentStatus::Refunded)
            .await
            .unwrap();
        let err = store
            .update_payment_status(payment.id, PaymentStatus::Authorized)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::PaymentStateConflict { .. }));
    }

    #[tokio::test]
    async fn test_payment_replacement_rules() {
        let store = MemoryStore::new();
        let booking_id = Uuid::new_v4();

        let payment = Payment::new(booking_id, 2000, 200, "pi_1".to_string()).unwrap();
        store.create_payment(&payment).await.unwrap();

        // Active payment blocks a second authorization
        let again = Payment::new(booking_id, 2000, 200, "pi_2".to_string()).unwrap();
        assert!(store.create_payment(&again).await.is_err());

        // A failed one is replaced
        store
            .update_payment_status(payment.id, PaymentStatus::Failed)
            .await
            .unwrap();
        store.create_payment(&again).await.unwrap();

        let found = store.get_payment_by_reference("pi_2").await.unwrap();
        assert_eq!(found.unwrap().id, again.id);
        assert!(store
            .get_payment_by_reference("pi_1")
            .await
            .unwrap()
            .is_none());
    }
}
