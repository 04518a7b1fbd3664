use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A passenger request never spans more than one row of a car.
pub const MAX_SEATS_PER_BOOKING: u32 = 8;

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Active bookings hold seats; terminal ones do not.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Completed
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Authorized,
    Captured,
    Cancelled,
    Refunded,
    Failed,
}

impl PaymentStatus {
    /// Terminal payments are immutable, except Captured which may still
    /// move to Refunded.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Cancelled | PaymentStatus::Refunded | PaymentStatus::Failed
        )
    }

    /// Legal lifecycle edges. Everything not listed here, in particular any
    /// move out of a terminal state or a downgrade of a captured charge, is
    /// rejected by the store.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (
                PaymentStatus::Authorized,
                PaymentStatus::Captured | PaymentStatus::Cancelled | PaymentStatus::Failed
            ) | (PaymentStatus::Captured, PaymentStatus::Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Authorized => "AUTHORIZED",
            PaymentStatus::Captured => "CAPTURED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(u32),

    #[error("price must not be negative, got {0}")]
    InvalidPrice(i64),

    #[error("seat count must be between 1 and {max}, got {requested}")]
    InvalidSeatCount { requested: u32, max: u32 },

    #[error("amount must not be negative, got {0}")]
    InvalidAmount(i64),

    #[error("platform fee {fee} outside 0..={amount}")]
    InvalidFee { fee: i64, amount: i64 },
}

/// A driver's published ride. `available_seats` is the only field mutated
/// concurrently; the store serializes its updates per ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub capacity: u32,
    pub available_seats: u32,
    pub price_per_seat_cents: i64,
    pub departure_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_cancelled: bool,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn new(
        driver_id: Uuid,
        capacity: u32,
        price_per_seat_cents: i64,
        departure_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if capacity == 0 {
            return Err(DomainError::InvalidCapacity(capacity));
        }
        if price_per_seat_cents < 0 {
            return Err(DomainError::InvalidPrice(price_per_seat_cents));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            capacity,
            available_seats: capacity,
            price_per_seat_cents,
            departure_at,
            is_active: true,
            is_cancelled: false,
            is_completed: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Open for new bookings: active and not in a terminal state.
    pub fn is_open(&self) -> bool {
        self.is_active && !self.is_cancelled && !self.is_completed
    }

    pub fn mark_cancelled(&mut self) {
        self.is_active = false;
        self.is_cancelled = true;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        self.is_active = false;
        self.is_completed = true;
        self.updated_at = Utc::now();
    }
}

/// A passenger's seat request on a ride
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub seats: u32,
    pub status: BookingStatus,
    /// Gateway reference for the passenger's stored payment method, captured
    /// at creation. None means the degraded cash-on-board path.
    pub payment_method_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        ride_id: Uuid,
        passenger_id: Uuid,
        seats: u32,
        payment_method_ref: Option<String>,
    ) -> Result<Self, DomainError> {
        if seats == 0 || seats > MAX_SEATS_PER_BOOKING {
            return Err(DomainError::InvalidSeatCount {
                requested: seats,
                max: MAX_SEATS_PER_BOOKING,
            });
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            ride_id,
            passenger_id,
            seats,
            status: BookingStatus::Pending,
            payment_method_ref,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Money held or moved for one booking. One-to-one with the booking once an
/// authorization succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub driver_amount_cents: i64,
    pub status: PaymentStatus,
    pub gateway_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        booking_id: Uuid,
        amount_cents: i64,
        platform_fee_cents: i64,
        gateway_reference: String,
    ) -> Result<Self, DomainError> {
        if amount_cents < 0 {
            return Err(DomainError::InvalidAmount(amount_cents));
        }
        if platform_fee_cents < 0 || platform_fee_cents > amount_cents {
            return Err(DomainError::InvalidFee {
                fee: platform_fee_cents,
                amount: amount_cents,
            });
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            booking_id,
            amount_cents,
            platform_fee_cents,
            driver_amount_cents: amount_cents - platform_fee_cents,
            status: PaymentStatus::Authorized,
            gateway_reference,
            created_at: now,
            updated_at: now,
        })
    }
}
