pub mod inventory;
pub mod models;
pub mod penalty;
pub mod state_machine;

pub use inventory::{InventoryError, SeatInventory};
pub use models::{Booking, BookingStatus, Payment, PaymentStatus, Ride};
pub use penalty::{PenaltyBreakdown, PenaltyPolicy};
pub use state_machine::{BookingEvent, BookingStateMachine, TransitionError};
