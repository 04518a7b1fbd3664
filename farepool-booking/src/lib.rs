pub mod mock;
pub mod orchestrator;
pub mod webhook;

pub use mock::MockGateway;
pub use orchestrator::{
    AcceptOutcome, BookingFailure, BookingOrchestrator, BookingReceipt, CancellationOutcome,
    CompletionReport, CreateBookingRequest, RideCancellationReport,
};
pub use webhook::{WebhookDisposition, WebhookEnvelope, WebhookKind};
