pub mod error;
pub mod payment;
pub mod repository;

pub use error::{BookingError, ConflictError, RepoError};
pub use payment::{
    AuthorizeRequest, AuthorizationStatus, GatewayAuthorization, GatewayCharge, GatewayChargeStatus,
    GatewayConfig, GatewayError, PaymentGateway, RefundReceipt,
};
pub use repository::{BookingRepository, PaymentRepository, RideRepository};
