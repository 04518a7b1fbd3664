use crate::orchestrator::BookingOrchestrator;
use farepool_core::error::BookingError;
use farepool_domain::{BookingStatus, PaymentStatus};
use serde::Deserialize;
use tracing::{info, warn};

/// Gateway webhook envelope, the provider's JSON shape
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: IntentObject,
}

#[derive(Debug, Deserialize)]
pub struct IntentObject {
    /// The intent id, matched against Payment.gateway_reference
    pub id: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    Succeeded,
    Failed,
    Canceled,
}

impl WebhookEnvelope {
    pub fn kind(&self) -> Option<WebhookKind> {
        match self.type_.as_str() {
            "payment.succeeded" => Some(WebhookKind::Succeeded),
            "payment.failed" => Some(WebhookKind::Failed),
            "payment.canceled" => Some(WebhookKind::Canceled),
            _ => None,
        }
    }
}

/// What ingestion did with an event. Duplicate deliveries land on
/// `AlreadyApplied` and change nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDisposition {
    Applied,
    AlreadyApplied,
    Ignored,
}

impl BookingOrchestrator {
    /// Reconcile local payment state against an asynchronous gateway event.
    /// The synchronous call path may have returned before the gateway's
    /// authoritative state settled (capture timeout); this is where that gap
    /// closes. Idempotent: re-delivery of an applied event is a no-op.
    pub async fn ingest_webhook(
        &self,
        event: &WebhookEnvelope,
    ) -> Result<WebhookDisposition, BookingError> {
        let kind = match event.kind() {
            Some(k) => k,
            None => {
                info!(event_type = %event.type_, "ignoring unhandled webhook type");
                return Ok(WebhookDisposition::Ignored);
            }
        };

        let intent_id = &event.data.object.id;
        let payment = match self.payments.get_payment_by_reference(intent_id).await? {
            Some(p) => p,
            None => {
                warn!(intent_id = %intent_id, "webhook for unknown payment reference");
                return Ok(WebhookDisposition::Ignored);
            }
        };

        // Serialize against an in-flight accept/cancel on the same booking,
        // then re-read the payment the lock now protects.
        let lock = self.booking_lock(payment.booking_id).await;
        let _guard = lock.lock().await;
        let payment = match self.payments.get_payment_by_reference(intent_id).await? {
            Some(p) => p,
            None => return Ok(WebhookDisposition::Ignored),
        };

        match kind {
            WebhookKind::Succeeded => {
                if payment.status == PaymentStatus::Captured {
                    return Ok(WebhookDisposition::AlreadyApplied);
                }
                if payment.status != PaymentStatus::Authorized {
                    warn!(
                        payment_id = %payment.id,
                        status = ?payment.status,
                        "succeeded webhook for payment in unexpected state"
                    );
                    return Ok(WebhookDisposition::Ignored);
                }
                self.payments
                    .update_payment_status(payment.id, PaymentStatus::Captured)
                    .await?;
                info!(payment_id = %payment.id, "payment captured via webhook");

                // A capture confirmation finishes a deferred accept
                let booking = self.bookings.get_booking(payment.booking_id).await?;
                if booking.status == BookingStatus::Pending {
                    match self
                        .bookings
                        .update_booking_status(
                            booking.id,
                            BookingStatus::Pending,
                            BookingStatus::Accepted,
                            false,
                        )
                        .await
                    {
                        Ok(()) => info!(booking_id = %booking.id, "booking accepted via webhook"),
                        Err(e) => {
                            warn!(booking_id = %booking.id, error = %e, "webhook accept lost the status race")
                        }
                    }
                } else if booking.status.is_terminal() {
                    // Money was charged for a booking that already closed;
                    // needs a person to look at it
                    warn!(
                        booking_id = %booking.id,
                        status = %booking.status,
                        "capture confirmed for a closed booking, manual follow-up required"
                    );
                }
                Ok(WebhookDisposition::Applied)
            }
            WebhookKind::Failed => {
                if payment.status == PaymentStatus::Failed {
                    return Ok(WebhookDisposition::AlreadyApplied);
                }
                if payment.status != PaymentStatus::Authorized {
                    return Ok(WebhookDisposition::Ignored);
                }
                self.payments
                    .update_payment_status(payment.id, PaymentStatus::Failed)
                    .await?;
                info!(payment_id = %payment.id, "payment marked failed via webhook");
                Ok(WebhookDisposition::Applied)
            }
            WebhookKind::Canceled => {
                if payment.status == PaymentStatus::Cancelled {
                    return Ok(WebhookDisposition::AlreadyApplied);
                }
                if payment.status != PaymentStatus::Authorized {
                    return Ok(WebhookDisposition::Ignored);
                }
                self.payments
                    .update_payment_status(payment.id, PaymentStatus::Cancelled)
                    .await?;
                info!(payment_id = %payment.id, "payment marked cancelled via webhook");
                Ok(WebhookDisposition::Applied)
            }
        }
    }
}
