use chrono::{DateTime, Utc};
use farepool_core::error::{BookingError, ConflictError};
use farepool_core::payment::{
    AuthorizationStatus, AuthorizeRequest, GatewayCharge, GatewayChargeStatus, GatewayConfig,
    GatewayError, PaymentGateway,
};
use farepool_core::repository::{BookingRepository, PaymentRepository, RideRepository};
use farepool_domain::models::MAX_SEATS_PER_BOOKING;
use farepool_domain::{
    penalty, Booking, BookingEvent, BookingStateMachine, BookingStatus, Payment, PaymentStatus,
    PenaltyBreakdown, PenaltyPolicy, Ride,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub seats: u32,
    /// Gateway reference of the passenger's stored payment method. None
    /// selects the degraded cash-on-board path.
    pub payment_method_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub payment: Option<Payment>,
}

#[derive(Debug, Serialize)]
pub struct AcceptOutcome {
    pub booking: Booking,
    pub payment: Option<Payment>,
}

#[derive(Debug, Serialize)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub penalty: Option<PenaltyBreakdown>,
    pub refund_issued: bool,
    /// Refund failure kept for manual follow-up; never blocks cancellation
    pub refund_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingFailure {
    pub booking_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct CompletionReport {
    pub completed: Vec<Uuid>,
    pub capture_failures: Vec<BookingFailure>,
    pub pending_cancelled: Vec<Uuid>,
}

#[derive(Debug, Default, Serialize)]
pub struct RideCancellationReport {
    pub cancelled: Vec<Uuid>,
    pub refund_failures: Vec<BookingFailure>,
}

/// Entry point for every booking and payment operation. Sequences each
/// multi-step flow as a saga: cheap local steps first, gateway calls outside
/// any seat-accounting lock, compensation when a later step fails.
pub struct BookingOrchestrator {
    pub(crate) rides: Arc<dyn RideRepository>,
    pub(crate) bookings: Arc<dyn BookingRepository>,
    pub(crate) payments: Arc<dyn PaymentRepository>,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) gateway_config: GatewayConfig,
    pub(crate) penalty_policy: PenaltyPolicy,
    pub(crate) platform_fee_percent: u32,
    booking_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl BookingOrchestrator {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        gateway_config: GatewayConfig,
        penalty_policy: PenaltyPolicy,
        platform_fee_percent: u32,
    ) -> Self {
        Self {
            rides,
            bookings,
            payments,
            gateway,
            gateway_config,
            penalty_policy,
            platform_fee_percent,
            booking_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Serialize the flows that pair a gateway call with a status change on
    /// one booking. The store's compare-and-swap guards the transition
    /// itself, but without this lock two callers could both pass the
    /// precheck and both reach the gateway before either swap lands.
    pub(crate) async fn booking_lock(&self, booking_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.booking_locks.lock().await;
        locks.entry(booking_id).or_default().clone()
    }

    /// Publish a new ride for a driver.
    pub async fn publish_ride(
        &self,
        driver_id: Uuid,
        capacity: u32,
        price_per_seat_cents: i64,
        departure_at: DateTime<Utc>,
    ) -> Result<Ride, BookingError> {
        let ride = Ride::new(driver_id, capacity, price_per_seat_cents, departure_at)
            .map_err(|e| BookingError::Validation(e.to_string()))?;
        self.rides.create_ride(&ride).await?;
        info!(ride_id = %ride.id, capacity, "ride published");
        Ok(ride)
    }

    /// Create a booking: reserve seats, persist the PENDING booking, then
    /// authorize payment. Any authorization failure rolls the whole thing
    /// back; the booking is never left visible without its seats or its
    /// money accounted for.
    pub async fn create_booking(
        &self,
        req: CreateBookingRequest,
    ) -> Result<BookingReceipt, BookingError> {
        if req.seats == 0 || req.seats > MAX_SEATS_PER_BOOKING {
            return Err(BookingError::Validation(format!(
                "seat count must be between 1 and {}",
                MAX_SEATS_PER_BOOKING
            )));
        }

        let ride = self.rides.get_ride(req.ride_id).await?;
        if !ride.is_open() {
            return Err(ConflictError::RideClosed.into());
        }
        if ride.driver_id == req.passenger_id {
            return Err(BookingError::Validation(
                "driver cannot book their own ride".to_string(),
            ));
        }

        // Seats first: the reservation is cheap and local, and the store
        // serializes it per ride. The gateway round trip happens afterwards.
        self.rides.reserve_seats(req.ride_id, req.seats).await?;

        let booking = match Booking::new(
            req.ride_id,
            req.passenger_id,
            req.seats,
            req.payment_method_ref.clone(),
        ) {
            Ok(b) => b,
            Err(e) => {
                self.release_quietly(req.ride_id, req.seats).await;
                return Err(BookingError::Validation(e.to_string()));
            }
        };

        if let Err(e) = self.bookings.create_booking(&booking).await {
            self.release_quietly(req.ride_id, req.seats).await;
            return Err(e.into());
        }

        let mut payment = None;
        if let Some(method) = &req.payment_method_ref {
            match self.authorize_for(&ride, &booking, method).await {
                Ok(p) => payment = Some(p),
                Err(err) => {
                    warn!(
                        booking_id = %booking.id,
                        error = %err,
                        "authorization failed, rolling back booking"
                    );
                    if let Err(e) = self.bookings.delete_booking(booking.id).await {
                        error!(booking_id = %booking.id, error = %e, "rollback: delete failed");
                    }
                    self.release_quietly(req.ride_id, req.seats).await;
                    return Err(err);
                }
            }
        }

        info!(
            booking_id = %booking.id,
            ride_id = %ride.id,
            seats = req.seats,
            "booking created"
        );
        Ok(BookingReceipt { booking, payment })
    }

    /// Driver accepts a booking. Payment is settled first (capture of the
    /// existing hold, or a fresh authorize+capture); only then does the
    /// status advance. On payment failure the booking stays PENDING with its
    /// seats held, so the driver can retry once the passenger sorts out the
    /// payment method.
    pub async fn accept_booking(
        &self,
        booking_id: Uuid,
        caller: Uuid,
    ) -> Result<AcceptOutcome, BookingError> {
        let lock = self.booking_lock(booking_id).await;
        let _guard = lock.lock().await;

        let booking = self.bookings.get_booking(booking_id).await?;
        let ride = self.rides.get_ride(booking.ride_id).await?;
        if ride.driver_id != caller {
            return Err(BookingError::Forbidden(
                "only the ride's driver may accept a booking".to_string(),
            ));
        }
        BookingStateMachine::next(booking.status, BookingEvent::Accept).map_err(|_| {
            ConflictError::InvalidTransition {
                current: booking.status,
            }
        })?;

        let payment = self.settle_payment_for_accept(&ride, &booking).await?;

        self.bookings
            .update_booking_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Accepted,
                false,
            )
            .await?;
        info!(booking_id = %booking.id, "booking accepted");

        let booking = self.bookings.get_booking(booking_id).await?;
        Ok(AcceptOutcome { booking, payment })
    }

    /// Driver rejects a pending booking. The hold is released best-effort,
    /// the seats go back, the booking ends REJECTED.
    pub async fn reject_booking(
        &self,
        booking_id: Uuid,
        caller: Uuid,
    ) -> Result<Booking, BookingError> {
        let lock = self.booking_lock(booking_id).await;
        let _guard = lock.lock().await;

        let booking = self.bookings.get_booking(booking_id).await?;
        let ride = self.rides.get_ride(booking.ride_id).await?;
        if ride.driver_id != caller {
            return Err(BookingError::Forbidden(
                "only the ride's driver may reject a booking".to_string(),
            ));
        }
        BookingStateMachine::next(booking.status, BookingEvent::Reject).map_err(|_| {
            ConflictError::InvalidTransition {
                current: booking.status,
            }
        })?;

        self.void_authorization(&booking).await;

        self.bookings
            .update_booking_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::Rejected,
                true,
            )
            .await?;
        info!(booking_id = %booking.id, "booking rejected");

        self.bookings.get_booking(booking_id).await.map_err(Into::into)
    }

    /// Passenger or driver cancels a booking. Pre-capture the hold is
    /// released; post-capture the time-based penalty applies and the net
    /// amount is refunded. The local cancellation never waits on a refund:
    /// the seat must go back on the market promptly even when the gateway
    /// misbehaves.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        caller: Uuid,
    ) -> Result<CancellationOutcome, BookingError> {
        let lock = self.booking_lock(booking_id).await;
        let _guard = lock.lock().await;

        let booking = self.bookings.get_booking(booking_id).await?;
        let ride = self.rides.get_ride(booking.ride_id).await?;
        if caller != booking.passenger_id && caller != ride.driver_id {
            return Err(BookingError::Forbidden(
                "only the passenger or the driver may cancel a booking".to_string(),
            ));
        }
        let from = booking.status;
        BookingStateMachine::next(from, BookingEvent::Cancel)
            .map_err(|_| ConflictError::InvalidTransition { current: from })?;

        let (penalty, refund_issued, refund_error) = self.unwind_payment(&booking, &ride).await;

        self.bookings
            .update_booking_status(booking.id, from, BookingStatus::Cancelled, true)
            .await?;
        info!(booking_id = %booking.id, refund_issued, "booking cancelled");

        let booking = self.bookings.get_booking(booking_id).await?;
        Ok(CancellationOutcome {
            booking,
            penalty,
            refund_issued,
            refund_error,
        })
    }

    /// Driver marks the ride as done. Every ACCEPTED booking's payment is
    /// captured if it was not already; capture failures are collected
    /// per-booking and reported, and the ride is completed regardless.
    /// Leftover PENDING requests are cancelled, since a completed ride can
    /// never accept them.
    pub async fn complete_ride(
        &self,
        ride_id: Uuid,
        caller: Uuid,
    ) -> Result<CompletionReport, BookingError> {
        let ride = self.rides.get_ride(ride_id).await?;
        if ride.driver_id != caller {
            return Err(BookingError::Forbidden(
                "only the driver may complete the ride".to_string(),
            ));
        }
        if !ride.is_open() {
            return Err(ConflictError::RideClosed.into());
        }

        let mut report = CompletionReport::default();

        let accepted = self
            .bookings
            .list_bookings_for_ride(ride_id, Some(BookingStatus::Accepted))
            .await?;
        for booking in accepted {
            let lock = self.booking_lock(booking.id).await;
            let _guard = lock.lock().await;
            let booking = match self.bookings.get_booking(booking.id).await {
                Ok(b) if b.status == BookingStatus::Accepted => b,
                Ok(_) => continue,
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "booking vanished during completion");
                    continue;
                }
            };
            match self.capture_outstanding(&booking).await {
                Ok(()) => {
                    let advanced = self
                        .bookings
                        .update_booking_status(
                            booking.id,
                            BookingStatus::Accepted,
                            BookingStatus::Completed,
                            false,
                        )
                        .await;
                    match advanced {
                        Ok(()) => report.completed.push(booking.id),
                        Err(e) => report.capture_failures.push(BookingFailure {
                            booking_id: booking.id,
                            reason: e.to_string(),
                        }),
                    }
                }
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "capture failed at ride completion");
                    report.capture_failures.push(BookingFailure {
                        booking_id: booking.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let pending = self
            .bookings
            .list_bookings_for_ride(ride_id, Some(BookingStatus::Pending))
            .await?;
        for booking in pending {
            let lock = self.booking_lock(booking.id).await;
            let _guard = lock.lock().await;
            let booking = match self.bookings.get_booking(booking.id).await {
                Ok(b) if b.status == BookingStatus::Pending => b,
                _ => continue,
            };
            self.void_authorization(&booking).await;
            let cancelled = self
                .bookings
                .update_booking_status(
                    booking.id,
                    BookingStatus::Pending,
                    BookingStatus::Cancelled,
                    true,
                )
                .await;
            match cancelled {
                Ok(()) => report.pending_cancelled.push(booking.id),
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "failed to cancel pending booking")
                }
            }
        }

        self.rides.set_ride_completed(ride_id).await?;
        info!(
            ride_id = %ride_id,
            completed = report.completed.len(),
            failures = report.capture_failures.len(),
            "ride completed"
        );
        Ok(report)
    }

    /// Driver cancels the whole ride. Every active booking is cancelled with
    /// a full refund and no penalty; the passengers did nothing wrong.
    pub async fn cancel_ride(
        &self,
        ride_id: Uuid,
        caller: Uuid,
    ) -> Result<RideCancellationReport, BookingError> {
        let ride = self.rides.get_ride(ride_id).await?;
        if ride.driver_id != caller {
            return Err(BookingError::Forbidden(
                "only the driver may cancel the ride".to_string(),
            ));
        }
        if !ride.is_open() {
            return Err(ConflictError::RideClosed.into());
        }

        let mut report = RideCancellationReport::default();

        let bookings = self.bookings.list_bookings_for_ride(ride_id, None).await?;
        for booking in bookings {
            let lock = self.booking_lock(booking.id).await;
            let _guard = lock.lock().await;
            let booking = match self.bookings.get_booking(booking.id).await {
                Ok(b) if b.status.is_active() => b,
                _ => continue,
            };
            let from = booking.status;

            match self.payments.get_payment_for_booking(booking.id).await {
                Ok(Some(p)) if p.status == PaymentStatus::Authorized => {
                    self.void_authorization(&booking).await;
                }
                Ok(Some(p)) if p.status == PaymentStatus::Captured => {
                    match self.gateway.refund(&p.gateway_reference, p.amount_cents).await {
                        Ok(receipt) => {
                            info!(
                                payment_id = %p.id,
                                refund_id = %receipt.id,
                                "full refund issued for driver-cancelled ride"
                            );
                            if let Err(e) = self
                                .payments
                                .update_payment_status(p.id, PaymentStatus::Refunded)
                                .await
                            {
                                warn!(payment_id = %p.id, error = %e, "failed to record refund");
                            }
                        }
                        Err(e) => {
                            error!(payment_id = %p.id, error = %e, "refund failed, flagging for follow-up");
                            report.refund_failures.push(BookingFailure {
                                booking_id: booking.id,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "payment lookup failed during ride cancellation")
                }
            }

            let cancelled = self
                .bookings
                .update_booking_status(booking.id, from, BookingStatus::Cancelled, true)
                .await;
            match cancelled {
                Ok(()) => report.cancelled.push(booking.id),
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "failed to cancel booking during ride cancellation")
                }
            }
        }

        self.rides.set_ride_cancelled(ride_id).await?;
        info!(ride_id = %ride_id, cancelled = report.cancelled.len(), "ride cancelled");
        Ok(report)
    }

    // ---- payment steps -------------------------------------------------

    async fn authorize_for(
        &self,
        ride: &Ride,
        booking: &Booking,
        method: &str,
    ) -> Result<Payment, BookingError> {
        let amount = ride.price_per_seat_cents * i64::from(booking.seats);
        let mut metadata = HashMap::new();
        metadata.insert("booking_id".to_string(), booking.id.to_string());
        metadata.insert("ride_id".to_string(), ride.id.to_string());

        let auth = self
            .gateway
            .authorize(AuthorizeRequest {
                amount_cents: amount,
                currency: self.gateway_config.currency.clone(),
                payment_method_ref: method.to_string(),
                payer_ref: booking.passenger_id,
                payout_account_ref: None,
                metadata,
            })
            .await?;

        if auth.status != AuthorizationStatus::RequiresCapture {
            return Err(BookingError::Payment(GatewayError::Declined(format!(
                "authorization ended in {:?}",
                auth.status
            ))));
        }

        let payment = Payment::new(booking.id, amount, self.platform_fee(amount), auth.id)
            .map_err(|e| BookingError::Internal(e.to_string()))?;
        self.payments.create_payment(&payment).await?;
        Ok(payment)
    }

    async fn settle_payment_for_accept(
        &self,
        ride: &Ride,
        booking: &Booking,
    ) -> Result<Option<Payment>, BookingError> {
        let payment = match self.payments.get_payment_for_booking(booking.id).await? {
            // Webhook reconciliation already settled the charge
            Some(p) if p.status == PaymentStatus::Captured => return Ok(Some(p)),
            Some(p) if p.status == PaymentStatus::Authorized => p,
            _ => match &booking.payment_method_ref {
                Some(method) => self.authorize_for(ride, booking, method).await?,
                // Degraded but allowed: no payment method on file
                None => return Ok(None),
            },
        };
        self.capture_payment(payment).await.map(Some)
    }

    async fn capture_payment(&self, mut payment: Payment) -> Result<Payment, BookingError> {
        match self.gateway.capture(&payment.gateway_reference).await {
            Ok(GatewayCharge {
                status: GatewayChargeStatus::Succeeded,
            }) => {
                self.payments
                    .update_payment_status(payment.id, PaymentStatus::Captured)
                    .await?;
                payment.status = PaymentStatus::Captured;
                Ok(payment)
            }
            Ok(GatewayCharge {
                status: GatewayChargeStatus::Failed,
            }) => {
                self.mark_payment_failed(&payment).await;
                Err(BookingError::Payment(GatewayError::Declined(
                    "capture failed".to_string(),
                )))
            }
            Err(e) if e.is_unknown_outcome() => {
                // The charge may have landed; leave the payment AUTHORIZED
                // and let the webhook settle it instead of guessing.
                warn!(
                    payment_id = %payment.id,
                    "capture timed out, awaiting webhook reconciliation"
                );
                Err(BookingError::Payment(e))
            }
            Err(e) => {
                self.mark_payment_failed(&payment).await;
                Err(BookingError::Payment(e))
            }
        }
    }

    /// Record a failed charge. The store rejects the write when the payment
    /// already settled (a webhook can capture it concurrently), and a
    /// CAPTURED row must never be downgraded, so rejection is only logged.
    async fn mark_payment_failed(&self, payment: &Payment) {
        if let Err(e) = self
            .payments
            .update_payment_status(payment.id, PaymentStatus::Failed)
            .await
        {
            warn!(payment_id = %payment.id, error = %e, "could not record failed charge");
        }
    }

    async fn capture_outstanding(&self, booking: &Booking) -> Result<(), BookingError> {
        match self.payments.get_payment_for_booking(booking.id).await? {
            Some(p) if p.status == PaymentStatus::Authorized => {
                self.capture_payment(p).await.map(|_| ())
            }
            // Already captured, or the cash path
            _ => Ok(()),
        }
    }

    /// Best-effort release of a hold. The gateway expires unreleased holds
    /// on its own, so failures are logged rather than propagated.
    pub(crate) async fn void_authorization(&self, booking: &Booking) {
        let payment = match self.payments.get_payment_for_booking(booking.id).await {
            Ok(Some(p)) if p.status == PaymentStatus::Authorized => p,
            Ok(_) => return,
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "payment lookup failed while voiding hold");
                return;
            }
        };
        if let Err(e) = self.gateway.cancel_authorization(&payment.gateway_reference).await {
            warn!(
                payment_id = %payment.id,
                error = %e,
                "cancel-authorization failed, hold will expire at the gateway"
            );
        }
        if let Err(e) = self
            .payments
            .update_payment_status(payment.id, PaymentStatus::Cancelled)
            .await
        {
            warn!(payment_id = %payment.id, error = %e, "failed to record voided hold");
        }
    }

    async fn unwind_payment(
        &self,
        booking: &Booking,
        ride: &Ride,
    ) -> (Option<PenaltyBreakdown>, bool, Option<String>) {
        let payment = match self.payments.get_payment_for_booking(booking.id).await {
            Ok(Some(p)) => p,
            Ok(None) => return (None, false, None),
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "payment lookup failed during cancellation");
                return (None, false, Some(e.to_string()));
            }
        };

        match payment.status {
            PaymentStatus::Authorized => {
                self.void_authorization(booking).await;
                (None, false, None)
            }
            PaymentStatus::Captured => {
                let breakdown = penalty::compute(
                    payment.amount_cents,
                    ride.departure_at,
                    Utc::now(),
                    &self.penalty_policy,
                );
                if breakdown.refund_cents == 0 {
                    return (Some(breakdown), false, None);
                }
                match self
                    .gateway
                    .refund(&payment.gateway_reference, breakdown.refund_cents)
                    .await
                {
                    Ok(receipt) => {
                        info!(
                            payment_id = %payment.id,
                            refund_id = %receipt.id,
                            amount = breakdown.refund_cents,
                            "refund issued"
                        );
                        if let Err(e) = self
                            .payments
                            .update_payment_status(payment.id, PaymentStatus::Refunded)
                            .await
                        {
                            warn!(payment_id = %payment.id, error = %e, "failed to record refund");
                        }
                        (Some(breakdown), true, None)
                    }
                    Err(e) => {
                        error!(payment_id = %payment.id, error = %e, "refund failed, flagging for follow-up");
                        (Some(breakdown), false, Some(e.to_string()))
                    }
                }
            }
            _ => (None, false, None),
        }
    }

    async fn release_quietly(&self, ride_id: Uuid, seats: u32) {
        if let Err(e) = self.rides.release_seats(ride_id, seats).await {
            error!(ride_id = %ride_id, error = %e, "rollback: seat release failed");
        }
    }

    fn platform_fee(&self, amount_cents: i64) -> i64 {
        (amount_cents * i64::from(self.platform_fee_percent) + 50) / 100
    }
}
