use async_trait::async_trait;
use farepool_core::payment::{
    AuthorizationStatus, AuthorizeRequest, GatewayAuthorization, GatewayCharge,
    GatewayChargeStatus, GatewayError, PaymentGateway, RefundReceipt,
};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MockState {
    fail_authorize: Option<GatewayError>,
    fail_capture: Option<GatewayError>,
    fail_cancel: Option<GatewayError>,
    fail_refund: Option<GatewayError>,
    authorize_calls: u32,
    capture_calls: u32,
    cancel_calls: u32,
    refund_calls: u32,
}

/// Scriptable gateway for tests: each failure mode fires once and clears,
/// and every call is counted.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_authorize(&self, err: GatewayError) {
        self.state.lock().unwrap().fail_authorize = Some(err);
    }

    pub fn fail_next_capture(&self, err: GatewayError) {
        self.state.lock().unwrap().fail_capture = Some(err);
    }

    pub fn fail_next_cancel(&self, err: GatewayError) {
        self.state.lock().unwrap().fail_cancel = Some(err);
    }

    pub fn fail_next_refund(&self, err: GatewayError) {
        self.state.lock().unwrap().fail_refund = Some(err);
    }

    pub fn authorize_calls(&self) -> u32 {
        self.state.lock().unwrap().authorize_calls
    }

    pub fn capture_calls(&self) -> u32 {
        self.state.lock().unwrap().capture_calls
    }

    pub fn cancel_calls(&self) -> u32 {
        self.state.lock().unwrap().cancel_calls
    }

    pub fn refund_calls(&self) -> u32 {
        self.state.lock().unwrap().refund_calls
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn authorize(&self, _req: AuthorizeRequest) -> Result<GatewayAuthorization, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.authorize_calls += 1;
        if let Some(err) = state.fail_authorize.take() {
            return Err(err);
        }
        Ok(GatewayAuthorization {
            id: format!("pi_{}", Uuid::new_v4().simple()),
            status: AuthorizationStatus::RequiresCapture,
        })
    }

    async fn capture(&self, _intent_id: &str) -> Result<GatewayCharge, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.capture_calls += 1;
        if let Some(err) = state.fail_capture.take() {
            return Err(err);
        }
        Ok(GatewayCharge {
            status: GatewayChargeStatus::Succeeded,
        })
    }

    async fn cancel_authorization(&self, _intent_id: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls += 1;
        if let Some(err) = state.fail_cancel.take() {
            return Err(err);
        }
        Ok(())
    }

    async fn refund(
        &self,
        _intent_id: &str,
        _amount_cents: i64,
    ) -> Result<RefundReceipt, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.refund_calls += 1;
        if let Some(err) = state.fail_refund.take() {
            return Err(err);
        }
        Ok(RefundReceipt {
            id: format!("re_{}", Uuid::new_v4().simple()),
        })
    }
}
