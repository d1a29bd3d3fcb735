use crate::domain::money::Cents;
use crate::domain::payment::{GatewayIntentStatus, IntentRequest, IntentSnapshot};
use crate::domain::ports::PaymentGateway;
use crate::error::{DistributionError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Default)]
struct StubState {
    intents: HashMap<String, IntentSnapshot>,
    by_idempotency_key: HashMap<String, String>,
    requests: Vec<IntentRequest>,
    next_status: Option<GatewayIntentStatus>,
    fail_message: Option<String>,
    counter: u64,
}

/// A scriptable stand-in for the payment gateway, used by the test suites
/// and local drills.
///
/// Honors the idempotency key the way the real rail does: a repeated
/// create with a key it has already served returns the original intent
/// instead of opening a second charge. New intents start in `processing`
/// (ACH collection is asynchronous) unless a different status is queued.
#[derive(Default, Clone)]
pub struct StubGateway {
    state: Arc<RwLock<StubState>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StubState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StubState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues the status the next created intent will carry.
    pub fn queue_status(&self, status: GatewayIntentStatus) {
        self.write().next_status = Some(status);
    }

    /// Makes the next create call fail with the given gateway message.
    pub fn fail_next(&self, message: &str) {
        self.write().fail_message = Some(message.to_string());
    }

    /// Moves an existing intent to a new status, as the gateway would
    /// between webhook deliveries.
    pub fn transition_intent(
        &self,
        intent_id: &str,
        status: GatewayIntentStatus,
        fee: Option<Cents>,
    ) {
        let mut state = self.write();
        if let Some(snapshot) = state.intents.get_mut(intent_id) {
            snapshot.status = status;
            if fee.is_some() {
                snapshot.fee = fee;
            }
        }
    }

    /// Every create request received, in order.
    pub fn requests(&self) -> Vec<IntentRequest> {
        self.read().requests.clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<IntentSnapshot> {
        let mut state = self.write();
        if let Some(message) = state.fail_message.take() {
            return Err(DistributionError::GatewayError(message));
        }
        state.requests.push(request.clone());

        if let Some(existing_id) = state.by_idempotency_key.get(&request.idempotency_key)
            && let Some(snapshot) = state.intents.get(existing_id)
        {
            return Ok(snapshot.clone());
        }

        state.counter += 1;
        let id = format!("pi_{}", state.counter);
        let status = state
            .next_status
            .take()
            .unwrap_or(GatewayIntentStatus::Processing);
        let snapshot = IntentSnapshot {
            id: id.clone(),
            status,
            amount: request.amount,
            fee: None,
            last_error: None,
        };
        state
            .by_idempotency_key
            .insert(request.idempotency_key.clone(), id.clone());
        state.intents.insert(id, snapshot.clone());
        Ok(snapshot)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot> {
        self.read()
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| {
                DistributionError::GatewayError(format!("No such intent: {intent_id}"))
            })
    }
}
