//! Scriptable in-process gateway. Doubles as the demo-mode fallback when no
//! real provider is configured and as the test double for service tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use uuid::Uuid;

use models::{Amount, ProviderPaymentId};

use super::error::{Error, ErrorKind};
use super::types::*;
use super::PaymentGateway;

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    CreateIntent(CreateIntent),
    CreateConnectIntent(CreateConnectIntent),
    Refund(CreateRefund),
    GetIntent(ProviderPaymentId),
}

#[derive(Default)]
pub struct MockPaymentGateway {
    calls: Mutex<Vec<GatewayCall>>,
    /// Outcomes consumed front-to-back; empty means "succeed"
    scripted_failures: Mutex<VecDeque<ErrorKind>>,
    /// Status reported by `get_intent`
    intent_status: Mutex<Option<IntentStatus>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn fail_next(&self, kind: ErrorKind) {
        self.scripted_failures.lock().unwrap().push_back(kind);
    }

    pub fn report_intent_status(&self, status: IntentStatus) {
        *self.intent_status.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: GatewayCall) -> Result<(), Error> {
        self.calls.lock().unwrap().push(call);
        match self.scripted_failures.lock().unwrap().pop_front() {
            Some(kind) => Err(Error::from(kind)),
            None => Ok(()),
        }
    }

    fn demo_intent(amount: Amount, status: IntentStatus) -> PaymentIntent {
        let suffix = Uuid::new_v4().simple().to_string();
        PaymentIntent {
            id: ProviderPaymentId::new(format!("pi_demo_{}", suffix)),
            client_secret: Some(format!("pi_demo_{}_secret", suffix)),
            amount,
            status,
        }
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_intent(&self, input: CreateIntent) -> Result<PaymentIntent, Error> {
        let amount = input.amount;
        self.record(GatewayCall::CreateIntent(input))?;
        Ok(Self::demo_intent(amount, IntentStatus::RequiresPaymentMethod))
    }

    fn create_connect_intent(&self, input: CreateConnectIntent) -> Result<PaymentIntent, Error> {
        let amount = input.amount;
        self.record(GatewayCall::CreateConnectIntent(input))?;
        Ok(Self::demo_intent(amount, IntentStatus::RequiresPaymentMethod))
    }

    fn refund(&self, input: CreateRefund) -> Result<RefundOutcome, Error> {
        let amount = input.amount;
        self.record(GatewayCall::Refund(input))?;
        Ok(RefundOutcome {
            id: format!("re_demo_{}", Uuid::new_v4().simple()),
            amount,
            status: RefundStatus::Succeeded,
        })
    }

    fn get_intent(&self, intent_id: ProviderPaymentId) -> Result<PaymentIntent, Error> {
        self.record(GatewayCall::GetIntent(intent_id.clone()))?;
        let status = self.intent_status.lock().unwrap().unwrap_or(IntentStatus::Processing);
        Ok(PaymentIntent {
            id: intent_id,
            client_secret: None,
            amount: Amount::zero(),
            status,
        })
    }
}
