//! Deserialized payment-provider webhook events. Only the fields the
//! reconciler needs are modeled; the raw object is kept as json for logging
//! and for forward compatibility with event types we don't handle.

use serde_json;
use std::str::FromStr;

use models::{Amount, BookingType, ProviderPaymentId};

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Provider event id (`evt_...`)
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Provider-side creation time, unix seconds
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum EventType {
    #[serde(rename = "payment_intent.succeeded")]
    PaymentIntentSucceeded,
    #[serde(rename = "payment_intent.payment_failed")]
    PaymentIntentPaymentFailed,
    #[serde(rename = "charge.refunded")]
    ChargeRefunded,
    #[serde(other)]
    Other,
}

impl Event {
    pub fn from_payload(payload: &str) -> Result<Event, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// The intent id carried by the event object. For `charge.refunded` the
    /// charge points back at its intent via `payment_intent`.
    pub fn intent_id(&self) -> Option<ProviderPaymentId> {
        let object = &self.data.object;
        let id = match self.event_type {
            EventType::ChargeRefunded => object.get("payment_intent").and_then(|v| v.as_str()),
            _ => object.get("id").and_then(|v| v.as_str()),
        };
        id.map(ProviderPaymentId::new)
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.data.object.get("metadata").and_then(|m| m.get(key)).and_then(|v| v.as_str())
    }

    /// `booking_type`/`booking_id` pair stamped into the intent metadata at
    /// creation time, linking the provider event back to our records
    pub fn booking_reference(&self) -> Option<(BookingType, ::uuid::Uuid)> {
        let booking_type = self.metadata_str("booking_type").and_then(|s| BookingType::from_str(s).ok())?;
        let booking_id = self.metadata_str("booking_id").and_then(|s| ::uuid::Uuid::parse_str(s).ok())?;
        Some((booking_type, booking_id))
    }

    /// Total refunded so far on a `charge.refunded` event, minor units
    pub fn amount_refunded(&self) -> Option<Amount> {
        self.data.object.get("amount_refunded").and_then(|v| v.as_i64()).map(Amount::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_succeeded_event_with_booking_reference() {
        let payload = r#"{
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "created": 1700000000,
            "data": {
                "object": {
                    "id": "pi_123",
                    "metadata": {
                        "booking_type": "customer_space",
                        "booking_id": "4be0c615-2a7e-4131-ab78-a2d2b0f3c5b9"
                    }
                }
            }
        }"#;
        let event = Event::from_payload(payload).unwrap();
        assert_eq!(event.event_type, EventType::PaymentIntentSucceeded);
        assert_eq!(event.intent_id(), Some(ProviderPaymentId::new("pi_123")));
        let (booking_type, _) = event.booking_reference().unwrap();
        assert_eq!(booking_type, BookingType::CustomerSpace);
    }

    #[test]
    fn refund_event_points_back_at_the_intent() {
        let payload = r#"{
            "id": "evt_2",
            "type": "charge.refunded",
            "data": {
                "object": {
                    "id": "ch_9",
                    "payment_intent": "pi_123",
                    "amount_refunded": 2000
                }
            }
        }"#;
        let event = Event::from_payload(payload).unwrap();
        assert_eq!(event.event_type, EventType::ChargeRefunded);
        assert_eq!(event.intent_id(), Some(ProviderPaymentId::new("pi_123")));
        assert_eq!(event.amount_refunded(), Some(Amount::new(2000)));
    }

    #[test]
    fn unknown_event_types_still_parse() {
        let payload = r#"{"id": "evt_3", "type": "customer.created", "data": {"object": {}}}"#;
        let event = Event::from_payload(payload).unwrap();
        assert_eq!(event.event_type, EventType::Other);
    }
}
