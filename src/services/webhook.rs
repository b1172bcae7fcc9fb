//! Provider webhook intake: signature verification and idempotent
//! reconciliation of payment events against our rows. The webhook is the
//! source of truth for charge outcomes; everything here must tolerate
//! duplicate and out-of-order delivery.

use std::str::FromStr;

use chrono::Utc;
use diesel::Connection;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use models::{BookingId, BookingType, ChargeStatus, Event, EventType, Payment, PaymentStatus, UpdateBooking, UpdatePayment};
use repos::{BookingsRepo, BookingsRepoImpl, DbPool, Error as RepoError, PaymentsRepo, PaymentsRepoImpl};

use super::error::{validation_error, Error, ErrorKind};
use super::payment::apply_successful_payment;
use super::types::{get_conn, ServiceResult};

/// Maximum allowed skew between the signed timestamp and our clock, in
/// seconds. Events older than this are replay candidates and are rejected.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Parsed `Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>...]`. Schemes
/// other than `v1` are ignored so the provider can rotate schemes without
/// breaking us.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

#[derive(Clone, Debug, Fail)]
#[fail(display = "malformed webhook signature header")]
pub struct ParseSignatureError;

impl FromStr for SignatureHeader {
    type Err = ParseSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in s.split(',') {
            let mut parts = item.trim().splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some("t"), Some(value)) => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| ParseSignatureError)?);
                }
                (Some("v1"), Some(value)) => signatures.push(value.to_string()),
                _ => {}
            }
        }

        match (timestamp, signatures.is_empty()) {
            (Some(timestamp), false) => Ok(SignatureHeader { timestamp, signatures }),
            _ => Err(ParseSignatureError),
        }
    }
}

/// Checks the HMAC-SHA256 of `"{timestamp}.{payload}"` against every `v1`
/// candidate in the header, then enforces the timestamp tolerance. Candidate
/// comparison is constant-time via the mac's own `verify`.
pub fn verify_signature(payload: &str, header: &SignatureHeader, secret: &str, now_unix: i64) -> Result<(), ErrorKind> {
    let mut mac = Hmac::<Sha256>::new_varkey(secret.as_bytes()).map_err(|_| ErrorKind::InvalidSignature)?;
    mac.input(format!("{}.{}", header.timestamp, payload).as_bytes());

    let verified = header.signatures.iter().any(|candidate| match ::hex::decode(candidate) {
        Ok(decoded) => mac.clone().verify(&decoded).is_ok(),
        Err(_) => false,
    });
    if !verified {
        return Err(ErrorKind::InvalidSignature);
    }

    if (now_unix - header.timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(ErrorKind::ExpiredSignature);
    }

    Ok(())
}

pub trait WebhookService {
    /// Verifies and applies a raw webhook delivery. Unmatched or unhandled
    /// events return `Ok` so the provider stops retrying them.
    fn handle_event(&self, payload: &str, signature_header: &str) -> ServiceResult<()>;
}

pub struct WebhookServiceImpl {
    pub db_pool: DbPool,
    pub webhook_secret: String,
}

impl WebhookServiceImpl {
    pub fn new(db_pool: DbPool, webhook_secret: String) -> Self {
        Self { db_pool, webhook_secret }
    }
}

impl WebhookService for WebhookServiceImpl {
    fn handle_event(&self, payload: &str, signature_header: &str) -> ServiceResult<()> {
        let header = SignatureHeader::from_str(signature_header).map_err(|e| {
            warn!("Rejecting webhook: {}", e);
            Error::from(ErrorKind::InvalidSignature)
        })?;

        verify_signature(payload, &header, &self.webhook_secret, Utc::now().timestamp()).map_err(|kind| {
            warn!("Rejecting webhook signed at {}: {}", header.timestamp, kind);
            Error::from(kind)
        })?;

        let event = Event::from_payload(payload).map_err(|e| {
            warn!("Webhook payload did not parse: {}", e);
            Error::from(validation_error("payload", "malformed_event"))
        })?;

        info!("Handling webhook event {} ({:?})", event.id, event.event_type);

        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<(), Error, _>(|| {
            let payments_repo = PaymentsRepoImpl::new(&*conn);
            let bookings_repo = BookingsRepoImpl::new(&*conn);

            let payment = match locate_payment(&payments_repo, &event)? {
                Some(payment) => payment,
                None => {
                    if event.event_type != EventType::Other {
                        warn!("Event {} matches no payment, acknowledging anyway", event.id);
                    }
                    return Ok(());
                }
            };

            match event.event_type {
                EventType::PaymentIntentSucceeded => {
                    apply_successful_payment(&*conn, &payment, event.intent_id())?;
                }
                EventType::PaymentIntentPaymentFailed => {
                    // A failure after success is stale ordering, not a state
                    // change.
                    if payment.status == ChargeStatus::Pending {
                        payments_repo.update(
                            payment.id,
                            UpdatePayment {
                                status: Some(ChargeStatus::Failed),
                                ..Default::default()
                            },
                        )?;
                    } else {
                        debug!("Ignoring failure event for payment {} in state {}", payment.id, payment.status);
                    }
                }
                EventType::ChargeRefunded => {
                    let refunded = event
                        .amount_refunded()
                        .ok_or_else(|| Error::from(validation_error("payload", "missing_amount_refunded")))?;
                    let full = refunded >= payment.amount;
                    let status = if full { ChargeStatus::Refunded } else { ChargeStatus::PartialRefund };

                    if payment.status == status && payment.refund_amount == Some(refunded) {
                        debug!("Refund on payment {} already recorded", payment.id);
                        return Ok(());
                    }

                    payments_repo.update(
                        payment.id,
                        UpdatePayment {
                            status: Some(status),
                            refund_amount: Some(refunded),
                            ..Default::default()
                        },
                    )?;

                    if payment.booking_type == BookingType::CustomerSpace {
                        if let Some(booking) = bookings_repo.get(BookingId::new(payment.booking_id))? {
                            bookings_repo.update(
                                booking.id,
                                UpdateBooking {
                                    payment_status: Some(if full { PaymentStatus::Refunded } else { PaymentStatus::PartialRefund }),
                                    ..Default::default()
                                },
                            )?;
                        }
                    }
                }
                EventType::Other => {}
            }

            Ok(())
        })
    }
}

/// Primary lookup is the intent id stamped on the payment row; events that
/// arrive before the row learned its intent id fall back to the booking
/// reference in the event metadata.
fn locate_payment<P: PaymentsRepo>(payments_repo: &P, event: &Event) -> Result<Option<Payment>, RepoError> {
    if let Some(intent_id) = event.intent_id() {
        if let Some(payment) = payments_repo.get_by_provider_payment_id(intent_id)? {
            return Ok(Some(payment));
        }
    }

    if let Some((booking_type, booking_id)) = event.booking_reference() {
        return payments_repo.get_by_booking(booking_type, booking_id);
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_varkey(SECRET.as_bytes()).unwrap();
        mac.input(format!("{}.{}", timestamp, payload).as_bytes());
        ::hex::encode(mac.result().code())
    }

    fn header_for(payload: &str, timestamp: i64) -> SignatureHeader {
        SignatureHeader {
            timestamp,
            signatures: vec![sign(payload, timestamp)],
        }
    }

    #[test]
    fn parses_signature_header() {
        let header = SignatureHeader::from_str("t=1700000000,v1=deadbeef").unwrap();
        assert_eq!(header.timestamp, 1700000000);
        assert_eq!(header.signatures, vec!["deadbeef".to_string()]);
    }

    #[test]
    fn ignores_unknown_schemes_but_keeps_all_v1_candidates() {
        let header = SignatureHeader::from_str("t=1,v0=old,v1=aa,v1=bb").unwrap();
        assert_eq!(header.signatures, vec!["aa".to_string(), "bb".to_string()]);
    }

    #[test]
    fn header_without_timestamp_or_signature_is_rejected() {
        assert!(SignatureHeader::from_str("v1=aa").is_err());
        assert!(SignatureHeader::from_str("t=12345").is_err());
        assert!(SignatureHeader::from_str("t=notanumber,v1=aa").is_err());
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = header_for(payload, 1700000000);
        assert!(verify_signature(payload, &header, SECRET, 1700000010).is_ok());
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = header_for(payload, 1700000000);
        let result = verify_signature(r#"{"id":"evt_FORGED"}"#, &header, SECRET, 1700000010);
        match result {
            Err(ErrorKind::InvalidSignature) => {}
            other => panic!("expected invalid signature, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_a_signature_under_the_wrong_secret() {
        let payload = r#"{"id":"evt_1"}"#;
        let mut mac = Hmac::<Sha256>::new_varkey(b"some_other_secret").unwrap();
        mac.input(format!("{}.{}", 1700000000, payload).as_bytes());
        let header = SignatureHeader {
            timestamp: 1700000000,
            signatures: vec![::hex::encode(mac.result().code())],
        };
        assert!(verify_signature(payload, &header, SECRET, 1700000010).is_err());
    }

    #[test]
    fn rejects_a_timestamp_outside_the_tolerance_window() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = header_for(payload, 1700000000);
        let result = verify_signature(payload, &header, SECRET, 1700000000 + SIGNATURE_TOLERANCE_SECS + 1);
        match result {
            Err(ErrorKind::ExpiredSignature) => {}
            other => panic!("expected expired signature, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn a_timestamp_exactly_at_the_tolerance_edge_passes() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = header_for(payload, 1700000000);
        assert!(verify_signature(payload, &header, SECRET, 1700000000 + SIGNATURE_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn any_valid_candidate_is_enough() {
        let payload = r#"{"id":"evt_1"}"#;
        let mut header = header_for(payload, 1700000000);
        header.signatures.insert(0, "00ff".to_string());
        assert!(verify_signature(payload, &header, SECRET, 1700000000).is_ok());
    }
}
