extern crate chrono;
extern crate diesel;
extern crate env_logger;
extern crate hex;
extern crate hmac;
extern crate parkalot_lib;
extern crate r2d2;
extern crate r2d2_diesel;
extern crate serde_json;
extern crate sha2;
extern crate uuid;

use std::sync::Arc;

use chrono::{Duration, Utc};
use diesel::pg::PgConnection;
use hmac::{Hmac, Mac};
use r2d2_diesel::ConnectionManager;
use sha2::Sha256;

use parkalot_lib::client::payment_gateway::MockPaymentGateway;
use parkalot_lib::models::{
    Amount, BookingRequest, BookingStatus, BookingType, ChargeStatus, Currency, NewSpace, PaymentStatus, SpaceId, SpaceStatus, UserId,
};
use parkalot_lib::pricing::FeePolicy;
use parkalot_lib::repos::DbPool;
use parkalot_lib::services::{
    BookingService, BookingServiceImpl, ErrorKind, PaymentService, PaymentServiceImpl, WebhookService, WebhookServiceImpl,
};

const WEBHOOK_SECRET: &str = "whsec_integration_test";

fn test_db_pool() -> DbPool {
    let _ = env_logger::try_init();

    let config = parkalot_lib::config::Config::new().unwrap();
    let manager = ConnectionManager::<PgConnection>::new(config.server.database);
    r2d2::Pool::builder().max_size(2).build(manager).unwrap()
}

fn signed_header(payload: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_varkey(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.input(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.result().code()))
}

fn seed_paid_for_booking(db_pool: &DbPool) -> (parkalot_lib::models::Booking, parkalot_lib::models::Payment) {
    use parkalot_lib::repos::{SpacesRepo, SpacesRepoImpl};

    let gateway = Arc::new(MockPaymentGateway::new());
    let booking_service = BookingServiceImpl::new(db_pool.clone(), gateway.clone(), FeePolicy::default());
    let payment_service = PaymentServiceImpl::new(db_pool.clone(), gateway, Currency::Gbp, FeePolicy::default());

    let space = {
        let conn = db_pool.get().unwrap();
        SpacesRepoImpl::new(&*conn)
            .create(NewSpace {
                id: SpaceId::generate(),
                owner_id: UserId::generate(),
                title: "Underground bay".to_string(),
                description: None,
                address_line: "3 Test Street".to_string(),
                city: "London".to_string(),
                postcode: "E1 6AN".to_string(),
                country: "GB".to_string(),
                latitude: None,
                longitude: None,
                space_type: "underground".to_string(),
                price_per_hour: Amount::new(250),
                price_per_day: None,
                min_booking_hours: 1,
                max_booking_days: 30,
                amenities: serde_json::json!([]),
                photos: serde_json::json!([]),
                status: SpaceStatus::Active,
                total_earnings: Amount::zero(),
                total_bookings: 0,
            })
            .unwrap()
    };

    let start = Utc::now().naive_utc() + Duration::hours(36);
    let renter = UserId::generate();
    let booking = booking_service
        .create(
            renter,
            BookingRequest {
                space_id: space.id,
                start_time: start,
                end_time: start + Duration::hours(4),
                vehicle_reg: None,
                vehicle_model: None,
            },
        )
        .unwrap();

    let outcome = payment_service
        .create_intent(renter, BookingType::CustomerSpace, booking.id.into_inner(), booking.total_price, None)
        .unwrap();
    (booking, outcome.payment)
}

fn succeeded_payload(payment: &parkalot_lib::models::Payment, booking_id: uuid::Uuid) -> String {
    let intent_id = payment.provider_payment_id.clone().unwrap();
    serde_json::json!({
        "id": "evt_test_1",
        "type": "payment_intent.succeeded",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": intent_id.inner(),
                "metadata": {
                    "booking_type": "customer_space",
                    "booking_id": booking_id.to_string()
                }
            }
        }
    })
    .to_string()
}

#[test]
#[ignore]
fn succeeded_event_confirms_the_booking() {
    let db_pool = test_db_pool();
    let webhook = WebhookServiceImpl::new(db_pool.clone(), WEBHOOK_SECRET.to_string());
    let booking_service = BookingServiceImpl::new(db_pool.clone(), Arc::new(MockPaymentGateway::new()), FeePolicy::default());
    let payment_service = PaymentServiceImpl::new(db_pool.clone(), Arc::new(MockPaymentGateway::new()), Currency::Gbp, FeePolicy::default());

    let (booking, payment) = seed_paid_for_booking(&db_pool);
    let payload = succeeded_payload(&payment, booking.id.into_inner());

    webhook.handle_event(&payload, &signed_header(&payload)).unwrap();

    let payment = payment_service
        .get_by_booking(BookingType::CustomerSpace, booking.id.into_inner())
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, ChargeStatus::Succeeded);

    let booking = booking_service.get(booking.id, booking.renter_id).unwrap();
    assert_eq!(booking.booking_status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, PaymentStatus::Paid);

    // Redelivery of the same event changes nothing
    webhook.handle_event(&payload, &signed_header(&payload)).unwrap();
    let booking = booking_service.get(booking.id, booking.renter_id).unwrap();
    assert_eq!(booking.booking_status, BookingStatus::Confirmed);
}

#[test]
#[ignore]
fn tampered_payload_is_rejected_before_any_state_change() {
    let db_pool = test_db_pool();
    let webhook = WebhookServiceImpl::new(db_pool.clone(), WEBHOOK_SECRET.to_string());
    let payment_service = PaymentServiceImpl::new(db_pool.clone(), Arc::new(MockPaymentGateway::new()), Currency::Gbp, FeePolicy::default());

    let (booking, payment) = seed_paid_for_booking(&db_pool);
    let payload = succeeded_payload(&payment, booking.id.into_inner());
    let header = signed_header(&payload);
    let forged = payload.replace("evt_test_1", "evt_forged");

    let err = webhook.handle_event(&forged, &header).unwrap_err();
    match err.kind() {
        ErrorKind::InvalidSignature => {}
        other => panic!("expected invalid signature, got {:?}", other),
    }

    let payment = payment_service
        .get_by_booking(BookingType::CustomerSpace, booking.id.into_inner())
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, ChargeStatus::Pending);
}

#[test]
#[ignore]
fn refund_event_marks_the_payment_and_booking_refunded() {
    let db_pool = test_db_pool();
    let webhook = WebhookServiceImpl::new(db_pool.clone(), WEBHOOK_SECRET.to_string());
    let payment_service = PaymentServiceImpl::new(db_pool.clone(), Arc::new(MockPaymentGateway::new()), Currency::Gbp, FeePolicy::default());

    let (booking, payment) = seed_paid_for_booking(&db_pool);
    let succeeded = succeeded_payload(&payment, booking.id.into_inner());
    webhook.handle_event(&succeeded, &signed_header(&succeeded)).unwrap();

    let intent_id = payment.provider_payment_id.clone().unwrap();
    let refunded = serde_json::json!({
        "id": "evt_test_2",
        "type": "charge.refunded",
        "data": {
            "object": {
                "id": "ch_test_1",
                "payment_intent": intent_id.inner(),
                "amount_refunded": payment.amount.inner()
            }
        }
    })
    .to_string();
    webhook.handle_event(&refunded, &signed_header(&refunded)).unwrap();

    let payment = payment_service
        .get_by_booking(BookingType::CustomerSpace, booking.id.into_inner())
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, ChargeStatus::Refunded);
    assert_eq!(payment.refund_amount, Some(payment.amount));
}
