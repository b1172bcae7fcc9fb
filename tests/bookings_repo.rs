extern crate chrono;
extern crate diesel;
extern crate env_logger;
extern crate parkalot_lib;
extern crate serde_json;
extern crate uuid;

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::Connection;

use parkalot_lib::models::{
    Amount, BookingId, BookingStatus, NewBooking, NewSpace, PaymentStatus, Space, SpaceId, SpaceStatus, UpdateBooking, UserId,
};
use parkalot_lib::repos::{BookingsRepo, BookingsRepoImpl, SpacesRepo, SpacesRepoImpl};

fn with_test_db_conn<F, T>(f: F) -> T
where
    F: FnOnce(&PgConnection) -> T,
{
    let _ = env_logger::try_init();

    let config = parkalot_lib::config::Config::new().unwrap();
    let db_conn = PgConnection::establish(&config.server.database).unwrap();

    f(&db_conn)
}

fn seed_space(conn: &PgConnection) -> Space {
    SpacesRepoImpl::new(conn)
        .create(NewSpace {
            id: SpaceId::generate(),
            owner_id: UserId::generate(),
            title: "Covered driveway".to_string(),
            description: None,
            address_line: "1 Test Street".to_string(),
            city: "London".to_string(),
            postcode: "SW1A 1AA".to_string(),
            country: "GB".to_string(),
            latitude: Some(51.5),
            longitude: Some(-0.12),
            space_type: "driveway".to_string(),
            price_per_hour: Amount::new(300),
            price_per_day: Some(Amount::new(2000)),
            min_booking_hours: 1,
            max_booking_days: 30,
            amenities: serde_json::json!(["cctv"]),
            photos: serde_json::json!([]),
            status: SpaceStatus::Active,
            total_earnings: Amount::zero(),
            total_bookings: 0,
        })
        .unwrap()
}

fn hours(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd(2026, 3, day).and_hms(hour, 0, 0)
}

fn new_booking(space: &Space, start: NaiveDateTime, end: NaiveDateTime) -> NewBooking {
    NewBooking {
        id: BookingId::generate(),
        space_id: space.id,
        renter_id: UserId::generate(),
        owner_id: space.owner_id,
        start_time: start,
        end_time: end,
        vehicle_reg: Some("AB12 CDE".to_string()),
        vehicle_model: None,
        total_price: Amount::new(600),
        platform_fee: Amount::new(90),
        owner_payout: Amount::new(510),
        booking_status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
    }
}

#[test]
#[ignore]
fn bookings_repo_crud_happy() {
    with_test_db_conn(|conn| {
        let repo = BookingsRepoImpl::new(conn);
        let space = seed_space(conn);

        let new_booking = new_booking(&space, hours(1, 10), hours(1, 12));
        let created = repo.create(new_booking.clone()).unwrap();
        assert_eq!(created.id, new_booking.id);
        assert_eq!(created.booking_status, BookingStatus::Pending);

        let fetched = repo.get(created.id).unwrap().unwrap();
        assert_eq!(fetched.total_price, Amount::new(600));

        let confirmed = repo
            .update(
                created.id,
                UpdateBooking {
                    booking_status: Some(BookingStatus::Confirmed),
                    payment_status: Some(PaymentStatus::Paid),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(confirmed.booking_status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

        let missing = repo.get(BookingId::new(uuid::Uuid::nil())).unwrap();
        assert!(missing.is_none());
    });
}

#[test]
#[ignore]
fn overlap_covers_intersections_but_not_touching_ranges() {
    with_test_db_conn(|conn| {
        let repo = BookingsRepoImpl::new(conn);
        let space = seed_space(conn);

        repo.create(new_booking(&space, hours(2, 10), hours(2, 12))).unwrap();

        assert!(repo.has_overlap(space.id, hours(2, 11), hours(2, 13)).unwrap());
        assert!(repo.has_overlap(space.id, hours(2, 9), hours(2, 11)).unwrap());
        assert!(repo.has_overlap(space.id, hours(2, 10), hours(2, 12)).unwrap());
        // Back-to-back bookings share an instant only on paper
        assert!(!repo.has_overlap(space.id, hours(2, 12), hours(2, 14)).unwrap());
        assert!(!repo.has_overlap(space.id, hours(2, 8), hours(2, 10)).unwrap());
    });
}

#[test]
#[ignore]
fn cancelled_bookings_free_the_calendar() {
    with_test_db_conn(|conn| {
        let repo = BookingsRepoImpl::new(conn);
        let space = seed_space(conn);

        let booking = repo.create(new_booking(&space, hours(3, 10), hours(3, 12))).unwrap();
        assert!(repo.has_overlap(space.id, hours(3, 10), hours(3, 12)).unwrap());

        repo.update(
            booking.id,
            UpdateBooking {
                booking_status: Some(BookingStatus::Cancelled),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!repo.has_overlap(space.id, hours(3, 10), hours(3, 12)).unwrap());
    });
}

#[test]
#[ignore]
fn live_count_blocks_only_on_live_states() {
    with_test_db_conn(|conn| {
        let repo = BookingsRepoImpl::new(conn);
        let space = seed_space(conn);

        let booking = repo.create(new_booking(&space, hours(4, 10), hours(4, 12))).unwrap();
        assert_eq!(repo.live_count_for_space(space.id).unwrap(), 1);

        repo.update(
            booking.id,
            UpdateBooking {
                booking_status: Some(BookingStatus::Cancelled),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(repo.live_count_for_space(space.id).unwrap(), 0);
    });
}
