extern crate diesel;
extern crate env_logger;
extern crate parkalot_lib;
extern crate serde_json;
extern crate uuid;

use diesel::pg::PgConnection;
use diesel::Connection;

use parkalot_lib::models::{Amount, NewSpace, SearchSpaces, Space, SpaceId, SpaceStatus, UpdateSpace, UserId};
use parkalot_lib::repos::{SpacesRepo, SpacesRepoImpl};

fn with_test_db_conn<F, T>(f: F) -> T
where
    F: FnOnce(&PgConnection) -> T,
{
    let _ = env_logger::try_init();

    let config = parkalot_lib::config::Config::new().unwrap();
    let db_conn = PgConnection::establish(&config.server.database).unwrap();

    f(&db_conn)
}

fn seed_space(conn: &PgConnection, city: &str, title: &str) -> Space {
    SpacesRepoImpl::new(conn)
        .create(NewSpace {
            id: SpaceId::generate(),
            owner_id: UserId::generate(),
            title: title.to_string(),
            description: None,
            address_line: "1 Test Street".to_string(),
            city: city.to_string(),
            postcode: "SW1A 1AA".to_string(),
            country: "GB".to_string(),
            latitude: None,
            longitude: None,
            space_type: "driveway".to_string(),
            price_per_hour: Amount::new(300),
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
}

fn set_rating(conn: &PgConnection, space_id: SpaceId, rating: f64) {
    SpacesRepoImpl::new(conn)
        .update(
            space_id,
            UpdateSpace {
                average_rating: Some(rating),
                ..Default::default()
            },
        )
        .unwrap();
}

#[test]
#[ignore]
fn search_ranks_rated_spaces_above_unrated_ones() {
    with_test_db_conn(|conn| {
        // City name unique to this run so leftovers from other tests
        // never land in the result set
        let city = format!("Ratingham-{}", uuid::Uuid::new_v4().simple());
        let repo = SpacesRepoImpl::new(conn);

        let unrated = seed_space(conn, &city, "Unrated bay");
        let good = seed_space(conn, &city, "Well rated bay");
        let decent = seed_space(conn, &city, "Decently rated bay");
        set_rating(conn, good.id, 4.8);
        set_rating(conn, decent.id, 3.2);

        let results = repo
            .search(
                SearchSpaces {
                    city: Some(city),
                    ..Default::default()
                },
                10,
                0,
            )
            .unwrap();

        let ids: Vec<SpaceId> = results.into_iter().map(|r| r.space.id).collect();
        assert_eq!(ids, vec![good.id, decent.id, unrated.id]);
    })
}
