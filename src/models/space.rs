use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::VarChar;
use failure::Fail;
use serde_json;
use validator::Validate;

use models::{Amount, SpaceId, UserId};
use schema::spaces;

/// Listing lifecycle. New listings start as `Pending` until moderation
/// (external to this crate) flips them to `Active`; only active listings are
/// searchable and bookable.
#[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, Eq, PartialEq, Hash)]
#[sql_type = "VarChar"]
#[serde(rename_all = "lowercase")]
pub enum SpaceStatus {
    Pending,
    Active,
    Paused,
    Rejected,
}

#[derive(Debug, Clone, Fail)]
#[fail(display = "failed to parse space status")]
pub struct ParseSpaceStatusError;

impl FromStr for SpaceStatus {
    type Err = ParseSpaceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(SpaceStatus::Pending),
            "active" => Ok(SpaceStatus::Active),
            "paused" => Ok(SpaceStatus::Paused),
            "rejected" => Ok(SpaceStatus::Rejected),
            _ => Err(ParseSpaceStatusError),
        }
    }
}

impl FromSql<VarChar, Pg> for SpaceStatus {
    fn from_sql(data: Option<&[u8]>) -> deserialize::Result<Self> {
        match data {
            Some(b"pending") => Ok(SpaceStatus::Pending),
            Some(b"active") => Ok(SpaceStatus::Active),
            Some(b"paused") => Ok(SpaceStatus::Paused),
            Some(b"rejected") => Ok(SpaceStatus::Rejected),
            Some(v) => Err(format!(
                "Unrecognized enum variant: {:?}",
                String::from_utf8(v.to_vec()).unwrap_or_else(|_| "Non - UTF8 value".to_string()),
            )
            .into()),
            None => Err("Unexpected null for non-null column".into()),
        }
    }
}

impl ToSql<VarChar, Pg> for SpaceStatus {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        match self {
            SpaceStatus::Pending => out.write_all(b"pending")?,
            SpaceStatus::Active => out.write_all(b"active")?,
            SpaceStatus::Paused => out.write_all(b"paused")?,
            SpaceStatus::Rejected => out.write_all(b"rejected")?,
        };
        Ok(IsNull::No)
    }
}

impl Display for SpaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpaceStatus::Pending => f.write_str("pending"),
            SpaceStatus::Active => f.write_str("active"),
            SpaceStatus::Paused => f.write_str("paused"),
            SpaceStatus::Rejected => f.write_str("rejected"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Queryable)]
pub struct Space {
    pub id: SpaceId,
    pub owner_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub address_line: String,
    pub city: String,
    pub postcode: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub space_type: String,
    pub price_per_hour: Amount,
    pub price_per_day: Option<Amount>,
    pub min_booking_hours: i32,
    pub max_booking_days: i32,
    pub amenities: serde_json::Value,
    pub photos: serde_json::Value,
    pub status: SpaceStatus,
    pub total_earnings: Amount,
    pub total_bookings: i32,
    pub average_rating: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Space {
    pub fn amenity_list(&self) -> Vec<String> {
        json_string_list(&self.amenities)
    }

    pub fn photo_list(&self) -> Vec<String> {
        json_string_list(&self.photos)
    }

    /// All requested amenities must be present on the listing
    pub fn has_amenities(&self, wanted: &[String]) -> bool {
        let own = self.amenity_list();
        wanted.iter().all(|w| own.iter().any(|a| a == w))
    }
}

fn json_string_list(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
        .unwrap_or_default()
}

#[derive(Clone, Debug, Deserialize, Serialize, Insertable)]
#[table_name = "spaces"]
pub struct NewSpace {
    pub id: SpaceId,
    pub owner_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub address_line: String,
    pub city: String,
    pub postcode: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub space_type: String,
    pub price_per_hour: Amount,
    pub price_per_day: Option<Amount>,
    pub min_booking_hours: i32,
    pub max_booking_days: i32,
    pub amenities: serde_json::Value,
    pub photos: serde_json::Value,
    pub status: SpaceStatus,
    pub total_earnings: Amount,
    pub total_bookings: i32,
}

/// Inbound listing payload, validated before it becomes a `NewSpace`.
/// Prices arrive in minor units.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SpaceForm {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub address_line: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 16))]
    pub postcode: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[validate(length(min = 1, max = 50))]
    pub space_type: String,
    #[validate(range(min = 1))]
    pub price_per_hour: i64,
    pub price_per_day: Option<i64>,
    #[validate(range(min = 1, max = 24))]
    pub min_booking_hours: i32,
    #[validate(range(min = 1, max = 90))]
    pub max_booking_days: i32,
    pub amenities: Vec<String>,
    #[validate(length(max = 6))]
    pub photos: Vec<String>,
}

impl SpaceForm {
    pub fn into_new_space(self, owner_id: UserId) -> NewSpace {
        NewSpace {
            id: SpaceId::generate(),
            owner_id,
            title: self.title,
            description: self.description,
            address_line: self.address_line,
            city: self.city,
            postcode: self.postcode,
            country: self.country,
            latitude: self.latitude,
            longitude: self.longitude,
            space_type: self.space_type,
            price_per_hour: Amount::new(self.price_per_hour),
            price_per_day: self.price_per_day.map(Amount::new),
            min_booking_hours: self.min_booking_hours,
            max_booking_days: self.max_booking_days,
            amenities: serde_json::Value::from(self.amenities),
            photos: serde_json::Value::from(self.photos),
            status: SpaceStatus::Pending,
            total_earnings: Amount::zero(),
            total_bookings: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, AsChangeset)]
#[table_name = "spaces"]
pub struct UpdateSpace {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_per_hour: Option<Amount>,
    pub price_per_day: Option<Amount>,
    pub min_booking_hours: Option<i32>,
    pub max_booking_days: Option<i32>,
    pub amenities: Option<serde_json::Value>,
    pub photos: Option<serde_json::Value>,
    pub status: Option<SpaceStatus>,
    pub average_rating: Option<f64>,
}

/// Search filters as they come off the query string. Everything is optional;
/// SQL-expressible filters run in the database, amenity containment and the
/// geo radius run over the fetched page source (see `SpacesRepo::search`).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchSpaces {
    pub city: Option<String>,
    pub postcode_prefix: Option<String>,
    pub max_price_per_hour: Option<Amount>,
    pub space_type: Option<String>,
    pub amenities: Vec<String>,
    pub geo: Option<GeoSearch>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct GeoSearch {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_miles: f64,
}

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance in miles between two lat/lon points
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_MILES * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_london_to_brighton() {
        // Charing Cross to Brighton Pier, roughly 47 miles
        let d = haversine_miles(51.5074, -0.1278, 50.8168, -0.1367);
        assert!(d > 45.0 && d < 50.0, "got {}", d);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert!(haversine_miles(51.5, -0.1, 51.5, -0.1) < 1e-9);
    }

    #[test]
    fn amenity_containment_requires_all() {
        let space = sample_space(vec!["cctv", "ev_charging"]);
        assert!(space.has_amenities(&["cctv".to_string()]));
        assert!(space.has_amenities(&[]));
        assert!(!space.has_amenities(&["cctv".to_string(), "covered".to_string()]));
    }

    fn sample_space(amenities: Vec<&str>) -> Space {
        use chrono::NaiveDate;

        let now = NaiveDate::from_ymd(2026, 1, 1).and_hms(0, 0, 0);
        Space {
            id: SpaceId::generate(),
            owner_id: UserId::generate(),
            title: "Driveway".to_string(),
            description: None,
            address_line: "1 Test St".to_string(),
            city: "London".to_string(),
            postcode: "N1 1AA".to_string(),
            country: "GB".to_string(),
            latitude: None,
            longitude: None,
            space_type: "driveway".to_string(),
            price_per_hour: Amount::new(500),
            price_per_day: None,
            min_booking_hours: 1,
            max_booking_days: 30,
            amenities: serde_json::Value::from(amenities.into_iter().map(|s| s.to_string()).collect::<Vec<_>>()),
            photos: serde_json::Value::from(Vec::<String>::new()),
            status: SpaceStatus::Active,
            total_earnings: Amount::zero(),
            total_bookings: 0,
            average_rating: None,
            created_at: now,
            updated_at: now,
        }
    }
}
