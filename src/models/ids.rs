//! Uuid-backed id newtypes for the three core tables plus users. Users are
//! owned by the embedding service; only the id crosses the boundary.

use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use diesel::pg::Pg;
use diesel::sql_types::Uuid as SqlUuid;
use diesel::types::{FromSql, ToSql};
use diesel::{
    deserialize,
    serialize::{self, Output},
};
use uuid::{self, Uuid};

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Serialize, Deserialize, FromSqlRow, AsExpression, Clone, Copy, PartialEq, Eq, Hash)]
        #[sql_type = "SqlUuid"]
        pub struct $name(Uuid);
        newtype_from_to_sql!(SqlUuid, $name, $name);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                $name(id)
            }

            pub fn inner(&self) -> &Uuid {
                &self.0
            }

            pub fn into_inner(self) -> Uuid {
                self.0
            }

            pub fn generate() -> Self {
                $name(Uuid::new_v4())
            }
        }

        impl FromStr for $name {
            type Err = uuid::ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let id = Uuid::parse_str(s)?;
                Ok($name::new(id))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(&format!("{}", self.0.hyphenated()))
            }
        }
    };
}

uuid_id!(SpaceId);
uuid_id!(BookingId);
uuid_id!(PaymentId);
uuid_id!(UserId);
