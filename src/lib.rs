//! ParkaLot core is the booking engine behind the parking marketplace:
//! listings, availability, pricing, payments and payment-provider webhooks.
//! The layered structure of the app is
//!
//! `Controller (external) -> Service -> Repo + PaymentGateway`
//!
//! Each layer can only face exceptions in its base layers and can only expose
//! its own errors. E.g. `Service` layer will only deal with `Repo` and
//! `PaymentGateway` errors and will only return `ServiceError`. Controllers,
//! sessions, file storage and third-party content APIs live in the embedding
//! service and consume this crate through the service traits.

extern crate config as config_crate;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate diesel;
extern crate chrono;
extern crate enum_iterator;
#[macro_use]
extern crate failure;
extern crate hex;
extern crate hmac;
#[macro_use]
extern crate log;
extern crate r2d2;
extern crate r2d2_diesel;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
extern crate sha2;
extern crate uuid;
extern crate validator;
#[macro_use]
extern crate validator_derive;

#[macro_use]
pub mod macros;
pub mod client;
pub mod config;
pub mod models;
pub mod pricing;
pub mod repos;
pub mod schema;
pub mod services;
