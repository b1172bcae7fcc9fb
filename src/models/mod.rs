pub mod amount;
pub mod booking;
pub mod currency;
pub mod event;
pub mod ids;
pub mod payment;
pub mod space;

pub use self::amount::Amount;
pub use self::booking::{Booking, BookingRequest, BookingStatus, CancelledBy, NewBooking, PaymentStatus, UpdateBooking};
pub use self::currency::Currency;
pub use self::event::{Event, EventType};
pub use self::ids::{BookingId, PaymentId, SpaceId, UserId};
pub use self::payment::{BookingType, ChargeStatus, NewPayment, Payment, ProviderPaymentId, UpdatePayment};
pub use self::space::{GeoSearch, NewSpace, SearchSpaces, Space, SpaceForm, SpaceStatus, UpdateSpace};
