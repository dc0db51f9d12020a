//! Services behind the HTTP handlers: geocoding, mail, login tokens and
//! photo storage.

pub mod email;
pub mod geocoder;
pub mod photo;
pub mod token;
