pub mod auth;

pub use auth::{verify_token, Claims};
