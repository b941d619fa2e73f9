pub mod expiring;

pub use expiring::{DEFAULT_VISIBILITY_WINDOW, ExpiringBuffer, InsertError};
