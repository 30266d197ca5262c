pub mod backoff;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod throttle;

pub use config::{Config, VendorKind};
pub use error::{Error, Result};
pub use throttle::{Condition, LogThrottle};
