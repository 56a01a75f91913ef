pub mod config;
pub mod error;
pub mod record;
pub mod vendor;

pub use config::Config;
pub use error::CoreError;
pub use record::*;
pub use vendor::Vendor;
