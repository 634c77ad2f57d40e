pub mod config;
pub mod error;
pub mod results;
pub mod types;

pub use config::AppConfig;
pub use error::{UpliftError, UpliftResult};
