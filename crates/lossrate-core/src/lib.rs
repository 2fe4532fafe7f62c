pub mod curves;
pub mod error;
pub mod forecast;
pub mod time_value;
pub mod types;

pub use error::LossRateError;
pub use types::*;

/// Standard result type for all loss-rate operations
pub type LossRateResult<T> = Result<T, LossRateError>;
