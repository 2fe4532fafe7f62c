pub mod engine;
pub mod table;

#[cfg(feature = "batch")]
pub mod batch;

pub use engine::{
    cell_loss_rate, forecast, forecast_loss_rates, forecast_with_curves, forecast_with_incidence,
    ForecastCurves, LossRateForecastInput, LossRateForecastOutput, DEFAULT_AVG_INTEREST_RATE,
    DEFAULT_PERIODS_PER_YEAR, DEFAULT_RECOVERY_RATE,
};
pub use table::RateTable;
