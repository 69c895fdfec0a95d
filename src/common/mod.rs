pub mod hash;
pub mod time;
pub mod types;

pub use time::current_time_millis;
pub use types::METRIC_NAME_LABEL;
