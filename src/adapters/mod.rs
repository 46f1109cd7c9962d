//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements          | Connects to                 |
//! |-----------------|---------------------|-----------------------------|
//! | `time`          | ClockPort           | `std::time`                 |
//! | `log_indicator` | IndicatorPort       | Log output                  |
//! | `sim`           | every device port   | Simulated modem/GNSS/backend|

pub mod log_indicator;
pub mod sim;
pub mod time;
