pub mod formatting;
pub mod icons;

pub use formatting::{format_elapsed_time, format_hashrate_gh, format_uptime};
