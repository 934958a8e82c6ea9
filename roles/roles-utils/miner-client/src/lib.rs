//! AxeOS HTTP client for Bitaxe miners.

pub mod asic;
pub mod client;
pub mod poller;
pub mod system_info;

pub use asic::{expected_hashrate_gh, AsicModel};
pub use client::{BitaxeClient, ClientError, MinerEndpoint, DEFAULT_PORT};
pub use poller::{poll_loop, ReachabilityLog};
pub use system_info::SystemInfo;
