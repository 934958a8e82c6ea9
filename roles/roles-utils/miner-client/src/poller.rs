use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

/// Drive `tick` every `period` until it returns `ControlFlow::Break`.
///
/// The first tick fires immediately. A tick that overruns the period delays
/// the next one instead of firing a burst to catch up.
pub async fn poll_loop<F, Fut>(period: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<()>>,
{
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if tick().await.is_break() {
            break;
        }
    }
}

/// Remembers whether each miner answered its last poll so that a miner that
/// stays down is reported once, not every tick.
#[derive(Debug, Default)]
pub struct ReachabilityLog {
    online: HashMap<String, bool>,
}

impl ReachabilityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful poll. Returns true if the miner was previously unreachable.
    pub fn mark_online(&mut self, miner: &str) -> bool {
        let previous = self.online.insert(miner.to_string(), true);
        let recovered = previous == Some(false);
        if recovered {
            info!("{} is back online", miner);
        } else if previous.is_none() {
            info!("{} is online", miner);
        }
        recovered
    }

    /// Record a failed poll. Returns true if this is a new outage.
    pub fn mark_offline(&mut self, miner: &str, reason: &dyn std::fmt::Display) -> bool {
        let previous = self.online.insert(miner.to_string(), false);
        let new_outage = previous != Some(false);
        if new_outage {
            warn!("{} is unreachable: {}", miner, reason);
        }
        new_outage
    }

    pub fn is_online(&self, miner: &str) -> Option<bool> {
        self.online.get(miner).copied()
    }
}
