//! Periodic eviction of idle sessions.

use crate::lobby::Lobby;
use crate::session::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Sweeps the registry on a fixed period and evicts sessions whose last
/// inbound line is older than the idle threshold.
pub struct IdleReaper {
    lobby: Arc<Lobby>,
    idle_timeout: Duration,
    period: Duration,
}

impl IdleReaper {
    pub fn new(lobby: Arc<Lobby>, idle_timeout: Duration, period: Duration) -> Self {
        Self {
            lobby,
            idle_timeout,
            period,
        }
    }

    /// Runs one sweep as of `now`, returning the sessions this sweep evicted.
    ///
    /// The snapshot only nominates candidates. A session that disconnects or
    /// sends a line before its eviction is skipped.
    pub fn sweep(&self, now: Instant) -> Vec<SessionId> {
        let mut evicted = Vec::new();
        for session in self.lobby.registry().snapshot() {
            let idle_for = now.saturating_duration_since(session.last_active_at());
            if idle_for <= self.idle_timeout {
                continue;
            }
            if self.lobby.evict_idle(session.id(), now, self.idle_timeout) {
                info!(
                    "Session {} idle for {:?}, evicted",
                    session.id(),
                    idle_for
                );
                evicted.push(session.id());
            } else {
                debug!("Session {} left or became active before eviction", session.id());
            }
        }
        evicted
    }

    /// Sweeps every `period` until a shutdown signal arrives.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.sweep(Instant::now());
                    if !evicted.is_empty() {
                        info!("Idle sweep evicted {} session(s)", evicted.len());
                    }
                }
                _ = shutdown.recv() => {
                    debug!("Idle reaper stopping");
                    break;
                }
            }
        }
    }
}
