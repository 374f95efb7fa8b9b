//! Ambient player-count simulation.
//!
//! Nudges the advertised online count by a few players every half hour so
//! repeated status probes see the ebb and flow of a real server instead of
//! a frozen number.

use std::sync::Arc;
use std::time::Duration;

use crate::crypto::SecureRandom;
use crate::server::ServerState;

const TICK: Duration = Duration::from_secs(30 * 60);

pub async fn run(state: Arc<ServerState>) {
    let mut ticker = tokio::time::interval(TICK);
    ticker.tick().await; // skip the immediate first tick
    loop {
        ticker.tick().await;
        let delta = (SecureRandom::u64() % 7) as i32 - 3;
        let mut online = state.online.lock();
        *online = next_online(
            *online,
            delta,
            state.config.online_min,
            state.config.online_max,
        );
        tracing::debug!("player count simulation: {} online", *online);
    }
}

fn next_online(current: i32, delta: i32, min: i32, max: i32) -> i32 {
    (current + delta).clamp(min, max)
}
