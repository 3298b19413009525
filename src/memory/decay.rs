// src/memory/decay.rs
// Decay algorithm and the background tick that applies it

use super::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Multiplicative aging applied by each decay pass.
/// Decay factors only move toward zero here; access is what raises them.
pub fn age_decay(decay_factor: f32, aging_factor: f32) -> f32 {
    (decay_factor * aging_factor).clamp(0.0, 1.0)
}

/// Boost applied when an interaction is accessed:
/// `decay := min(1, decay + α·(1−decay))`
pub fn access_boost(decay_factor: f32, alpha: f32) -> f32 {
    (decay_factor + alpha * (1.0 - decay_factor)).min(1.0)
}

/// Spawn the background decay task.
///
/// Each cycle ages every session's short-term tier and demotes items whose
/// decay factor fell below the promotion threshold to long-term only.
pub fn spawn_decay_scheduler(
    store: Arc<MemoryStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut cycles = 0u64;
        loop {
            tokio::time::sleep(interval).await;
            cycles += 1;
            match store.decay_pass().await {
                Ok((aged, demoted)) => {
                    if aged > 0 || demoted > 0 {
                        info!(cycles, aged, demoted, "decay cycle complete");
                    } else {
                        debug!(cycles, "decay cycle: nothing to age");
                    }
                }
                Err(err) => warn!(cycles, error = %err, "decay cycle failed"),
            }
        }
    })
}
