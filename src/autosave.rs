use std::sync::Weak;
use std::time::Duration;

use tracing::debug;

use crate::engine::Engine;

/// Background task that writes the draft to the store whenever it changed
/// since the last write. Exits once the engine is dropped.
pub async fn run_autosaver(engine: Weak<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if engine.persist_if_changed().await {
            debug!("{}: autosaved draft", engine.tenant());
        }
    }
}
