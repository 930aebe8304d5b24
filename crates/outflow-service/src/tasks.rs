//! Background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::state::AppState;

/// Spawn the periodic dispatcher loop.
///
/// Ticks every `dispatch_interval_seconds`; a tick that overruns the
/// interval is skipped, and every tick runs through the dead-letter
/// recorder so a failing run is captured rather than lost.
pub fn spawn_dispatch_loop(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let interval_seconds = state.config.dispatch_interval_seconds;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let result = state
                .dead_letters
                .run(
                    "dispatch_due_sends",
                    serde_json::json!({ "trigger": "interval" }),
                    state.dispatcher.run(),
                )
                .await;
            match result {
                Ok(summary) if summary.claimed > 0 => {
                    tracing::debug!(
                        sent = %summary.sent,
                        failed = %summary.failed,
                        skipped = %summary.skipped,
                        "Dispatch tick complete"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Dispatch tick failed");
                }
            }
        }
    })
}
