use std::time::Duration;

use tracing::info;

use crate::state::AppState;

/// Background task that closes device sessions idle for longer than `idle`.
pub async fn run_sweep_loop(state: AppState, every: Duration, idle: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let closed = state.sweep_idle(idle).await;
        if closed > 0 {
            info!(
                "Sweep: closed {} idle device sessions, {} open",
                closed,
                state.open_devices().await
            );
        }
    }
}
