//! Track command implementation

use crate::config::Config;
use crate::events::AttendanceTracker;
use crate::realtime::RealtimeClient;
use clap::Args;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct TrackArgs {
    /// How often to log a summary, in seconds
    #[arg(long, default_value_t = 10)]
    pub summary_secs: u64,
}

impl TrackArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = RealtimeClient::new(config.realtime.client_config());
        let tracker = Arc::new(Mutex::new(AttendanceTracker::new()));
        let _subscription = AttendanceTracker::attach(Arc::clone(&tracker), &client);

        client.connect();

        let summary = {
            let tracker = Arc::clone(&tracker);
            let period = Duration::from_secs(self.summary_secs.max(1));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let state = tracker.lock();
                    let stats = state.stats();
                    let latest = state
                        .recent()
                        .next()
                        .and_then(|a| a.user_name.clone())
                        .unwrap_or_else(|| "-".to_string());
                    tracing::info!(
                        present = stats.present,
                        late = stats.late,
                        absent = stats.absent,
                        recent = state.recent().count(),
                        latest = %latest,
                        "Attendance summary"
                    );
                }
            })
        };

        let result = super::run_until_interrupted(&client).await;
        summary.abort();
        result
    }
}
