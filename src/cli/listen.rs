//! Listen command implementation

use crate::config::Config;
use crate::realtime::RealtimeClient;
use chrono::Utc;
use clap::Args;
use serde_json::json;

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Only print messages whose `type` matches
    #[arg(short = 't', long = "type")]
    pub message_type: Option<String>,
}

impl ListenArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = RealtimeClient::new(config.realtime.client_config());
        let filter = self.message_type.clone();

        let _subscription = client.subscribe(move |message| {
            if let Some(wanted) = filter.as_deref() {
                if message.message_type() != Some(wanted) {
                    return;
                }
            }
            let line = json!({
                "received_at": Utc::now().to_rfc3339(),
                "message": message.fields(),
            });
            println!("{line}");
        });

        tracing::info!(url = %client.url(), "Listening for realtime messages");
        client.connect();
        super::run_until_interrupted(&client).await
    }
}
