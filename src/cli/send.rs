//! Send command implementation

use crate::config::Config;
use crate::realtime::RealtimeClient;
use anyhow::Context;
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// JSON payload to send
    pub payload: String,

    /// Give up if the connection is not open within this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl SendArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let payload: serde_json::Value =
            serde_json::from_str(&self.payload).context("payload is not valid JSON")?;

        let client = RealtimeClient::new(config.realtime.client_config());
        client.connect();

        let opened = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            client.wait_until_open(),
        )
        .await;

        let result = match opened {
            Ok(Ok(())) => client.send(&payload).map_err(anyhow::Error::from),
            Ok(Err(e)) => Err(anyhow::Error::from(e)),
            Err(_) => Err(anyhow::anyhow!(
                "connection not open after {}s",
                self.timeout_secs
            )),
        };

        client.shutdown().await;
        if result.is_ok() {
            tracing::info!(url = %client.url(), "Message sent");
        }
        result
    }
}
