//! InfluxDB 1.x HTTP write sink.

use std::time::Duration;
use tracing::debug;

use super::{encode_batch, Batch, SinkError};
use crate::config::InfluxConfig;

/// Posts batches to `<url>/write?db=<database>&precision=s`.
pub struct InfluxSink {
    client: reqwest::Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxSink {
    pub fn new(cfg: &InfluxConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()
            .map_err(SinkError::Client)?;

        Ok(Self {
            client,
            url: write_url(&cfg.url),
            username: cfg.username.clone().filter(|u| !u.is_empty()),
            password: cfg.password.clone(),
        })
    }

    pub async fn write(&self, batch: &Batch) -> Result<(), SinkError> {
        let body = encode_batch(&batch.records);
        let raw_len = body.len();

        let mut request = self
            .client
            .post(&self.url)
            .query(&[("db", batch.database.as_str()), ("precision", Batch::PRECISION)])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body);

        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let resp = request.send().await.map_err(|source| SinkError::Transport {
            url: self.url.clone(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        debug!(
            records = batch.len(),
            bytes = raw_len,
            database = %batch.database,
            "wrote batch to InfluxDB"
        );

        Ok(())
    }
}

fn write_url(base: &str) -> String {
    let base = if base.contains("://") {
        base.to_string()
    } else {
        format!("http://{}", base)
    };
    format!("{}/write", base.trim_end_matches('/'))
}
