//! PostgREST implementation of [`DataStore`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::{DataStore, DataStoreError, NotificationConfig, Recipient};

/// HTTP connect timeout.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Longest error body kept in [`DataStoreError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Row store reached through a PostgREST endpoint (`{base}/rest/v1/...`).
pub struct RestDataStore {
    client: reqwest::Client,
    base: Url,
    service_key: String,
}

impl std::fmt::Debug for RestDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDataStore")
            .field("base", &self.base.as_str())
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

impl RestDataStore {
    /// Create a store for `base_url` authenticated with `service_key`.
    ///
    /// # Errors
    ///
    /// Returns [`DataStoreError::InvalidUrl`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        service_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, DataStoreError> {
        // A trailing slash keeps any path prefix when joining.
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Ok(Self {
            client,
            base,
            service_key: service_key.into(),
        })
    }

    /// URL of a table endpoint with the given query pairs.
    ///
    /// # Errors
    ///
    /// Returns [`DataStoreError::InvalidUrl`] if the table path cannot be joined.
    pub fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url, DataStoreError> {
        let mut url = self.base.join(&format!("rest/v1/{table}"))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, DataStoreError> {
        debug!(path = url.path(), "querying data store");
        let response = self
            .client
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DataStoreError::Status {
                status: status.as_u16(),
                body: shorten(&body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DataStore for RestDataStore {
    async fn active_configs(&self, kind: &str) -> Result<Vec<NotificationConfig>, DataStoreError> {
        let type_filter = format!("eq.{kind}");
        let url = self.table_url(
            "communication_configs",
            &[
                ("select", "*"),
                ("type", &type_filter),
                ("is_active", "eq.true"),
            ],
        )?;
        self.fetch_rows(url).await
    }

    async fn recipients_with_roles(
        &self,
        roles: &[String],
    ) -> Result<Vec<Recipient>, DataStoreError> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }
        let role_filter = in_filter(roles);
        let url = self.table_url(
            "team",
            &[("select", "name,role,phone"), ("role", &role_filter)],
        )?;
        self.fetch_rows(url).await
    }
}

/// PostgREST `in.(...)` filter with every value double-quoted.
pub fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn shorten(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened: String = collapsed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return format!("{shortened}...[truncated]");
    }
    collapsed
}
