use std::{thread, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::RegistrarConfig,
    core::KeySource,
    error::{ExtractError, Result},
};

/// One published key record as the archive reports it.
///
/// Only `value` is required; the bookkeeping fields may be null or absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEntry {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub first_seen_at: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    /// Raw TXT record, e.g. `v=DKIM1; k=rsa; p=MIIB...`
    pub value: String,
}

/// Outcome of a single fetch attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Connection or transport failure, worth another try
    Transient(String),
    /// The server answered and refused
    Fatal(String),
}

/// Runs `op` up to `attempts` times, sleeping `delay` between transient
/// failures.
pub fn with_retries<T>(
    domain: &str,
    attempts: u32,
    delay: Duration,
    mut op: impl FnMut() -> std::result::Result<T, AttemptError>,
) -> Result<T> {
    let mut tries_left = attempts.max(1);
    loop {
        tries_left -= 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(reason)) => {
                return Err(ExtractError::KeyFetch {
                    domain: domain.to_string(),
                    reason,
                });
            }
            Err(AttemptError::Transient(reason)) if tries_left == 0 => {
                return Err(ExtractError::KeyFetch {
                    domain: domain.to_string(),
                    reason: format!("giving up after {} attempts: {}", attempts.max(1), reason),
                });
            }
            Err(AttemptError::Transient(reason)) => {
                warn!(domain, tries_left, %reason, "key fetch failed, retrying");
                thread::sleep(delay);
            }
        }
    }
}

/// Key transparency archive over HTTP.
pub struct ArchiveKeySource {
    client: reqwest::blocking::Client,
    endpoint: String,
    attempts: u32,
    retry_delay: Duration,
}

impl ArchiveKeySource {
    pub fn new(config: &RegistrarConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            attempts: config.attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn url(&self, domain: &str) -> String {
        format!("{}/api/key?domain={}", self.endpoint, domain)
    }

    fn attempt(&self, url: &str) -> std::result::Result<Vec<KeyEntry>, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| AttemptError::Transient(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Fatal(format!("archive answered {}", status)));
        }
        response
            .json::<Vec<KeyEntry>>()
            .map_err(|e| AttemptError::Fatal(format!("unreadable key list: {}", e)))
    }
}

impl KeySource for ArchiveKeySource {
    fn fetch(&self, domain: &str) -> Result<Vec<KeyEntry>> {
        let url = self.url(domain);
        let entries = with_retries(domain, self.attempts, self.retry_delay, || self.attempt(&url))?;
        debug!(domain, count = entries.len(), "fetched key records");
        Ok(entries)
    }
}
