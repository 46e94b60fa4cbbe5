//! Shared HTTP client pool with per-request timeout, optional untrusted
//! TLS, and capped body reads.

use crate::error::Result;
use crate::models::ResponseInfo;
use crate::settings::ExecutionSettings;
use indexmap::IndexMap;
use reqwest::Client;

/// One reusable client per run; connection pooling comes from reqwest.
#[derive(Debug, Clone)]
pub struct HttpClientPool {
    client: Client,
    max_body_bytes: usize,
}

impl HttpClientPool {
    pub fn new(settings: &ExecutionSettings) -> Result<Self> {
        if settings.allow_untrusted_ssl {
            log::warn!("TLS certificate validation is DISABLED (allow_untrusted_ssl = true)");
        }

        let client = Client::builder()
            .timeout(settings.request_timeout())
            .danger_accept_invalid_certs(settings.allow_untrusted_ssl)
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: settings.max_body_bytes,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Read the response fully, capping the recorded body at the
    /// configured maximum. Oversized bodies are truncated and flagged.
    pub async fn read_response(&self, response: reqwest::Response) -> Result<ResponseInfo> {
        let status_code = response.status().as_u16();
        let headers = merge_headers(&response);

        let mut body_bytes: Vec<u8> = Vec::new();
        let mut truncated = false;
        let mut response = response;
        while let Some(chunk) = response.chunk().await? {
            if body_bytes.len() + chunk.len() > self.max_body_bytes {
                let remaining = self.max_body_bytes - body_bytes.len();
                body_bytes.extend_from_slice(&chunk[..remaining]);
                truncated = true;
                log::warn!(
                    "Response body exceeded {} bytes, truncating",
                    self.max_body_bytes
                );
                break;
            }
            body_bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&body_bytes).into_owned();
        Ok(ResponseInfo {
            status_code,
            headers,
            body,
            body_truncated: truncated,
        })
    }
}

/// Collect response headers into one mapping; multi-valued headers are
/// joined with ",".
fn merge_headers(response: &reqwest::Response) -> IndexMap<String, String> {
    let mut merged: IndexMap<String, String> = IndexMap::new();
    for key in response.headers().keys() {
        let values: Vec<&str> = response
            .headers()
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        merged.insert(key.as_str().to_string(), values.join(","));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_construction_with_defaults() {
        let settings = ExecutionSettings::default();
        let pool = HttpClientPool::new(&settings).unwrap();
        assert_eq!(pool.max_body_bytes, settings.max_body_bytes);
    }

    #[test]
    fn test_pool_construction_with_untrusted_ssl() {
        let settings = ExecutionSettings {
            allow_untrusted_ssl: true,
            ..ExecutionSettings::default()
        };
        assert!(HttpClientPool::new(&settings).is_ok());
    }
}
