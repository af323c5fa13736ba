//! Dashboard API client

use anyhow::{Context, Result};
use fleetclaim_core::{
    ClaimResponse, DeviceUpdate, Directory, DirectoryError, InventoryDevice, NetworkDevice,
    NetworkInfo, Organization,
};
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Public dashboard API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1";

/// Page size for paginated listings (API maximum)
const PER_PAGE: u32 = 1000;

/// Wait used when a 429 response carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Dashboard client with rate-limit retry
pub struct DashboardClient {
    /// HTTP client
    client: reqwest::Client,
    /// API root without trailing slash
    base_url: String,
    api_key: String,
    /// Retries allowed per request after a 429
    max_retries: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest<'a> {
    serials: &'a [String],
    add_atomically: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

impl DashboardClient {
    /// Create a new client
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fleetclaim/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, sleeping and retrying while the API answers 429
    async fn execute(&self, request: RequestBuilder) -> Result<Response, DirectoryError> {
        let request = request.bearer_auth(&self.api_key);
        let mut attempts = 0;

        loop {
            let attempt = request.try_clone().ok_or_else(|| {
                DirectoryError::Transport("request body cannot be replayed".to_string())
            })?;
            let response = attempt
                .send()
                .await
                .map_err(|e| DirectoryError::Transport(e.to_string()))?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                attempts += 1;
                if attempts > self.max_retries {
                    return Err(DirectoryError::RateLimited(attempts));
                }
                let wait = retry_after(response.headers());
                warn!(
                    url = %response.url(),
                    attempt = attempts,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limited, retrying"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DirectoryError::Status {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            return Ok(response);
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DirectoryError> {
        let response = self.execute(self.client.get(self.url(path))).await?;
        response
            .json()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }

    /// Follow `Link: rel=next` until every page is collected
    async fn get_paged<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, DirectoryError> {
        let mut url = format!("{}?perPage={}", self.url(path), PER_PAGE);
        let mut items = Vec::new();

        loop {
            let response = self.execute(self.client.get(&url)).await?;
            let next = next_link(response.headers());
            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| DirectoryError::Decode(e.to_string()))?;
            debug!(url = %url, items = page.len(), "Fetched page");
            items.extend(page);

            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(items)
    }
}

impl Directory for DashboardClient {
    async fn organizations(&self) -> Result<Vec<Organization>, DirectoryError> {
        self.get_json("/organizations").await
    }

    async fn inventory_devices(&self, org_id: &str) -> Result<Vec<InventoryDevice>, DirectoryError> {
        self.get_paged(&format!("/organizations/{}/inventory/devices", org_id))
            .await
    }

    async fn networks(&self, org_id: &str) -> Result<Vec<NetworkInfo>, DirectoryError> {
        self.get_paged(&format!("/organizations/{}/networks", org_id))
            .await
    }

    async fn network_devices(&self, network_id: &str) -> Result<Vec<NetworkDevice>, DirectoryError> {
        self.get_json(&format!("/networks/{}/devices", network_id))
            .await
    }

    async fn claim_devices(
        &self,
        network_id: &str,
        serials: &[String],
    ) -> Result<ClaimResponse, DirectoryError> {
        let body = ClaimRequest {
            serials,
            add_atomically: true,
        };
        let request = self
            .client
            .post(self.url(&format!("/networks/{}/devices/claim", network_id)))
            .json(&body);
        let response = self.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }

    async fn update_device(&self, serial: &str, update: &DeviceUpdate) -> Result<(), DirectoryError> {
        let request = self
            .client
            .put(self.url(&format!("/devices/{}", serial)))
            .json(update);
        self.execute(request).await?;
        Ok(())
    }
}

/// Extract the `rel=next` target from a `Link` header
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .map(|p| p.trim().replace('"', ""))
            .any(|p| p.eq_ignore_ascii_case("rel=next"));
        if !is_next {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Prefer the API's `errors` list over the raw body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join(", "),
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(name: reqwest::header::HeaderName, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn test_next_link() {
        let map = headers(
            LINK,
            "<https://api.example.com/api/v1/organizations/1/networks?perPage=1000>; rel=first, \
             <https://api.example.com/api/v1/organizations/1/networks?perPage=1000&startingAfter=N_9>; rel=next",
        );
        assert_eq!(
            next_link(&map).as_deref(),
            Some("https://api.example.com/api/v1/organizations/1/networks?perPage=1000&startingAfter=N_9")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let map = headers(LINK, "<https://x/first>; rel=first, <https://x/prev>; rel=\"prev\"");
        assert_eq!(next_link(&map), None);
        assert_eq!(next_link(&HeaderMap::new()), None);
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(retry_after(&headers(RETRY_AFTER, "3")), Duration::from_secs(3));
        assert_eq!(retry_after(&headers(RETRY_AFTER, "soon")), DEFAULT_RETRY_AFTER);
        assert_eq!(retry_after(&HeaderMap::new()), DEFAULT_RETRY_AFTER);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"errors":["Serial not found","Invalid network"]}"#),
            "Serial not found, Invalid network"
        );
        assert_eq!(error_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = DashboardClient::new(
            "https://api.example.com/api/v1/",
            "key",
            Duration::from_secs(5),
            2,
        )
        .unwrap();
        assert_eq!(client.url("/organizations"), "https://api.example.com/api/v1/organizations");
    }

    #[test]
    fn test_claim_request_body() {
        let serials = vec!["Q2XX-AAAA-0001".to_string()];
        let body = serde_json::to_value(ClaimRequest {
            serials: &serials,
            add_atomically: true,
        })
        .unwrap();
        assert_eq!(body["addAtomically"], true);
        assert_eq!(body["serials"][0], "Q2XX-AAAA-0001");
    }
}
