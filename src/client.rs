//! Authenticated requests against the Rancher v3 API.
//!
//! Certificate verification is disabled on purpose: pipelines usually talk
//! to Rancher servers behind internal or self-signed certificates. Anyone
//! pointing this at a public endpoint should know the bearer token is sent
//! over a connection that is not authenticated.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{ConfigError, DeployError, Result};

/// One request/response round trip against the control plane.
///
/// Any transport failure or non-2xx status is an error; the raw body is
/// returned otherwise. Nothing is retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Vec<u8>>;
}

pub struct RancherClient {
    client: reqwest::Client,
}

impl RancherClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ConfigError::Invalid {
                flag: "rancher-api-token",
                reason: "not a valid header value".to_string(),
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(DeployError::ClientSetup)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ControlPlane for RancherClient {
    async fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Vec<u8>> {
        tracing::debug!(%method, url, "request");

        let transport = |source: reqwest::Error| DeployError::Transport {
            method: method.clone(),
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .request(method.clone(), url)
            .body(body.unwrap_or_default())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::Status {
                method: method.clone(),
                url: url.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

/// GET `url` and decode the body as JSON.
pub async fn get_json<T: DeserializeOwned>(api: &dyn ControlPlane, url: &str) -> Result<T> {
    let body = api.send(Method::GET, url, None).await?;
    tracing::trace!(url, body = %String::from_utf8_lossy(&body), "response");
    serde_json::from_slice(&body).map_err(|source| DeployError::Decode {
        url: url.to_string(),
        source,
    })
}
