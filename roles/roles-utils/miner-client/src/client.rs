use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::system_info::SystemInfo;

pub const DEFAULT_PORT: u16 = 80;

/// A miner on the LAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerEndpoint {
    pub name: String,
    pub ip: String,
    pub port: u16,
}

impl MinerEndpoint {
    pub fn new(name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            port,
        }
    }

    pub fn system_info_url(&self) -> String {
        format!("http://{}:{}/api/system/info", self.ip, self.port)
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid system info from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Request { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// HTTP client for the AxeOS API, shared across all miners.
#[derive(Debug, Clone)]
pub struct BitaxeClient {
    http: reqwest::Client,
}

impl BitaxeClient {
    pub fn new(request_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            // Miners are on the LAN
            .no_proxy()
            .pool_idle_timeout(Duration::from_secs(300))
            .pool_max_idle_per_host(1)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { http })
    }

    pub async fn fetch_system_info(
        &self,
        endpoint: &MinerEndpoint,
    ) -> Result<SystemInfo, ClientError> {
        let url = endpoint.system_info_url();

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let info = response
            .json::<SystemInfo>()
            .await
            .map_err(|source| ClientError::Decode {
                url: url.clone(),
                source,
            })?;

        debug!(
            "{}: {:.1} GH/s at {} MHz ({})",
            endpoint.name, info.hash_rate, info.frequency, info.asic_model
        );
        Ok(info)
    }
}
