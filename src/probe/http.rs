//! HTTP probe implementation.

use super::{HttpProbe, ProbeError};
use async_trait::async_trait;
use std::error::Error as StdError;

/// Probe transport backed by a shared `reqwest` client.
///
/// No request timeout is set; each attempt is bounded only by the client's defaults.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("sitewatch/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(network_error)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self.client.get(url).send().await.map_err(network_error)?;
        Ok(response.status().as_u16())
    }
}

fn network_error(err: reqwest::Error) -> ProbeError {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }

    ProbeError::Network {
        message: err.to_string(),
        detail,
    }
}
