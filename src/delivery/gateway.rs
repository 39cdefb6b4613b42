// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delivery through a local messaging gateway's HTTP control API.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::context::{resolve_target, ConversationTarget};
use super::{DeliveryChannel, DeliveryError, Requester};
use crate::config::GatewayConfig;
use crate::utils::{truncate_for_log, LOG_PAYLOAD_LIMIT};

/// Uploading a large video through the gateway can be slow.
const GATEWAY_TIMEOUT_SECS: u64 = 300;

const DEFAULT_HOST: &str = "localhost";

/// Posts a video message to `http://{host}:{port}/send_{group,private}_msg`.
#[derive(Debug, Clone)]
pub struct GatewayChannel {
    client: reqwest::Client,
    host: String,
    port: u16,
    token: Option<String>,
}

impl GatewayChannel {
    pub fn new(config: &GatewayConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
            .build()
            .map_err(|e| DeliveryError::Gateway(format!("Failed to create HTTP client: {}", e)))?;
        let token = config.token.trim();
        Ok(Self {
            client,
            host: DEFAULT_HOST.to_string(),
            port: config.port,
            token: (!token.is_empty()).then(|| token.to_string()),
        })
    }

    /// Target a host other than localhost.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Endpoint for a conversation.
    pub fn endpoint(&self, target: &ConversationTarget) -> String {
        let action = if target.is_group() {
            "send_group_msg"
        } else {
            "send_private_msg"
        };
        format!("http://{}:{}/{}", self.host, self.port, action)
    }

    /// Request body for sending `artifact` to `target`.
    pub fn payload(&self, target: &ConversationTarget, artifact: &Path) -> Value {
        let key = if target.is_group() { "group_id" } else { "user_id" };
        let mut body = json!({
            "message": [
                {
                    "type": "video",
                    "data": { "file": format!("file://{}", artifact.display()) }
                }
            ]
        });
        body[key] = Value::String(target.id().to_string());
        if let Some(token) = &self.token {
            body["token"] = Value::String(token.clone());
        }
        body
    }
}

#[async_trait]
impl DeliveryChannel for GatewayChannel {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn deliver(&self, artifact: &Path, requester: &dyn Requester) -> Result<(), DeliveryError> {
        if !artifact.exists() {
            return Err(DeliveryError::MissingArtifact(artifact.display().to_string()));
        }

        let target = resolve_target(requester.conversation()).ok_or(DeliveryError::NoAddress)?;
        let url = self.endpoint(&target);
        tracing::debug!("Sending video via gateway: {} -> {:?}", url, target);

        let mut request = self.client.post(&url).json(&self.payload(&target, artifact));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Gateway("Request timed out.".to_string())
            } else {
                DeliveryError::Gateway(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DeliveryError::Gateway(format!(
                "HTTP {} - {}",
                status,
                truncate_for_log(&text, LOG_PAYLOAD_LIMIT)
            )));
        }

        tracing::debug!("Gateway accepted video: {}", truncate_for_log(&text, LOG_PAYLOAD_LIMIT));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn channel(token: &str) -> GatewayChannel {
        GatewayChannel::new(&GatewayConfig {
            port: 3000,
            token: token.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoints() {
        let gw = channel("");
        assert_eq!(
            gw.endpoint(&ConversationTarget::Group("1".into())),
            "http://localhost:3000/send_group_msg"
        );
        assert_eq!(
            gw.with_host("127.0.0.1").endpoint(&ConversationTarget::Private("2".into())),
            "http://127.0.0.1:3000/send_private_msg"
        );
    }

    #[test]
    fn test_payload_group_without_token() {
        let gw = channel("  ");
        let body = gw.payload(
            &ConversationTarget::Group("123".into()),
            &PathBuf::from("/videos/1.mp4"),
        );
        assert_eq!(body["group_id"], "123");
        assert!(body.get("user_id").is_none());
        assert!(body.get("token").is_none());
        assert_eq!(body["message"][0]["type"], "video");
        assert_eq!(body["message"][0]["data"]["file"], "file:///videos/1.mp4");
    }

    #[test]
    fn test_payload_private_with_token() {
        let gw = channel("secret");
        let body = gw.payload(
            &ConversationTarget::Private("42".into()),
            &PathBuf::from("/videos/2.mp4"),
        );
        assert_eq!(body["user_id"], "42");
        assert_eq!(body["token"], "secret");
    }
}
