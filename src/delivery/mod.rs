// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delivery Dispatcher - get a finished video to whoever asked for it
//!
//! Channels are tried in a fixed order until one succeeds:
//!
//! 1. **Gateway** - local messaging gateway HTTP API, addressed from the
//!    requester's conversation context
//! 2. **Native** - the host's own attachment upload, if it has one
//! 3. **Text** - a plain-text message carrying the download link or path
//!
//! Channel failures are logged and never surface to the caller. The text
//! fallback always counts as delivered.

pub mod context;
pub mod gateway;
pub mod native;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::GatewayConfig;

pub use context::{context_for, resolve_target, ConversationTarget};
pub use gateway::GatewayChannel;
pub use native::NativeChannel;

/// Error types specific to delivery channels.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryError {
    /// Conversation context carries no group or user id.
    NoAddress,
    /// Artifact is not on disk.
    MissingArtifact(String),
    /// Gateway rejected the request or could not be reached.
    Gateway(String),
    /// Requester has no attachment capability.
    Unsupported,
    /// Attachment upload failed.
    Attachment(String),
    /// Plain-text reply failed.
    Text(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAddress => write!(f, "Cannot determine the conversation to send to"),
            Self::MissingArtifact(path) => write!(f, "Video file does not exist: {}", path),
            Self::Gateway(msg) => write!(f, "Gateway error: {}", msg),
            Self::Unsupported => write!(f, "Host does not support attachments"),
            Self::Attachment(msg) => write!(f, "Attachment upload failed: {}", msg),
            Self::Text(msg) => write!(f, "Failed to send reply: {}", msg),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Optional host capability: upload a file as a chat attachment.
#[async_trait]
pub trait AttachmentSender: Send + Sync {
    async fn send_attachment(&self, path: &Path) -> Result<(), DeliveryError>;
}

/// Whoever invoked a command: where replies go and how to reach them.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Send a short text reply.
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError>;

    /// Conversation context as loosely structured JSON.
    fn conversation(&self) -> &Value;

    /// Attachment capability, if the host offers one.
    fn attachment_sender(&self) -> Option<&dyn AttachmentSender> {
        None
    }
}

/// Send a reply, logging instead of failing.
pub async fn reply(requester: &dyn Requester, text: &str) {
    if let Err(e) = requester.send_text(text).await {
        tracing::warn!("{}", e);
    }
}

/// One way of getting a file to the requester.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, artifact: &Path, requester: &dyn Requester) -> Result<(), DeliveryError>;
}

/// What to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    /// Local file; `None` skips straight to the text fallback
    pub artifact: Option<PathBuf>,
    /// Sent if no channel delivers the artifact
    pub fallback_text: String,
}

impl DeliveryRequest {
    pub fn file(artifact: impl Into<PathBuf>, fallback_text: impl Into<String>) -> Self {
        Self {
            artifact: Some(artifact.into()),
            fallback_text: fallback_text.into(),
        }
    }

    pub fn text_only(fallback_text: impl Into<String>) -> Self {
        Self {
            artifact: None,
            fallback_text: fallback_text.into(),
        }
    }
}

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivered by the named channel.
    Channel(String),
    /// Fell back to the plain-text message.
    TextFallback,
}

impl DeliveryOutcome {
    pub fn delivered_file(&self) -> bool {
        matches!(self, Self::Channel(_))
    }
}

/// Tries each channel in order, then falls back to text.
pub struct DeliveryDispatcher {
    channels: Vec<Box<dyn DeliveryChannel>>,
}

impl DeliveryDispatcher {
    pub fn new(channels: Vec<Box<dyn DeliveryChannel>>) -> Self {
        Self { channels }
    }

    /// Gateway first, then native attachment.
    pub fn standard(gateway: &GatewayConfig) -> Self {
        let mut channels: Vec<Box<dyn DeliveryChannel>> = Vec::new();
        match GatewayChannel::new(gateway) {
            Ok(channel) => channels.push(Box::new(channel)),
            Err(e) => tracing::warn!("Gateway channel disabled: {}", e),
        }
        channels.push(Box::new(NativeChannel));
        Self::new(channels)
    }

    /// Channel names in the order they are tried.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Deliver `request`. Never fails.
    pub async fn deliver(&self, request: &DeliveryRequest, requester: &dyn Requester) -> DeliveryOutcome {
        if let Some(artifact) = &request.artifact {
            for channel in &self.channels {
                match channel.deliver(artifact, requester).await {
                    Ok(()) => {
                        tracing::info!("Video delivered via {}", channel.name());
                        return DeliveryOutcome::Channel(channel.name().to_string());
                    }
                    Err(e) => {
                        tracing::warn!("Delivery via {} failed: {}", channel.name(), e);
                    }
                }
            }
        }

        tracing::info!("Falling back to text delivery");
        reply(requester, &request.fallback_text).await;
        DeliveryOutcome::TextFallback
    }
}
