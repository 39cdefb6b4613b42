// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Direct attachment through the host, when it offers that capability.

use std::path::Path;

use async_trait::async_trait;

use super::{DeliveryChannel, DeliveryError, Requester};

/// Hands the file to the requester's own attachment sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeChannel;

#[async_trait]
impl DeliveryChannel for NativeChannel {
    fn name(&self) -> &str {
        "native"
    }

    async fn deliver(&self, artifact: &Path, requester: &dyn Requester) -> Result<(), DeliveryError> {
        // Queried once per attempt
        let sender = requester
            .attachment_sender()
            .ok_or(DeliveryError::Unsupported)?;
        sender.send_attachment(artifact).await
    }
}
