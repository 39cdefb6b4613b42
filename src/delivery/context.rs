// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Resolve who a delivery is addressed to from the host's conversation context.

use serde_json::Value;

use crate::probe::FieldProbe;

/// A group chat or a direct conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationTarget {
    Group(String),
    Private(String),
}

impl ConversationTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Group(id) | Self::Private(id) => id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum Addressing {
    Group,
    Private,
}

/// Context probes in priority order. The message's own addressing is
/// consulted before the chat stream it arrived on.
const CONTEXT_PROBES: &[(FieldProbe, Addressing)] = &[
    (
        FieldProbe::new("message_info.group_info.group_id", &["message_info", "group_info", "group_id"]),
        Addressing::Group,
    ),
    (
        FieldProbe::new("message_info.user_info.user_id", &["message_info", "user_info", "user_id"]),
        Addressing::Private,
    ),
    (
        FieldProbe::new("chat_stream.group_info.group_id", &["chat_stream", "group_info", "group_id"]),
        Addressing::Group,
    ),
    (
        FieldProbe::new("chat_stream.user_info.user_id", &["chat_stream", "user_info", "user_id"]),
        Addressing::Private,
    ),
];

/// Resolve the conversation target, or `None` if the context carries no
/// usable group or user id.
pub fn resolve_target(context: &Value) -> Option<ConversationTarget> {
    CONTEXT_PROBES.iter().find_map(|(probe, addressing)| {
        let id = probe.extract(context)?;
        tracing::debug!("Conversation target from '{}'", probe.name);
        Some(match addressing {
            Addressing::Group => ConversationTarget::Group(id),
            Addressing::Private => ConversationTarget::Private(id),
        })
    })
}

/// Context for a conversation, in the shape [`resolve_target`] reads.
pub fn context_for(target: &ConversationTarget) -> Value {
    match target {
        ConversationTarget::Group(id) => serde_json::json!({
            "message_info": { "group_info": { "group_id": id } }
        }),
        ConversationTarget::Private(id) => serde_json::json!({
            "message_info": { "user_info": { "user_id": id } }
        }),
    }
}
