//! Direct Line v3 wire types.
//!
//! Only the fields the relay reads or writes are modelled; everything else the
//! bot service sends is ignored during deserialization.

use serde::{Deserialize, Serialize};

pub const ACTIVITY_TYPE_MESSAGE: &str = "message";

/// Response body of `POST /v3/directline/conversations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A single unit of conversational exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Activity {
    /// Outbound user message.
    pub fn message(text: &str, sender_id: &str, locale: &str) -> Self {
        Self {
            activity_type: Some(ACTIVITY_TYPE_MESSAGE.to_string()),
            from: Some(ChannelAccount {
                id: Some(sender_id.to_string()),
                name: None,
            }),
            text: Some(text.to_string()),
            locale: Some(locale.to_string()),
            ..Default::default()
        }
    }

    pub fn sender_id(&self) -> Option<&str> {
        self.from.as_ref().and_then(|f| f.id.as_deref())
    }

    pub fn is_message(&self) -> bool {
        self.activity_type.as_deref() == Some(ACTIVITY_TYPE_MESSAGE)
    }
}

/// Response body of `GET .../activities`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivitySet {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub watermark: Option<String>,
}
