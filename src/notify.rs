//! Outbound notification sink used by scheduled triggers. Delivery is implemented by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Markdown,
    Card,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct PushMessage {
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
}

impl PushMessage {
    pub fn text(
        title: &str,
        content: String,
    ) -> Self {
        Self {
            title: Some(title.to_string()),
            content,
            kind: MessageKind::Text,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct PushOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Where a trigger delivers its result.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PushTarget {
    /// free-form channel label, e.g. `feishu`
    pub channel: String,
    pub webhook_url: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push(
        &self,
        webhook_url: &str,
        message: &PushMessage,
    ) -> PushOutcome;
}

/// Renders call data as message text: strings as-is, everything else as compact JSON.
pub fn render(data: Option<&Value>) -> String {
    match data {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{MessageKind, PushMessage, render};

    #[test]
    fn test_render() {
        assert_eq!(render(Some(&json!("hello"))), "hello");
        assert_eq!(render(Some(&json!({"a": 1}))), r#"{"a":1}"#);
        assert_eq!(render(None), "null");
    }

    #[test]
    fn test_message_deserialize_default_kind() {
        let msg: PushMessage = serde_json::from_value(json!({"content": "x"})).unwrap();
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.title, None);
    }
}
