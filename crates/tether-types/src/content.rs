//! Content model for results returned by the tool server.

use serde::{Deserialize, Serialize};

/// A content item in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Resource {
        uri: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

/// Structured result of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub content: Vec<ContentItem>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

/// One entry from a resource read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBlock {
    pub uri: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Result of reading a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContents {
    pub contents: Vec<ResourceBlock>,
}

/// One message from a rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: serde_json::Value,
}

/// Result of fetching a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_call_result_text() {
        let json = r#"{
            "content": [{"type": "text", "text": "three matching threads"}],
            "isError": false
        }"#;
        let result: CallResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.content.len(), 1);
        assert!(!result.is_error);
        match &result.content[0] {
            ContentItem::Text { text } => assert_eq!(text, "three matching threads"),
            _ => panic!("Expected text content"),
        }
    }

    #[test]
    fn deserialize_call_result_error() {
        let json = r#"{
            "content": [{"type": "text", "text": "no such template"}],
            "isError": true
        }"#;
        let result: CallResult = serde_json::from_str(json).unwrap();
        assert!(result.is_error);
    }

    #[test]
    fn is_error_defaults_to_false() {
        let json = r#"{"content": []}"#;
        let result: CallResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_error);
    }

    #[test]
    fn deserialize_resource_item() {
        let json = r#"{
            "content": [{"type": "resource", "uri": "doc://templates/42", "mimeType": "text/markdown"}]
        }"#;
        let result: CallResult = serde_json::from_str(json).unwrap();
        match &result.content[0] {
            ContentItem::Resource { uri, mime_type, text } => {
                assert_eq!(uri, "doc://templates/42");
                assert_eq!(mime_type.as_deref(), Some("text/markdown"));
                assert!(text.is_none());
            }
            _ => panic!("Expected resource content"),
        }
    }

    #[test]
    fn deserialize_resource_contents() {
        let json = r#"{
            "contents": [{"uri": "doc://guide", "text": "hello"}]
        }"#;
        let result: ResourceContents = serde_json::from_str(json).unwrap();
        assert_eq!(result.contents.len(), 1);
        assert_eq!(result.contents[0].text.as_deref(), Some("hello"));
    }

    #[test]
    fn deserialize_prompt_result() {
        let json = r#"{
            "description": "summarize a thread",
            "messages": [{"role": "user", "content": {"type": "text", "text": "Summarize: ..."}}]
        }"#;
        let result: PromptResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.description.as_deref(), Some("summarize a thread"));
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, "user");
    }
}
