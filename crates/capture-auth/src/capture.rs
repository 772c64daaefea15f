//! Captured selections and the snippet body sent to the API.

use crate::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};

/// Characters of text used for a generated title.
pub const DEFAULT_TITLE_CHARS: usize = 70;

/// What the capture surface hands over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedSelection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_content: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub notes: String,
    pub source_url: String,
}

/// Body of `POST /snippets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetPayload {
    pub title: String,
    pub content: String,
    pub permalink_to_origin: String,
    pub notes: String,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Html,
    Text,
}

impl TryFrom<CapturedSelection> for SnippetPayload {
    type Error = AuthError;

    fn try_from(selection: CapturedSelection) -> AuthResult<Self> {
        let title = selection.title.trim().to_string();
        let text = selection.text_content.trim().to_string();

        if title.is_empty() && text.is_empty() {
            return Err(AuthError::InvalidCapture(
                "Title or content cannot be empty.".to_string(),
            ));
        }

        let title = if title.is_empty() {
            default_title(&text)
        } else {
            title
        };

        let (content, content_type) = if selection.html_content.trim().is_empty() {
            (text, ContentType::Text)
        } else {
            (selection.html_content, ContentType::Html)
        };

        Ok(SnippetPayload {
            title,
            content,
            permalink_to_origin: selection.source_url,
            notes: selection.notes.trim().to_string(),
            content_type,
        })
    }
}

/// First characters of the text, with an ellipsis when cut.
pub fn default_title(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(DEFAULT_TITLE_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
