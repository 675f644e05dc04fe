//! Bilingual query expansion through the chat model.

use std::sync::Arc;

use docqa_core::traits::{ChatMessage, ChatModel};
use docqa_text::analyzer::contains_cjk;
use tracing::{debug, warn};

pub struct QueryExpander {
    chat: Arc<dyn ChatModel>,
}

impl QueryExpander {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Chinese questions are translated to English and vice versa.
    pub fn translation_prompt(query: &str) -> String {
        if contains_cjk(query) {
            format!("Translate the following Chinese query into English. Reply with the translation only:\n{query}")
        } else {
            format!("Translate the following English query into Chinese. Reply with the translation only:\n{query}")
        }
    }

    /// `query` followed by its translation; the query unchanged when the
    /// chat call fails or returns nothing.
    pub async fn expand(&self, query: &str) -> String {
        if query.trim().is_empty() {
            return query.to_string();
        }
        let prompt = Self::translation_prompt(query);
        match self.chat.chat(&[ChatMessage::user(prompt)], None).await {
            Ok(translation) if !translation.trim().is_empty() => {
                let expanded = format!("{query} {}", translation.trim());
                debug!("expanded query: {expanded}");
                expanded
            }
            Ok(_) => query.to_string(),
            Err(e) => {
                warn!("query expansion skipped: {e}");
                query.to_string()
            }
        }
    }
}
