use std::time::Duration;

use ai_client::{strip_wrapping, ChatOptions, OpenAi};
use async_trait::async_trait;
use discovery_common::{SearchResult, CONFIDENCE_LLM};
use tracing::{debug, info};
use url::Url;

use super::{suspension_key_for, PlatformQuery, SearchProvider};
use crate::error::ProviderError;

const NOT_FOUND: &str = "NOT_FOUND";

const SYSTEM_PROMPT: &str = "You locate official business profiles on review sites and social networks. \
Answer with the single full profile URL and nothing else. \
If you are not certain the profile belongs to this exact business, answer NOT_FOUND.";

/// Last-resort lookup that asks a language model for the profile URL.
/// Answers are low confidence and must pass a liveness check.
pub struct LlmLookup {
    client: OpenAi,
    suspension_key: String,
    timeout: Duration,
}

impl LlmLookup {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: OpenAi::new(api_key, model),
            suspension_key: suspension_key_for("openai", api_key),
            timeout,
        }
    }
}

fn user_prompt(query: &PlatformQuery) -> String {
    let mut prompt = format!(
        "What is the {} page URL for the business \"{}\"",
        query.platform.label(),
        query.business.name.trim()
    );
    if let Some(address) = query.business.address_str() {
        prompt.push_str(&format!(" located at {address}"));
    }
    prompt.push_str("? Reply with only the URL, or NOT_FOUND.");
    prompt
}

/// Accept a bare http(s) URL or the NOT_FOUND sentinel. Anything else
/// (prose, several URLs, markdown links) is treated as no answer.
pub(crate) fn parse_answer(answer: &str) -> Option<String> {
    let value = strip_wrapping(answer);
    if value.eq_ignore_ascii_case(NOT_FOUND) || value.contains(NOT_FOUND) {
        return None;
    }
    if value.contains(char::is_whitespace) {
        return None;
    }
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return None;
    }
    let url = Url::parse(value).ok()?;
    url.host_str()?;
    Some(value.to_string())
}

#[async_trait]
impl SearchProvider for LlmLookup {
    fn name(&self) -> &str {
        "openai"
    }

    fn suspension_key(&self) -> String {
        self.suspension_key.clone()
    }

    fn confidence(&self) -> f32 {
        CONFIDENCE_LLM
    }

    fn requires_liveness_check(&self) -> bool {
        true
    }

    async fn search(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, ProviderError> {
        let options = ChatOptions {
            temperature: 0.1,
            max_tokens: 200,
            timeout: Some(self.timeout),
        };
        let answer = self
            .client
            .chat_completion_with(SYSTEM_PROMPT, user_prompt(query), options)
            .await?;

        match parse_answer(&answer) {
            Some(url) => {
                info!(platform = %query.platform, url, "LLM suggested profile");
                Ok(vec![SearchResult {
                    url,
                    title: String::new(),
                    snippet: String::new(),
                }])
            }
            None => {
                debug!(platform = %query.platform, "LLM returned no usable URL");
                Ok(Vec::new())
            }
        }
    }
}
