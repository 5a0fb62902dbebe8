//! Conversation starter suggestions.
//!
//! When an API key is configured the suggestions come from an
//! OpenAI-compatible chat completion endpoint. Every failure falls back to a
//! fixed list, so callers always get something to show.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gallan_shared::constants::STARTER_PROMPT_MESSAGES;
use gallan_shared::protocol::{ConversationStarter, StarterCategory};
use gallan_store::{Message, User};

use crate::config::ServerConfig;

const SYSTEM_PROMPT: &str = "You help users of a messaging app write a first line to send. \
Generate 5 conversation starters based on the provided context. Make them diverse, \
respectful and appropriate. Each starter has a category: \"greeting\", \"question\", \
\"religious\" or \"general\". Keep each one under 80 characters and natural sounding. \
Answer with a JSON object of the form \
{\"starters\": [{\"text\": \"Assalamu alaikum, how are you today?\", \"category\": \"greeting\"}]}. \
Do not use placeholders; be specific to the context.";

/// What the suggestion is based on.
pub struct StarterContext<'a> {
    pub user: &'a User,
    pub contact_name: &'a str,
    pub contact_status: Option<&'a str>,
    /// Recent messages of the chat between the two, oldest first.
    pub recent: &'a [Message],
}

#[derive(Clone)]
pub struct StarterService {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl StarterService {
    pub fn new(config: &ServerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model: config.openai_model.clone(),
        }
    }

    /// Suggestions for `ctx`. Never fails.
    pub async fn suggest(&self, ctx: &StarterContext<'_>) -> Vec<ConversationStarter> {
        let Some(api_key) = self.api_key.as_deref() else {
            return default_starters();
        };

        match self.request(api_key, &build_prompt(ctx)).await {
            Ok(content) => parse_starters(&content).unwrap_or_else(|| {
                warn!("Unusable starter response, serving defaults");
                default_starters()
            }),
            Err(e) => {
                warn!(error = %e, "Starter request failed, serving defaults");
                default_starters()
            }
        }
    }

    async fn request(&self, api_key: &str, prompt: &str) -> Result<String, reqwest::Error> {
        let body = CompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp: CompletionResponse = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(len = content.len(), "Starter response received");
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StarterPayload {
    Wrapped { starters: Vec<ConversationStarter> },
    Bare(Vec<ConversationStarter>),
}

// ---------------------------------------------------------------------------
// Prompt and parsing
// ---------------------------------------------------------------------------

pub fn build_prompt(ctx: &StarterContext<'_>) -> String {
    let contact = ctx.contact_name;
    let mut prompt = format!(
        "Generate conversation starters for a user named {} to send to {contact}.",
        ctx.user.display_name
    );

    if let Some(status) = ctx.contact_status.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!(" {contact}'s status is: \"{status}\"."));
    }

    if ctx.recent.is_empty() {
        prompt.push_str(" This will be their first conversation.");
        return prompt;
    }

    prompt.push_str(" Their most recent conversation includes these messages:\n");
    let skip = ctx.recent.len().saturating_sub(STARTER_PROMPT_MESSAGES);
    for msg in &ctx.recent[skip..] {
        let sender = if msg.sender_id == ctx.user.id {
            ctx.user.display_name.as_str()
        } else {
            contact
        };
        let text = msg.text.as_deref().unwrap_or("(media message)");
        prompt.push_str(&format!("- {sender}: {text}\n"));
    }
    prompt
}

/// Accepts `{"starters": [...]}` or a bare array. Empty lists are rejected.
pub fn parse_starters(content: &str) -> Option<Vec<ConversationStarter>> {
    let starters = match serde_json::from_str::<StarterPayload>(content).ok()? {
        StarterPayload::Wrapped { starters } => starters,
        StarterPayload::Bare(starters) => starters,
    };
    (!starters.is_empty()).then_some(starters)
}

pub fn default_starters() -> Vec<ConversationStarter> {
    use StarterCategory::*;
    vec![
        ConversationStarter::new("Assalamu alaikum, how are you today?", Greeting),
        ConversationStarter::new("Hope you're having a blessed day!", Greeting),
        ConversationStarter::new("What have you been up to lately?", General),
        ConversationStarter::new("Would you like to meet up sometime this week?", Question),
        ConversationStarter::new("Have you heard about the new community event?", General),
    ]
}
