//! DashScope multimodal provider
//!
//! Both the vision "describe" call and the image "synthesize" call go to the
//! same multimodal-generation endpoint and come back in the same envelope:
//! either `output.choices[0].message.content` (a list of `{text}` / `{image}`
//! items, or occasionally a bare string) or a machine-readable `code`.

use crate::config::{BrandgenConfig, DASHSCOPE};
use crate::provider::{GenerationProvider, GenerationResult, SynthesisRequest};
use crate::retry::AttemptOutcome;
use crate::transport::{HttpRequest, HttpTransport};
use brandgen_core::{BrandgenError, Result};
use serde::Deserialize;

const DEFAULT_DASHSCOPE_URL: &str = "https://dashscope-intl.aliyuncs.com";
const GENERATION_PATH: &str = "/api/v1/services/aigc/multimodal-generation/generation";
const DEFAULT_DESCRIBE_MODEL: &str = "qwen-vl-max";
const DEFAULT_IMAGE_MODEL: &str = "qwen-image-max";

/// Error code the service returns when the caller should back off
pub const RATE_LIMIT_CODE: &str = "Throttling.RateQuota";

/// How much of an unexpected body to quote in errors
const SNIPPET_LEN: usize = 400;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    output: Option<Output>,
}

#[derive(Debug, Deserialize)]
struct Output {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Content,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Items(Vec<ContentItem>),
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl Envelope {
    fn first_content(&self) -> Option<&Content> {
        self.output
            .as_ref()
            .and_then(|o| o.choices.first())
            .map(|c| &c.message.content)
    }
}

/// DashScope provider for image description and synthesis
pub struct DashScopeProvider<T: HttpTransport> {
    transport: T,
    api_key: String,
    api_url: String,
    describe_model: String,
    image_model: String,
}

impl<T: HttpTransport> DashScopeProvider<T> {
    /// Create a provider from config; a missing API key is a config error
    pub fn from_config(config: &BrandgenConfig, transport: T) -> Result<Self> {
        let api_key = config.require_generation_key()?.to_string();
        let section = config.provider(DASHSCOPE);

        let api_url = config
            .api_url(DASHSCOPE)
            .unwrap_or(DEFAULT_DASHSCOPE_URL)
            .trim_end_matches('/')
            .to_string();
        let describe_model = section
            .and_then(|p| p.describe_model.clone())
            .unwrap_or_else(|| DEFAULT_DESCRIBE_MODEL.to_string());
        let image_model = section
            .and_then(|p| p.image_model.clone())
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());

        Ok(Self {
            transport,
            api_key,
            api_url,
            describe_model,
            image_model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.api_url, GENERATION_PATH)
    }

    fn post(&self, payload: &serde_json::Value) -> Result<(u16, String)> {
        let request = HttpRequest::post(self.endpoint())
            .bearer(&self.api_key)
            .json(payload);
        let response = self.transport.execute(request)?;
        let status = response.status;
        Ok((status, response.text()?))
    }

    /// Body of the vision call: the image first, then the instruction
    pub fn describe_payload(&self, image_url: &str, instruction: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.describe_model,
            "input": {
                "messages": [{
                    "role": "user",
                    "content": [
                        { "image": image_url },
                        { "text": instruction }
                    ]
                }]
            }
        })
    }

    /// Body of the image synthesis call
    pub fn synthesis_payload(&self, request: &SynthesisRequest) -> serde_json::Value {
        let mut parameters = serde_json::json!({
            "size": request.size.to_string(),
            "prompt_extend": request.prompt_extend,
            "watermark": request.watermark,
        });
        if let Some(ref negative) = request.negative_prompt {
            parameters["negative_prompt"] = serde_json::json!(negative);
        }

        serde_json::json!({
            "model": self.image_model,
            "input": {
                "messages": [{
                    "role": "user",
                    "content": [{ "text": request.prompt }]
                }]
            },
            "parameters": parameters
        })
    }
}

impl<T: HttpTransport> GenerationProvider for DashScopeProvider<T> {
    fn name(&self) -> &str {
        "dashscope"
    }

    fn describe(&self, image_url: &str, instruction: &str) -> Result<String> {
        let payload = self.describe_payload(image_url, instruction);
        let (status, body) = self.post(&payload).map_err(|e| match e {
            BrandgenError::TransportError(msg) => BrandgenError::DescriptionError(msg),
            other => other,
        })?;

        if !(200..300).contains(&status) {
            return Err(BrandgenError::DescriptionError(format!(
                "HTTP {}: {}",
                status,
                snippet(&body)
            )));
        }
        parse_description(&body)
    }

    fn synthesize_once(&self, request: &SynthesisRequest) -> Result<AttemptOutcome<GenerationResult>> {
        let payload = self.synthesis_payload(request);
        let (status, body) = self.post(&payload).map_err(|e| match e {
            BrandgenError::TransportError(msg) => BrandgenError::GenerationError(msg),
            other => other,
        })?;
        tracing::debug!(status, "synthesis response");
        // Rate limits arrive as non-2xx with a JSON code, so the body is
        // inspected whatever the status
        parse_synthesis(&body)
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(SNIPPET_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Extract the first textual block from a describe response
pub fn parse_description(json: &str) -> Result<String> {
    let envelope: Envelope = serde_json::from_str(json).map_err(|_| {
        BrandgenError::DescriptionError(format!("Non-JSON response: {}", snippet(json)))
    })?;

    let text = match envelope.first_content() {
        Some(Content::Text(text)) => Some(text.clone()),
        Some(Content::Items(items)) => items
            .iter()
            .find_map(|item| item.text.clone().filter(|t| !t.is_empty())),
        None => None,
    };

    text.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
        BrandgenError::DescriptionError(format!(
            "No text in response ({}): {}",
            envelope.code.as_deref().unwrap_or("no code"),
            snippet(json)
        ))
    })
}

/// Classify a synthesis response: image URL, rate limit, or failure
pub fn parse_synthesis(json: &str) -> Result<AttemptOutcome<GenerationResult>> {
    let envelope: Envelope = serde_json::from_str(json).map_err(|_| {
        BrandgenError::GenerationError(format!("Non-JSON response: {}", snippet(json)))
    })?;

    if envelope.code.as_deref() == Some(RATE_LIMIT_CODE) {
        return Ok(AttemptOutcome::RateLimited(RATE_LIMIT_CODE.to_string()));
    }

    if let Some(Content::Items(items)) = envelope.first_content() {
        if let Some(url) = items.iter().find_map(|item| item.image.clone()) {
            return Ok(AttemptOutcome::Ready(GenerationResult { url }));
        }
    }

    Err(BrandgenError::GenerationError(match (envelope.code, envelope.message) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code,
        _ => format!("Unexpected response: {}", snippet(json)),
    }))
}
