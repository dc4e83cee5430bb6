//! Style guides for enriching generation prompts
//!
//! A style guide carries the brand vocabulary shared by every job in a
//! catalog: a prefix steering the aesthetic, an optional palette, things to
//! avoid, and the service switches that go with them.

use crate::provider::{ImageSize, SynthesisRequest};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A style guide that enriches generation prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleGuide {
    /// Style name (e.g., "highrise-blue-hour")
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Prepended to every job prompt
    #[serde(default)]
    pub prompt_prefix: Option<String>,
    /// Appended to every job prompt
    #[serde(default)]
    pub prompt_suffix: Option<String>,
    /// Things the model should avoid
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Color palette as hex strings
    #[serde(default)]
    pub palette: Vec<String>,
    /// Allow the service to rewrite the prompt
    #[serde(default = "default_true")]
    pub prompt_extend: bool,
    #[serde(default)]
    pub watermark: bool,
}

impl Default for StyleGuide {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            prompt_prefix: None,
            prompt_suffix: None,
            negative_prompt: None,
            palette: Vec::new(),
            prompt_extend: true,
            watermark: false,
        }
    }
}

impl StyleGuide {
    /// Enrich a prompt with style guide context
    pub fn enrich_prompt(&self, base_prompt: &str) -> String {
        let mut parts = Vec::new();

        if let Some(ref prefix) = self.prompt_prefix {
            parts.push(prefix.trim().to_string());
        }

        parts.push(base_prompt.trim().to_string());

        if !self.palette.is_empty() {
            parts.push(format!("Color palette: {}.", self.palette.join(", ")));
        }

        if let Some(ref suffix) = self.prompt_suffix {
            parts.push(suffix.trim().to_string());
        }

        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    /// Get the negative prompt (if any)
    pub fn negative(&self) -> Option<&str> {
        self.negative_prompt.as_deref().filter(|n| !n.is_empty())
    }

    /// Apply the style's service switches to a request
    pub fn apply(&self, mut request: SynthesisRequest) -> SynthesisRequest {
        request.negative_prompt = self.negative().map(str::to_string);
        request.prompt_extend = self.prompt_extend;
        request.watermark = self.watermark;
        request
    }

    /// A text-only request: the job prompt enriched by this style
    pub fn text_request(&self, job_prompt: &str, size: ImageSize) -> SynthesisRequest {
        self.apply(SynthesisRequest::new(self.enrich_prompt(job_prompt), size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brand() -> StyleGuide {
        StyleGuide {
            name: "brand".to_string(),
            prompt_prefix: Some("Cinematic architectural photography.".to_string()),
            negative_prompt: Some("low quality, blurry".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_style_section() {
        let style: StyleGuide = toml::from_str(
            r##"
name = "copper"
prompt_prefix = "Copper grade."
palette = ["#c07840", "#e0a060"]
prompt_extend = false
"##,
        )
        .unwrap();
        assert_eq!(style.name, "copper");
        assert!(!style.prompt_extend);
        assert!(!style.watermark);
        assert_eq!(style.palette.len(), 2);
    }

    #[test]
    fn test_enrich_prompt_prefix_first() {
        let enriched = brand().enrich_prompt("HERO BACKGROUND: cranes at dusk.");
        assert_eq!(
            enriched,
            "Cinematic architectural photography. HERO BACKGROUND: cranes at dusk."
        );
    }

    #[test]
    fn test_enrich_prompt_with_palette_and_suffix() {
        let style = StyleGuide {
            palette: vec!["#06060a".to_string(), "#c07840".to_string()],
            prompt_suffix: Some("No watermarks.".to_string()),
            ..brand()
        };
        let enriched = style.enrich_prompt("logo");
        assert!(enriched.ends_with("logo Color palette: #06060a, #c07840. No watermarks."));
    }

    #[test]
    fn test_enrich_prompt_minimal_style() {
        assert_eq!(StyleGuide::default().enrich_prompt("simple cube"), "simple cube");
    }

    #[test]
    fn test_text_request_carries_switches() {
        let request = brand().text_request("site", ImageSize::new(928, 928));
        assert_eq!(request.negative_prompt.as_deref(), Some("low quality, blurry"));
        assert!(request.prompt_extend);
        assert!(!request.watermark);
        assert!(request.prompt.starts_with("Cinematic"));
    }
}
