//! Generation provider trait and request/result types

use crate::retry::{AttemptOutcome, RetryPolicy, Sleeper};
use brandgen_core::{BrandgenError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default template joining a style prompt and a scene description
pub const DEFAULT_SCENE_TEMPLATE: &str =
    "{style}\n\nSCENE TO RECREATE (from original photo): {description}";

/// Output size in the service's `W*H` notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.width, self.height)
    }
}

impl FromStr for ImageSize {
    type Err = BrandgenError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BrandgenError::ConfigError(format!("Invalid image size '{}', expected W*H", s));
        let (w, h) = s.split_once('*').ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl Serialize for ImageSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A request to synthesize one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// Final prompt sent to the image model
    pub prompt: String,
    pub size: ImageSize,
    pub negative_prompt: Option<String>,
    /// Let the service rewrite/extend the prompt
    pub prompt_extend: bool,
    pub watermark: bool,
}

impl SynthesisRequest {
    pub fn new(prompt: impl Into<String>, size: ImageSize) -> Self {
        Self {
            prompt: prompt.into(),
            size,
            negative_prompt: None,
            prompt_extend: true,
            watermark: false,
        }
    }

    /// Combine style directives with a scene description. `template` uses
    /// `{style}` and `{description}` placeholders.
    pub fn restyle(template: &str, style_prompt: &str, description: &str, size: ImageSize) -> Self {
        Self::new(fill_template(template, style_prompt, description.trim()), size)
    }
}

/// Substitute both placeholders in one pass, so neither value is rescanned
fn fill_template(template: &str, style: &str, description: &str) -> String {
    let mut out = String::with_capacity(template.len() + style.len() + description.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{style}") {
            out.push_str(style);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{description}") {
            out.push_str(description);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// The remote, ephemeral location of a produced image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub url: String,
}

/// Trait implemented by each generation backend (DashScope, test mock)
pub trait GenerationProvider {
    /// Provider name recorded in the manifest
    fn name(&self) -> &str;

    /// Describe the image at `image_url` following `instruction`
    fn describe(&self, image_url: &str, instruction: &str) -> Result<String>;

    /// Issue one synthesis request. A rate-limit signal is reported as
    /// [`AttemptOutcome::RateLimited`], never as an error.
    fn synthesize_once(&self, request: &SynthesisRequest) -> Result<AttemptOutcome<GenerationResult>>;

    /// Synthesize with rate-limit backoff
    fn synthesize(
        &self,
        request: &SynthesisRequest,
        policy: &RetryPolicy,
        sleeper: &dyn Sleeper,
    ) -> Result<GenerationResult> {
        policy.run(sleeper, |_| self.synthesize_once(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        let size: ImageSize = "1664*928".parse().unwrap();
        assert_eq!(size, ImageSize::new(1664, 928));
        assert_eq!(size.to_string(), "1664*928");
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!("1024x768".parse::<ImageSize>().is_err());
        assert!("0*768".parse::<ImageSize>().is_err());
        assert!("*".parse::<ImageSize>().is_err());
    }

    #[test]
    fn test_size_in_toml() {
        #[derive(Deserialize)]
        struct Holder {
            size: ImageSize,
        }
        let h: Holder = toml::from_str("size = \"928*928\"").unwrap();
        assert_eq!(h.size, ImageSize::new(928, 928));
        assert!(toml::from_str::<Holder>("size = \"big\"").is_err());
    }

    #[test]
    fn test_restyle_prompt_orders_style_first() {
        let req = SynthesisRequest::restyle(
            DEFAULT_SCENE_TEMPLATE,
            "Copper grade.",
            "  A tipper truck on red soil.\n",
            ImageSize::new(1024, 768),
        );
        assert_eq!(
            req.prompt,
            "Copper grade.\n\nSCENE TO RECREATE (from original photo): A tipper truck on red soil."
        );
        assert!(req.prompt_extend);
        assert!(!req.watermark);
        assert!(req.negative_prompt.is_none());
    }

    #[test]
    fn test_restyle_values_are_not_rescanned() {
        let req = SynthesisRequest::restyle(
            "{style} | {description} | {other}",
            "Keep {description} literal.",
            "A sign reading {style}",
            ImageSize::new(1024, 1024),
        );
        assert_eq!(
            req.prompt,
            "Keep {description} literal. | A sign reading {style} | {other}"
        );
    }
}
