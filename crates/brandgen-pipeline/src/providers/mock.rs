//! Scripted provider for pipeline tests
//!
//! Replays queued describe/synthesize results without any network calls and
//! records what it was asked.

use crate::provider::{GenerationProvider, GenerationResult, SynthesisRequest};
use crate::retry::AttemptOutcome;
use brandgen_core::{BrandgenError, Result};
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Default)]
pub(crate) struct MockProvider {
    descriptions: RefCell<VecDeque<Result<String>>>,
    syntheses: RefCell<VecDeque<Result<AttemptOutcome<GenerationResult>>>>,
    pub(crate) described: RefCell<Vec<String>>,
    pub(crate) prompts: RefCell<Vec<SynthesisRequest>>,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn describes(&self, text: &str) -> &Self {
        self.descriptions.borrow_mut().push_back(Ok(text.to_string()));
        self
    }

    pub(crate) fn fails_describe(&self, message: &str) -> &Self {
        self.descriptions
            .borrow_mut()
            .push_back(Err(BrandgenError::DescriptionError(message.to_string())));
        self
    }

    pub(crate) fn generates(&self, url: &str) -> &Self {
        self.syntheses
            .borrow_mut()
            .push_back(Ok(AttemptOutcome::Ready(GenerationResult {
                url: url.to_string(),
            })));
        self
    }

    pub(crate) fn throttles(&self) -> &Self {
        self.syntheses
            .borrow_mut()
            .push_back(Ok(AttemptOutcome::RateLimited("Throttling.RateQuota".to_string())));
        self
    }

    pub(crate) fn fails_generation(&self, message: &str) -> &Self {
        self.syntheses
            .borrow_mut()
            .push_back(Err(BrandgenError::GenerationError(message.to_string())));
        self
    }

    /// Every remote call made so far (describe + synthesize attempts)
    pub(crate) fn call_count(&self) -> usize {
        self.described.borrow().len() + self.prompts.borrow().len()
    }
}

impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn describe(&self, image_url: &str, _instruction: &str) -> Result<String> {
        self.described.borrow_mut().push(image_url.to_string());
        self.descriptions
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(BrandgenError::DescriptionError("unscripted".to_string())))
    }

    fn synthesize_once(&self, request: &SynthesisRequest) -> Result<AttemptOutcome<GenerationResult>> {
        self.prompts.borrow_mut().push(request.clone());
        self.syntheses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(BrandgenError::GenerationError("unscripted".to_string())))
    }
}
