//! Grading facade — the four model-backed operations behind every route.
//!
//! Flow per call: build prompt → one completion (no retries) → parse.
//! Text calls go to the `text` provider, image calls to the `vision` provider.
//! Transport failures surface as `LlmError`; unusable model output never does.

use std::sync::Arc;

use tracing::{debug, info};

use crate::grading::models::{
    CompanionResult, Difficulty, GradingRequest, GradingResult, ImageGradingResult,
};
use crate::grading::parser::{parse_companion, parse_grading, parse_image_grading};
use crate::grading::prompts::{
    build_companion_prompt, build_grading_prompt, build_image_grading_prompt,
    COMPANION_IMAGE_PROMPT,
};
use crate::llm_client::prompts::{EVALUATOR_SYSTEM, TUTOR_SYSTEM};
use crate::llm_client::{
    CompletionProvider, CompletionRequest, ImageInput, LlmError, MAX_OUTPUT_TOKENS,
};

const GRADING_TEMPERATURE: f32 = 0.2;
const IMAGE_GRADING_TEMPERATURE: f32 = 0.2;
const COMPANION_TEMPERATURE: f32 = 0.3;
const COMPANION_IMAGE_TEMPERATURE: f32 = 0.4;

#[derive(Clone)]
pub struct Grader {
    text: Arc<dyn CompletionProvider>,
    vision: Arc<dyn CompletionProvider>,
}

impl Grader {
    pub fn new(text: Arc<dyn CompletionProvider>, vision: Arc<dyn CompletionProvider>) -> Self {
        Self { text, vision }
    }

    pub fn text_provider(&self) -> &dyn CompletionProvider {
        self.text.as_ref()
    }

    pub fn vision_provider(&self) -> &dyn CompletionProvider {
        self.vision.as_ref()
    }

    /// Scores a typed answer. `request.max_score` must already be validated.
    pub async fn grade(&self, request: &GradingRequest) -> Result<GradingResult, LlmError> {
        let prompt = build_grading_prompt(request);
        info!(
            "Grading answer via {} (max_score={}, difficulty={})",
            self.text.name(),
            request.max_score,
            request.difficulty
        );

        let raw = self
            .text
            .complete(CompletionRequest {
                system: EVALUATOR_SYSTEM,
                prompt: &prompt,
                image: None,
                temperature: GRADING_TEMPERATURE,
                max_tokens: MAX_OUTPUT_TOKENS,
            })
            .await?;
        debug!("Raw grading completion: {raw}");

        let result = parse_grading(&raw, request.max_score);
        info!("Graded answer: {}/{}", result.score, request.max_score);
        Ok(result)
    }

    /// Reads the question and answer off an image and scores it in one call.
    pub async fn grade_from_image(
        &self,
        image: &ImageInput,
        max_score: f64,
        difficulty: Difficulty,
    ) -> Result<ImageGradingResult, LlmError> {
        let prompt = build_image_grading_prompt(max_score, difficulty);
        info!(
            "Grading image ({}, {} bytes) via {}",
            image.mime_type,
            image.bytes.len(),
            self.vision.name()
        );

        let raw = self
            .vision
            .complete(CompletionRequest {
                system: EVALUATOR_SYSTEM,
                prompt: &prompt,
                image: Some(image),
                temperature: IMAGE_GRADING_TEMPERATURE,
                max_tokens: MAX_OUTPUT_TOKENS,
            })
            .await?;
        debug!("Raw image grading completion: {raw}");

        Ok(parse_image_grading(&raw, max_score))
    }

    /// Tutoring guidance for a typed answer. Never scores.
    pub async fn companion_feedback(
        &self,
        question: &str,
        student_answer: &str,
        correct_answer: Option<&str>,
    ) -> Result<CompanionResult, LlmError> {
        let prompt = build_companion_prompt(question, student_answer, correct_answer);
        info!("Companion feedback via {}", self.text.name());

        let raw = self
            .text
            .complete(CompletionRequest {
                system: TUTOR_SYSTEM,
                prompt: &prompt,
                image: None,
                temperature: COMPANION_TEMPERATURE,
                max_tokens: MAX_OUTPUT_TOKENS,
            })
            .await?;
        debug!("Raw companion completion: {raw}");

        Ok(parse_companion(&raw))
    }

    pub async fn companion_from_image(
        &self,
        image: &ImageInput,
    ) -> Result<CompanionResult, LlmError> {
        info!("Companion feedback on image via {}", self.vision.name());

        let raw = self
            .vision
            .complete(CompletionRequest {
                system: TUTOR_SYSTEM,
                prompt: COMPANION_IMAGE_PROMPT,
                image: Some(image),
                temperature: COMPANION_IMAGE_TEMPERATURE,
                max_tokens: MAX_OUTPUT_TOKENS,
            })
            .await?;
        debug!("Raw image companion completion: {raw}");

        Ok(parse_companion(&raw))
    }
}
