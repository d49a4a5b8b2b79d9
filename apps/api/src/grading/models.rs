use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Default `max_score` when a request does not carry one.
pub const DEFAULT_MAX_SCORE: f64 = 5.0;

/// Feedback used whenever the model output carries no usable feedback.
pub const NO_FEEDBACK: &str = "No feedback generated.";
pub const QUESTION_NOT_INFERRED: &str = "Question could not be inferred from image";
pub const ANSWER_NOT_INFERRED: &str = "Answer could not be inferred from image";

/// Grading strictness. Parameterizes the scoring policy in the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!(
                "unknown difficulty '{other}' (expected easy, medium or hard)"
            )),
        }
    }
}

// Accepts "Easy", "HARD", ...: request payloads come from free-form UI fields.
impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn default_max_score() -> f64 {
    DEFAULT_MAX_SCORE
}

/// A single scored grading call. Immutable once built.
#[derive(Debug, Clone, Deserialize)]
pub struct GradingRequest {
    pub question: String,
    pub student_answer: String,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default = "default_max_score")]
    pub max_score: f64,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl GradingRequest {
    pub fn new(question: impl Into<String>, student_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            student_answer: student_answer.into(),
            correct_answer: None,
            max_score: DEFAULT_MAX_SCORE,
            difficulty: Difficulty::default(),
        }
    }

    pub fn with_max_score(mut self, max_score: f64) -> Self {
        self.max_score = max_score;
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }
}

/// Rejects a `max_score` that cannot bound a score.
pub fn validate_max_score(max_score: f64) -> Result<(), String> {
    if max_score.is_finite() && max_score > 0.0 {
        Ok(())
    } else {
        Err(format!("max_score must be a positive number, got {max_score}"))
    }
}

/// Score and feedback parsed from a grading completion.
/// `score` is always within `[0, max_score]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub score: f64,
    pub feedback: String,
}

/// Image grading adds what the model read off the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGradingResult {
    pub question: String,
    pub student_answer: String,
    pub score: f64,
    pub feedback: String,
}

/// Tutoring guidance. Has no score field, ever.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanionResult {
    pub feedback: String,
    pub keywords: Vec<String>,
    pub improvement_steps: Vec<String>,
}

impl CompanionResult {
    /// Result returned without calling the model (unreadable or unsupported input).
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            feedback: message.into(),
            ..Default::default()
        }
    }
}

/// Response body for text, file and Drive grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question: String,
    pub student_answer: String,
    pub score: f64,
    pub feedback: String,
}

impl GradedAnswer {
    pub fn new(question: String, student_answer: String, result: GradingResult) -> Self {
        Self {
            question,
            student_answer,
            score: result.score,
            feedback: result.feedback,
        }
    }

    /// Zero-score answer for input that never reached the model.
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            question: "—".to_string(),
            student_answer: "—".to_string(),
            score: 0.0,
            feedback: message.into(),
        }
    }
}
