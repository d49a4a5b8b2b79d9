use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How the graded answer reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradingMode {
    Text,
    File,
    Image,
    Drive,
}

impl GradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradingMode::Text => "text",
            GradingMode::File => "file",
            GradingMode::Image => "image",
            GradingMode::Drive => "drive",
        }
    }
}

impl fmt::Display for GradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GradingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(GradingMode::Text),
            "file" => Ok(GradingMode::File),
            "image" => Ok(GradingMode::Image),
            "drive" => Ok(GradingMode::Drive),
            other => Err(format!(
                "unknown mode '{other}' (expected text, file, image or drive)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub question: String,
    pub student_answer: String,
    pub score: f64,
    pub max_score: f64,
    pub difficulty: String,
    pub mode: String,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

/// Insert parameters. `id` and `created_at` are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewHistoryRecord<'a> {
    pub question: &'a str,
    pub student_answer: &'a str,
    pub score: f64,
    pub max_score: f64,
    pub difficulty: &'a str,
    pub mode: GradingMode,
    pub feedback: &'a str,
}
