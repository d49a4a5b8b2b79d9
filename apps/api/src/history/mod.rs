//! Grading history — one append-only row per successful grading call.
//!
//! Companion calls are never recorded. Rows are listed newest first and can be
//! exported as CSV for the dashboard.

pub mod handlers;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::history::{GradingMode, HistoryRecord, NewHistoryRecord};

pub const CSV_HEADER: [&str; 8] = [
    "Question",
    "Student Answer",
    "Score",
    "Max Score",
    "Difficulty",
    "Mode",
    "Feedback",
    "Created At",
];

/// Inserts one history row and returns it as stored.
pub async fn record_grading(
    pool: &PgPool,
    record: NewHistoryRecord<'_>,
) -> Result<HistoryRecord, sqlx::Error> {
    let row = sqlx::query_as::<_, HistoryRecord>(
        r#"
        INSERT INTO grading_history
            (id, question, student_answer, score, max_score, difficulty, mode, feedback)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, question, student_answer, score, max_score, difficulty, mode,
                  feedback, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(record.question)
    .bind(record.student_answer)
    .bind(record.score)
    .bind(record.max_score)
    .bind(record.difficulty)
    .bind(record.mode.as_str())
    .bind(record.feedback)
    .fetch_one(pool)
    .await?;

    info!(
        "Recorded {} grading {} ({}/{})",
        row.mode, row.id, row.score, row.max_score
    );
    Ok(row)
}

/// All history rows, newest first, optionally restricted to one mode.
pub async fn list_history(
    pool: &PgPool,
    mode: Option<GradingMode>,
) -> Result<Vec<HistoryRecord>, sqlx::Error> {
    sqlx::query_as::<_, HistoryRecord>(
        r#"
        SELECT id, question, student_answer, score, max_score, difficulty, mode,
               feedback, created_at
        FROM grading_history
        WHERE ($1::text IS NULL OR mode = $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(mode.map(|m| m.as_str()))
    .fetch_all(pool)
    .await
}

/// Renders records as CSV with a fixed header row. `created_at` is RFC 3339.
pub fn export_csv(records: &[HistoryRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for record in records {
        let score = record.score.to_string();
        let max_score = record.max_score.to_string();
        let created_at = record.created_at.to_rfc3339();
        writer.write_record([
            record.question.as_str(),
            record.student_answer.as_str(),
            score.as_str(),
            max_score.as_str(),
            record.difficulty.as_str(),
            record.mode.as_str(),
            record.feedback.as_str(),
            created_at.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn record(question: &str, feedback: &str) -> HistoryRecord {
        HistoryRecord {
            id: Uuid::nil(),
            question: question.to_string(),
            student_answer: "Neon".to_string(),
            score: 2.5,
            max_score: 5.0,
            difficulty: "medium".to_string(),
            mode: "text".to_string(),
            feedback: feedback.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_export_csv_header_only_when_empty() {
        let csv = export_csv(&[]).unwrap();
        assert_eq!(
            csv,
            "Question,Student Answer,Score,Max Score,Difficulty,Mode,Feedback,Created At\n"
        );
    }

    #[test]
    fn test_export_csv_row_layout() {
        let csv = export_csv(&[record("Name a noble gas", "Correct.")]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "Name a noble gas,Neon,2.5,5,medium,text,Correct.,2025-03-01T12:30:00+00:00"
        );
    }

    #[test]
    fn test_export_csv_quotes_commas_quotes_and_newlines() {
        let csv = export_csv(&[record(
            "Define \"work\"",
            "Good, but units\nmissing",
        )])
        .unwrap();
        assert!(csv.contains(r#""Define ""work""""#));
        assert!(csv.contains("\"Good, but units\nmissing\""));
    }

    #[test]
    fn test_grading_mode_parse() {
        assert_eq!("Drive".parse::<GradingMode>().unwrap(), GradingMode::Drive);
        assert_eq!(GradingMode::Image.to_string(), "image");
        assert!("email".parse::<GradingMode>().is_err());
    }
}
