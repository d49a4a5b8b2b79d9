use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use crate::drive::{validate_file_id, DriveClient};
use crate::errors::AppError;
use crate::extraction::{extract_text, Origin};
use crate::grading::models::{
    validate_max_score, CompanionResult, Difficulty, GradedAnswer, GradingRequest,
    GradingResult, ImageGradingResult, DEFAULT_MAX_SCORE,
};
use crate::grading::segmenter::{segment, FALLBACK_QUESTION};
use crate::history::record_grading;
use crate::llm_client::ImageInput;
use crate::models::history::{GradingMode, NewHistoryRecord};
use crate::state::AppState;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";
const UPLOADED_FILE_QUESTION: &str = "Answer extracted from uploaded file";
const DRIVE_FILE_QUESTION: &str = "Answer extracted from Google Drive file";

// ────────────────────────────────────────────────────────────────────────────
// Request shapes
// ────────────────────────────────────────────────────────────────────────────

/// Scoring knobs for multipart grading, passed as query parameters.
#[derive(Debug, Deserialize)]
pub struct GradeParams {
    pub max_score: Option<f64>,
    pub difficulty: Option<String>,
}

impl GradeParams {
    fn resolve(&self) -> Result<(f64, Difficulty), AppError> {
        resolve_scoring(self.max_score, self.difficulty.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct DriveGradeParams {
    pub file_id: String,
    pub max_score: Option<f64>,
    pub difficulty: Option<String>,
}

fn resolve_scoring(
    max_score: Option<f64>,
    difficulty: Option<&str>,
) -> Result<(f64, Difficulty), AppError> {
    let max_score = max_score.unwrap_or(DEFAULT_MAX_SCORE);
    validate_max_score(max_score).map_err(AppError::Validation)?;
    let difficulty = match difficulty {
        Some(raw) => raw.parse().map_err(AppError::Validation)?,
        None => Difficulty::default(),
    };
    Ok((max_score, difficulty))
}

#[derive(Debug, Deserialize)]
pub struct DriveParams {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CompanionRequest {
    pub question: String,
    pub student_answer: String,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Shared plumbing
// ────────────────────────────────────────────────────────────────────────────

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

/// Reads the multipart field named `file`; other fields are ignored.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(AppError::Validation(
        "Multipart field 'file' is required".to_string(),
    ))
}

fn image_from_upload(upload: Upload) -> Result<ImageInput, AppError> {
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("Uploaded image is empty".to_string()));
    }
    let mime_type = upload
        .content_type
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
    Ok(ImageInput::new(upload.bytes, mime_type))
}

/// Extracted document text, or the notice to answer with when there is none.
enum DocumentText {
    Text(String),
    Notice(String),
}

async fn document_text(
    file_name: &str,
    mime_type: Option<&str>,
    bytes: Bytes,
    origin: Origin,
) -> DocumentText {
    match extract_text(file_name, mime_type, bytes.to_vec()).await {
        Ok(text) if text.trim().is_empty() => {
            info!("No text in {file_name}; skipping model call");
            DocumentText::Notice(origin.empty_notice())
        }
        Ok(text) => DocumentText::Text(text),
        Err(e) => {
            warn!("Extraction failed for {file_name}: {e}");
            DocumentText::Notice(origin.failure_notice(&e))
        }
    }
}

fn drive_client(state: &AppState) -> Result<&DriveClient, AppError> {
    state.drive.as_deref().ok_or_else(|| {
        AppError::Validation(
            "Google Drive is not configured (GOOGLE_SERVICE_ACCOUNT_JSON is unset)".to_string(),
        )
    })
}

async fn record(
    state: &AppState,
    question: &str,
    student_answer: &str,
    result: &GradingResult,
    max_score: f64,
    difficulty: Difficulty,
    mode: GradingMode,
) -> Result<(), AppError> {
    record_grading(
        &state.db,
        NewHistoryRecord {
            question,
            student_answer,
            score: result.score,
            max_score,
            difficulty: difficulty.as_str(),
            mode,
            feedback: &result.feedback,
        },
    )
    .await?;
    Ok(())
}

/// Grades the first question/answer pair found in `text`.
async fn grade_document(
    state: &AppState,
    text: &str,
    max_score: f64,
    difficulty: Difficulty,
    mode: GradingMode,
) -> Result<GradedAnswer, AppError> {
    let pairs = segment(text);
    info!("Segmented document into {} question/answer pairs", pairs.len());

    let (question, student_answer) = match pairs.into_iter().next() {
        Some(pair) => (pair.question, pair.student_answer),
        None => (FALLBACK_QUESTION.to_string(), text.trim().to_string()),
    };

    let request = GradingRequest::new(question, student_answer)
        .with_max_score(max_score)
        .with_difficulty(difficulty);
    let result = state.grader.grade(&request).await?;

    record(
        state,
        &request.question,
        &request.student_answer,
        &result,
        max_score,
        difficulty,
        mode,
    )
    .await?;

    Ok(GradedAnswer::new(
        request.question,
        request.student_answer,
        result,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Grading
// ────────────────────────────────────────────────────────────────────────────

/// POST /grade
pub async fn handle_grade(
    State(state): State<AppState>,
    Json(request): Json<GradingRequest>,
) -> Result<Json<GradedAnswer>, AppError> {
    validate_max_score(request.max_score).map_err(AppError::Validation)?;

    let result = state.grader.grade(&request).await?;
    record(
        &state,
        &request.question,
        &request.student_answer,
        &result,
        request.max_score,
        request.difficulty,
        GradingMode::Text,
    )
    .await?;

    Ok(Json(GradedAnswer::new(
        request.question,
        request.student_answer,
        result,
    )))
}

/// POST /grade/file
pub async fn handle_grade_file(
    State(state): State<AppState>,
    Query(params): Query<GradeParams>,
    multipart: Multipart,
) -> Result<Json<GradedAnswer>, AppError> {
    let (max_score, difficulty) = params.resolve()?;
    let upload = read_upload(multipart).await?;

    let text = match document_text(
        &upload.file_name,
        upload.content_type.as_deref(),
        upload.bytes,
        Origin::Upload,
    )
    .await
    {
        DocumentText::Text(text) => text,
        DocumentText::Notice(message) => return Ok(Json(GradedAnswer::notice(message))),
    };

    let answer = grade_document(&state, &text, max_score, difficulty, GradingMode::File).await?;
    Ok(Json(answer))
}

/// POST /grade/image
pub async fn handle_grade_image(
    State(state): State<AppState>,
    Query(params): Query<GradeParams>,
    multipart: Multipart,
) -> Result<Json<ImageGradingResult>, AppError> {
    let (max_score, difficulty) = params.resolve()?;
    let image = image_from_upload(read_upload(multipart).await?)?;

    let result = state
        .grader
        .grade_from_image(&image, max_score, difficulty)
        .await?;

    record(
        &state,
        &result.question,
        &result.student_answer,
        &GradingResult {
            score: result.score,
            feedback: result.feedback.clone(),
        },
        max_score,
        difficulty,
        GradingMode::Image,
    )
    .await?;

    Ok(Json(result))
}

/// POST /grade/drive
pub async fn handle_grade_drive(
    State(state): State<AppState>,
    Query(params): Query<DriveGradeParams>,
) -> Result<Json<GradedAnswer>, AppError> {
    let (max_score, difficulty) =
        resolve_scoring(params.max_score, params.difficulty.as_deref())?;
    validate_file_id(&params.file_id).map_err(AppError::Validation)?;
    let file = drive_client(&state)?.download(&params.file_id).await?;

    let text = match document_text(
        &file.name,
        Some(file.mime_type.as_str()),
        file.bytes,
        Origin::Drive,
    )
    .await
    {
        DocumentText::Text(text) => text,
        DocumentText::Notice(message) => return Ok(Json(GradedAnswer::notice(message))),
    };

    let answer = grade_document(&state, &text, max_score, difficulty, GradingMode::Drive).await?;
    Ok(Json(answer))
}

// ────────────────────────────────────────────────────────────────────────────
// Companion (never scored, never recorded)
// ────────────────────────────────────────────────────────────────────────────

/// POST /companion
pub async fn handle_companion(
    State(state): State<AppState>,
    Json(request): Json<CompanionRequest>,
) -> Result<Json<CompanionResult>, AppError> {
    let result = state
        .grader
        .companion_feedback(
            &request.question,
            &request.student_answer,
            request.correct_answer.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

/// POST /companion/file
pub async fn handle_companion_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CompanionResult>, AppError> {
    let upload = read_upload(multipart).await?;

    match document_text(
        &upload.file_name,
        upload.content_type.as_deref(),
        upload.bytes,
        Origin::Upload,
    )
    .await
    {
        DocumentText::Text(text) => {
            let result = state
                .grader
                .companion_feedback(UPLOADED_FILE_QUESTION, text.trim(), None)
                .await?;
            Ok(Json(result))
        }
        DocumentText::Notice(message) => Ok(Json(CompanionResult::notice(message))),
    }
}

/// POST /companion/image
pub async fn handle_companion_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CompanionResult>, AppError> {
    let image = image_from_upload(read_upload(multipart).await?)?;
    let result = state.grader.companion_from_image(&image).await?;
    Ok(Json(result))
}

/// POST /companion/drive
pub async fn handle_companion_drive(
    State(state): State<AppState>,
    Query(params): Query<DriveParams>,
) -> Result<Json<CompanionResult>, AppError> {
    validate_file_id(&params.file_id).map_err(AppError::Validation)?;
    let file = drive_client(&state)?.download(&params.file_id).await?;

    match document_text(&file.name, Some(file.mime_type.as_str()), file.bytes, Origin::Drive).await {
        DocumentText::Text(text) => {
            let result = state
                .grader
                .companion_feedback(DRIVE_FILE_QUESTION, text.trim(), None)
                .await?;
            Ok(Json(result))
        }
        DocumentText::Notice(message) => Ok(Json(CompanionResult::notice(message))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_params_defaults() {
        let params = GradeParams {
            max_score: None,
            difficulty: None,
        };
        assert_eq!(params.resolve().unwrap(), (5.0, Difficulty::Medium));
    }

    #[test]
    fn test_grade_params_rejects_bad_values() {
        let zero = GradeParams {
            max_score: Some(0.0),
            difficulty: None,
        };
        assert!(matches!(zero.resolve(), Err(AppError::Validation(_))));

        let unknown = GradeParams {
            max_score: Some(10.0),
            difficulty: Some("brutal".to_string()),
        };
        assert!(matches!(unknown.resolve(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_image_upload_defaults_to_jpeg() {
        let image = image_from_upload(Upload {
            file_name: "scan".to_string(),
            content_type: None,
            bytes: Bytes::from_static(b"\xff\xd8"),
        })
        .unwrap();
        assert_eq!(image.mime_type, "image/jpeg");

        let empty = image_from_upload(Upload {
            file_name: "scan.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::new(),
        });
        assert!(matches!(empty, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unsupported_document_becomes_notice() {
        let outcome = document_text(
            "scan.png",
            Some("image/png"),
            Bytes::from_static(b"png"),
            Origin::Drive,
        )
        .await;
        match outcome {
            DocumentText::Notice(message) => {
                assert_eq!(message, "Unsupported Drive file type: scan.png")
            }
            DocumentText::Text(_) => panic!("expected a notice"),
        }
    }

    #[tokio::test]
    async fn test_blank_document_becomes_notice() {
        let outcome = document_text(
            "blank.txt",
            None,
            Bytes::from_static(b"  \n\t "),
            Origin::Upload,
        )
        .await;
        assert!(matches!(
            outcome,
            DocumentText::Notice(ref m) if m == "No readable text found in the file."
        ));
    }
}
