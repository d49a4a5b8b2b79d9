use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::history::{export_csv, list_history};
use crate::models::history::{GradingMode, HistoryRecord};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub mode: Option<String>,
}

impl HistoryQuery {
    fn mode(&self) -> Result<Option<GradingMode>, AppError> {
        self.mode
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(str::parse::<GradingMode>)
            .transpose()
            .map_err(AppError::Validation)
    }
}

/// GET /dashboard/history
pub async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecord>>, AppError> {
    let records = list_history(&state.db, params.mode()?).await?;
    Ok(Json(records))
}

/// GET /dashboard/export
pub async fn handle_export(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mode = params.mode()?;
    let records = list_history(&state.db, mode).await?;
    let body = export_csv(&records)?;

    let file_name = format!(
        "grading_history_{}.csv",
        mode.map(|m| m.as_str()).unwrap_or("all")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_query_mode_parsing() {
        let none = HistoryQuery { mode: None };
        assert_eq!(none.mode().unwrap(), None);

        let blank = HistoryQuery {
            mode: Some(" ".to_string()),
        };
        assert_eq!(blank.mode().unwrap(), None);

        let drive = HistoryQuery {
            mode: Some("drive".to_string()),
        };
        assert_eq!(drive.mode().unwrap(), Some(GradingMode::Drive));

        let bad = HistoryQuery {
            mode: Some("fax".to_string()),
        };
        assert!(matches!(bad.mode(), Err(AppError::Validation(_))));
    }
}
