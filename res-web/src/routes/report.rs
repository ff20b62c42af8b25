//! `GET /v1/task/report/:taskId`: a downloadable CSV of row errors for a
//! `FAILED` task. Only available once the task has reached that terminal
//! state; any other status (including a task that doesn't exist) is a 404.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use res_core::AppError;
use res_store::{RowError, TaskStatus};
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Wraps a CSV field in double quotes, doubling every embedded quote.
fn escape_csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Strips anything that isn't alnum/dash/underscore/dot, for use in a
/// `Content-Disposition` filename.
fn sanitize_for_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

fn render_csv(errors: &[RowError]) -> String {
    let mut out = String::from("\"Row\",\"Error\"\n");
    for err in errors {
        let row = err.row.map(|r| r.to_string()).unwrap_or_default();
        out.push_str(&escape_csv_field(&row));
        out.push(',');
        out.push_str(&escape_csv_field(&err.error));
        out.push('\n');
    }
    out
}

#[instrument(skip(state))]
pub async fn get_report(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult<Response> {
    let task = state
        .tasks
        .find_by_id(&task_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(format!("task {task_id}")))?;

    if task.status != TaskStatus::Failed {
        return Err(ApiError(AppError::not_found(format!("error report for task {task_id}"))));
    }

    let csv = render_csv(&task.errors);
    let filename = format!("error_report_{}.csv", sanitize_for_filename(&task.original_file_name));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        csv,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_embedded_quotes() {
        assert_eq!(escape_csv_field(r#"bad "quote" here"#), r#""bad ""quote"" here""#);
    }

    #[test]
    fn renders_header_and_rows() {
        let errors = vec![
            RowError { row: Some(7), error: "duplicate reservation_id R-1".to_string() },
            RowError { row: None, error: "workbook has zero data rows".to_string() },
        ];
        let csv = render_csv(&errors);
        assert_eq!(
            csv,
            "\"Row\",\"Error\"\n\"7\",\"duplicate reservation_id R-1\"\n\"\",\"workbook has zero data rows\"\n"
        );
    }

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_for_filename("my report (final).xlsx"), "my_report__final_.xlsx");
    }

    proptest::proptest! {
        #[test]
        fn escaped_field_is_always_quote_wrapped_and_parses_back(s in ".*") {
            let escaped = escape_csv_field(&s);
            prop_assert!(escaped.starts_with('"') && escaped.ends_with('"'));
            let inner = &escaped[1..escaped.len() - 1];
            prop_assert_eq!(inner.replace("\"\"", "\""), s);
        }
    }
}
