use axum::extract::State;
use axum::response::Response;

use crate::api::extract::ValidJson;
use crate::api::stream::text_stream_response;
use crate::api::types::ExplainRequest;
use crate::error::Result;
use crate::expression::validate_expression;
use crate::prompt::{build_request, Mode};
use crate::server::state::AppState;

/// POST /api/explain - Stream an explanation of a cron expression.
pub async fn handler(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ExplainRequest>,
) -> Result<Response> {
    validate_expression(&request.expression)?;

    let mode = Mode::Explain {
        detailed: request.detailed,
    };
    let stream = state
        .relay
        .open(&build_request(mode, &request.expression))
        .await?;

    Ok(text_stream_response(stream))
}
