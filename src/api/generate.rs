use axum::extract::State;
use axum::response::Response;

use crate::api::extract::ValidJson;
use crate::api::stream::text_stream_response;
use crate::api::types::GenerateRequest;
use crate::error::{RelayError, Result};
use crate::prompt::{build_request, Mode};
use crate::server::state::AppState;

/// POST /api/generate - Stream a cron expression generated from a description.
pub async fn handler(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<GenerateRequest>,
) -> Result<Response> {
    if request.description.trim().is_empty() {
        return Err(RelayError::validation(
            "description",
            "Description must not be empty",
        ));
    }

    let stream = state
        .relay
        .open(&build_request(Mode::Generate, &request.description))
        .await?;

    Ok(text_stream_response(stream))
}
