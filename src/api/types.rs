use serde::{Deserialize, Serialize};

use super::extract::RequestFields;

// ============================================================================
// Request bodies
// ============================================================================

/// Body of `POST /api/explain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub expression: String,
    /// Row-by-row breakdown (default) or a terse `value: description` list
    #[serde(default = "default_detailed")]
    pub detailed: bool,
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub description: String,
}

impl RequestFields for ExplainRequest {
    const FIELDS: &'static [&'static str] = &["expression", "detailed"];
}

impl RequestFields for GenerateRequest {
    const FIELDS: &'static [&'static str] = &["description"];
}

fn default_detailed() -> bool {
    true
}

// ============================================================================
// Responses
// ============================================================================

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
