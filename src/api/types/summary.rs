//! Post summary request body

use serde::Deserialize;

/// `POST /api/ai/summary` body
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequestBody {
    pub content: String,
}
