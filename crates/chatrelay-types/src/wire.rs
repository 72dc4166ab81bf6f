//! JSON bodies exchanged between the client, the relay, and the backend.

use serde::{Deserialize, Serialize};

/// Body of an edit request sent to the relay (`PUT /api/chat?id=`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    pub content: String,
}

/// Body the relay forwards to the backend's `PUT /edit/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEditRequest {
    pub updated_content: String,
}

impl From<EditRequest> for BackendEditRequest {
    fn from(req: EditRequest) -> Self {
        Self { updated_content: req.content }
    }
}

/// Uniform error body returned by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
