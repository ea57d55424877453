use serde::{Deserialize, Serialize};

// response for a persisted upload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub url: String,
}
