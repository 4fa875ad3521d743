use serde::{Deserialize, Serialize};

/// A single image-generation request as held by the request store.
///
/// Field names follow the store's JSON layout (`requestId`,
/// `input.originalUrl`, `results.good.imageBucketId`, ...). Fields the
/// admin surface does not read are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub request_id: String,
    #[serde(default)]
    pub input: RecordInput,
    pub results: RecordResults,
}

/// The input side of a generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    /// URL of the image the request was made against. Absent when the input
    /// was an upload rather than a previously generated image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

/// The two output variants produced for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResults {
    pub good: ImageResult,
    pub bad: ImageResult,
}

/// One generated output image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    /// Object key of the image in the hosting bucket.
    pub image_bucket_id: String,
}

/// A row of the input-URL index: one request made against one input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAssociation {
    pub input_url: String,
    pub request_id: String,
}

impl GenerationRecord {
    /// Build a record whose outputs follow the hosting convention
    /// `<requestId>.<variant>.png`.
    pub fn new(request_id: impl Into<String>, original_url: Option<String>) -> Self {
        let request_id = request_id.into();
        let good = ImageResult {
            image_bucket_id: format!("{request_id}.good.png"),
        };
        let bad = ImageResult {
            image_bucket_id: format!("{request_id}.bad.png"),
        };
        Self {
            request_id,
            input: RecordInput { original_url },
            results: RecordResults { good, bad },
        }
    }
}
