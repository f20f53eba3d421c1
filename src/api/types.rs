/// Wire types for the segmentation/inpainting service.
///
/// Every endpoint answers the same envelope: `code == 0` means success,
/// anything else is a rejection carrying a human-readable `message`.

use serde::Deserialize;

/// Response envelope for the three segmentation endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentEnvelope {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<SegmentData>,
}

/// Parallel arrays of detection results, one entry per detected instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentData {
    #[serde(default)]
    pub masks: Vec<String>,
    #[serde(default)]
    pub boxes: Vec<[f32; 4]>,
    #[serde(default)]
    pub scores: Vec<f32>,
}

/// One detection, zipped out of the parallel arrays. Response order is
/// confidence-ranked, so the first candidate is the best one.
#[derive(Debug, Clone)]
pub struct MaskCandidate {
    pub mask_base64: String,
    pub bounding_box: [f32; 4],
    pub score: f32,
}

impl SegmentData {
    /// Zip masks/boxes/scores into candidates. The arrays are expected to
    /// be the same length; if the service disagrees with itself, the
    /// extra tail entries are dropped rather than misattributed.
    pub fn into_candidates(self) -> Vec<MaskCandidate> {
        self.masks
            .into_iter()
            .zip(self.boxes)
            .zip(self.scores)
            .map(|((mask_base64, bounding_box), score)| MaskCandidate {
                mask_base64,
                bounding_box,
                score,
            })
            .collect()
    }
}

/// Response envelope for the replacement endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct EditEnvelope {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<EditData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditData {
    /// `data:image/png;base64,...` URL of the edited image.
    pub result_image: String,
}
