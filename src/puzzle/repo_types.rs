use super::month::MonthKey;

/// Number of fragments one month's image is stored in.
pub const PART_COUNT: usize = 10;

/// One stored chunk of a month's base64-encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JigsawImagePart {
    pub id: u32,            // 1-based position in the image
    pub base64_part: String,
    pub prompt: String,     // same on every part of one image
    pub month: MonthKey,
}

impl JigsawImagePart {
    /// Document key, e.g. `2025-03_part7`.
    pub fn doc_id(&self) -> String {
        format!("{}_part{}", self.month, self.id)
    }
}
