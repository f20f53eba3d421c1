/// Selection store for segmentation results.
///
/// Every detected region becomes one `MaskRecord`, with geometry kept in
/// natural image pixel space (never on-screen pixels). At most one record
/// is "active" at a time; the active record is the one eligible for a
/// replacement operation.

use crate::coords::PixelPoint;

/// Stable identity for a mask record.
///
/// Issued by a monotonic counter inside the store rather than a wall
/// clock: text segmentation adds several records in a single synchronous
/// batch, which timestamps cannot tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaskId(u64);

/// How a mask record was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Provenance {
    /// A single click on the image; the origin is kept for overlay drawing.
    Point { origin: PixelPoint },
    /// A text query; one query can yield several records sharing a label.
    Text { label: String },
    /// A drawn bounding box.
    Box,
}

/// One detected region of the working image.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskRecord {
    pub id: MaskId,
    /// Opaque mask payload (base64 PNG), exactly as the service returned it.
    pub mask_base64: String,
    /// Bounding box `[x1, y1, x2, y2]` in natural pixel space.
    pub bounding_box: [f32; 4],
    /// Confidence score in [0, 1].
    pub score: f32,
    pub provenance: Provenance,
}

/// A record waiting to be admitted into the store (no identity yet).
#[derive(Debug, Clone)]
pub struct NewMask {
    pub mask_base64: String,
    pub bounding_box: [f32; 4],
    pub score: f32,
    pub provenance: Provenance,
}

/// Ordered collection of mask records plus the single active selection.
#[derive(Debug, Default)]
pub struct MaskStore {
    records: Vec<MaskRecord>,
    active: Option<MaskId>,
    next_id: u64,
    revision: u64,
}

impl MaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records in order, assigning fresh identities. Overlapping
    /// detections are kept distinct; the store never deduplicates by
    /// geometry.
    pub fn add_masks(&mut self, masks: Vec<NewMask>) -> Vec<MaskId> {
        let mut ids = Vec::with_capacity(masks.len());

        for mask in masks {
            self.next_id += 1;
            let id = MaskId(self.next_id);
            self.records.push(MaskRecord {
                id,
                mask_base64: mask.mask_base64,
                bounding_box: mask.bounding_box,
                score: mask.score,
                provenance: mask.provenance,
            });
            ids.push(id);
        }

        if !ids.is_empty() {
            self.revision += 1;
        }

        ids
    }

    /// Mark a record as the active selection. Unknown ids are a silent
    /// no-op: the UI renders optimistically against a collection that can
    /// change under it, so a miss must not corrupt the current selection.
    pub fn set_active(&mut self, id: MaskId) {
        if self.records.iter().any(|r| r.id == id) && self.active != Some(id) {
            self.active = Some(id);
            self.revision += 1;
        }
    }

    /// Remove one record. Clearing the active reference travels with the
    /// removal so the active id always names a present record.
    pub fn remove(&mut self, id: MaskId) {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);

        if self.records.len() != before {
            if self.active == Some(id) {
                self.active = None;
            }
            self.revision += 1;
        }
    }

    /// Clear the collection and the active reference together.
    pub fn remove_all(&mut self) {
        if self.records.is_empty() && self.active.is_none() {
            return;
        }
        self.records.clear();
        self.active = None;
        self.revision += 1;
    }

    pub fn get(&self, id: MaskId) -> Option<&MaskRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn score_of(&self, id: MaskId) -> Option<f32> {
        self.get(id).map(|r| r.score)
    }

    pub fn provenance_of(&self, id: MaskId) -> Option<&Provenance> {
        self.get(id).map(|r| &r.provenance)
    }

    pub fn active(&self) -> Option<MaskId> {
        self.active
    }

    pub fn active_record(&self) -> Option<&MaskRecord> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaskRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Change counter for non-reactive consumers: bumped by every
    /// observable mutation, so "did anything change since I last drew"
    /// is a single integer comparison.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
