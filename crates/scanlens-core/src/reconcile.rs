//! Live/still reconciliation of detection batches into an accumulated set.
//!
//! Live batches replace the previous live batch wholesale, except when the
//! new batch keys to exactly the same entities (then nothing changes, so the
//! overlay does not flicker). Still batches drop the live subset and append
//! every entity not already present anywhere in the set.

use crate::types::{BoundingBox, Detection, DetectionRecord, IdentityKey};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered, shared collection of detection records for one screen.
///
/// Cloning is cheap: the records sit behind an `Arc` and are never mutated
/// in place. A reconciliation that changes nothing hands back the same
/// allocation, observable through [`ResultSet::same_as`].
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    records: Arc<Vec<DetectionRecord>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DetectionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DetectionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records produced by the current live frame.
    pub fn live(&self) -> impl Iterator<Item = &DetectionRecord> {
        self.records.iter().filter(|r| r.is_live())
    }

    /// Records produced by picked images.
    pub fn stills(&self) -> impl Iterator<Item = &DetectionRecord> {
        self.records.iter().filter(|r| !r.is_live())
    }

    /// True when both sets share the same backing allocation.
    pub fn same_as(&self, other: &ResultSet) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }

    fn keys<'a>(records: impl Iterator<Item = &'a DetectionRecord>) -> HashSet<IdentityKey> {
        records.map(DetectionRecord::identity_key).collect()
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter())
    }
}

impl From<Vec<DetectionRecord>> for ResultSet {
    fn from(records: Vec<DetectionRecord>) -> Self {
        Self { records: Arc::new(records) }
    }
}

/// One batch of detections returned by a single inference call.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Live(Vec<Detection>),
    Still {
        image_id: String,
        detections: Vec<Detection>,
    },
}

impl Batch {
    pub fn live(detections: Vec<Detection>) -> Self {
        Batch::Live(detections)
    }

    /// Batch for a picked image.
    ///
    /// Text recognition yields one string per image: text blocks are joined
    /// line by line into a single record, and blank text becomes an empty batch.
    pub fn still(image_id: impl Into<String>, detections: Vec<Detection>) -> Self {
        let all_text = !detections.is_empty()
            && detections.iter().all(|d| matches!(d, Detection::Text { .. }));
        let detections = if all_text { join_text_blocks(detections) } else { detections };
        Batch::Still {
            image_id: image_id.into(),
            detections,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Batch::Live(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Batch::Live(detections) | Batch::Still { detections, .. } => detections.is_empty(),
        }
    }
}

fn join_text_blocks(blocks: Vec<Detection>) -> Vec<Detection> {
    let mut lines = Vec::with_capacity(blocks.len());
    let mut corners = Vec::new();
    for block in blocks {
        if let Detection::Text { text, bounds } = block {
            if let Some(b) = bounds {
                corners.push((b.left, b.top));
                corners.push((b.right, b.bottom));
            }
            lines.push(text);
        }
    }
    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        return Vec::new();
    }
    vec![Detection::Text {
        text,
        bounds: BoundingBox::enclosing(corners),
    }]
}

/// Outcome of merging a batch.
#[derive(Debug, Clone)]
pub enum Reconciled {
    /// The current set already reflects the batch; keep it as is.
    Unchanged,
    Replaced(ResultSet),
}

impl Reconciled {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Reconciled::Unchanged)
    }

    /// Resolve against the set the batch was reconciled with.
    pub fn into_set(self, current: &ResultSet) -> ResultSet {
        match self {
            Reconciled::Unchanged => current.clone(),
            Reconciled::Replaced(next) => next,
        }
    }
}

/// Merge `batch` into `current`, producing the next accumulated set.
pub fn reconcile(current: &ResultSet, batch: Batch) -> Reconciled {
    match batch {
        Batch::Live(detections) => reconcile_live(current, detections),
        Batch::Still { image_id, detections } => reconcile_still(current, &image_id, detections),
    }
}

fn reconcile_live(current: &ResultSet, detections: Vec<Detection>) -> Reconciled {
    let incoming: Vec<DetectionRecord> =
        detections.into_iter().map(DetectionRecord::live).collect();

    if ResultSet::keys(incoming.iter()) == ResultSet::keys(current.live()) {
        return Reconciled::Unchanged;
    }

    let mut next: Vec<DetectionRecord> = current.stills().cloned().collect();
    append_unique(&mut next, incoming);
    Reconciled::Replaced(next.into())
}

fn reconcile_still(current: &ResultSet, image_id: &str, detections: Vec<Detection>) -> Reconciled {
    if detections.is_empty() {
        return Reconciled::Unchanged;
    }

    let had_live = current.live().next().is_some();
    let mut next: Vec<DetectionRecord> = current.stills().cloned().collect();
    let incoming = detections
        .into_iter()
        .map(|d| DetectionRecord::still(d, image_id));
    let added = append_unique(&mut next, incoming);

    if added == 0 && !had_live {
        return Reconciled::Unchanged;
    }
    Reconciled::Replaced(next.into())
}

/// Append every record whose key is not yet in `acc`. Returns how many were added.
fn append_unique(
    acc: &mut Vec<DetectionRecord>,
    incoming: impl IntoIterator<Item = DetectionRecord>,
) -> usize {
    let mut seen = ResultSet::keys(acc.iter());
    let before = acc.len();
    for record in incoming {
        if seen.insert(record.identity_key()) {
            acc.push(record);
        }
    }
    acc.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BarcodeFormat, ObjectLabel};

    fn barcode(raw: &str) -> Detection {
        Detection::Barcode {
            raw_value: raw.into(),
            display_value: raw.into(),
            format: BarcodeFormat::QrCode,
            bounds: None,
        }
    }

    fn barcode_at(raw: &str, left: i32) -> Detection {
        Detection::Barcode {
            raw_value: raw.into(),
            display_value: raw.into(),
            format: BarcodeFormat::QrCode,
            bounds: Some(BoundingBox::new(left, 0, left + 10, 10)),
        }
    }

    fn object(label: &str, left: i32) -> Detection {
        Detection::Object {
            tracking_id: None,
            bounds: BoundingBox::new(left, 0, left + 20, 20),
            labels: vec![ObjectLabel { text: label.into(), confidence: 0.8 }],
        }
    }

    fn text(s: &str) -> Detection {
        Detection::Text { text: s.into(), bounds: None }
    }

    fn raw_values(set: &ResultSet) -> Vec<(String, Option<String>)> {
        set.iter()
            .map(|r| match &r.detection {
                Detection::Barcode { raw_value, .. } => {
                    (raw_value.clone(), r.source_image_id.clone())
                }
                other => panic!("unexpected detection {other:?}"),
            })
            .collect()
    }

    fn apply(set: &ResultSet, batch: Batch) -> ResultSet {
        reconcile(set, batch).into_set(set)
    }

    #[test]
    fn test_live_identical_keys_is_noop() {
        let set = apply(&ResultSet::new(), Batch::live(vec![barcode_at("A", 0), barcode_at("B", 20)]));

        // Same entities, different instances and positions.
        let outcome = reconcile(&set, Batch::live(vec![barcode_at("B", 25), barcode_at("A", 3)]));
        assert!(outcome.is_unchanged());
        let next = outcome.into_set(&set);
        assert!(next.same_as(&set));
    }

    #[test]
    fn test_live_replacement_keeps_stills() {
        let set = apply(&ResultSet::new(), Batch::still("img-1", vec![barcode("X")]));
        let set = apply(&set, Batch::live(vec![barcode("A"), barcode("B")]));

        let next = apply(&set, Batch::live(vec![barcode("B"), barcode("C")]));
        let live: Vec<_> = next.live().map(|r| r.identity_key()).collect();
        assert_eq!(
            live,
            vec![
                IdentityKey::Barcode("B".into()),
                IdentityKey::Barcode("C".into())
            ]
        );
        assert_eq!(next.stills().count(), 1);
        assert_eq!(raw_values(&next)[0], ("X".into(), Some("img-1".into())));
    }

    #[test]
    fn test_live_drops_intra_batch_duplicates() {
        let next = apply(
            &ResultSet::new(),
            Batch::live(vec![barcode_at("A", 0), barcode_at("A", 40), barcode("B")]),
        );
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn test_live_empty_batch_clears_stale_boxes() {
        let set = apply(&ResultSet::new(), Batch::live(vec![barcode("A")]));
        let next = apply(&set, Batch::live(vec![]));
        assert!(next.is_empty());
    }

    #[test]
    fn test_live_empty_batch_on_empty_live_is_noop() {
        let set = apply(&ResultSet::new(), Batch::still("img-1", vec![barcode("X")]));
        assert!(reconcile(&set, Batch::live(vec![])).is_unchanged());
    }

    #[test]
    fn test_live_suppressed_by_matching_still() {
        let set = apply(&ResultSet::new(), Batch::still("img-1", vec![barcode("X")]));
        let next = apply(&set, Batch::live(vec![barcode("X"), barcode("Y")]));
        assert_eq!(
            raw_values(&next),
            vec![("X".into(), Some("img-1".into())), ("Y".into(), None)]
        );
    }

    #[test]
    fn test_still_accumulates_without_duplicates() {
        let set = apply(&ResultSet::new(), Batch::still("img-1", vec![barcode("X"), barcode("Y")]));
        let set = apply(&set, Batch::still("img-2", vec![barcode("Y"), barcode("Z")]));
        assert_eq!(
            raw_values(&set),
            vec![
                ("X".into(), Some("img-1".into())),
                ("Y".into(), Some("img-1".into())),
                ("Z".into(), Some("img-2".into())),
            ]
        );
    }

    #[test]
    fn test_still_removes_live_subset() {
        let set = apply(&ResultSet::new(), Batch::live(vec![barcode("A"), barcode("B")]));
        let next = apply(&set, Batch::still("img-1", vec![barcode("C")]));
        assert_eq!(next.live().count(), 0);
        assert_eq!(raw_values(&next), vec![("C".into(), Some("img-1".into()))]);
    }

    #[test]
    fn test_still_removes_live_even_when_nothing_new() {
        let set = apply(&ResultSet::new(), Batch::still("img-1", vec![barcode("C")]));
        let set = apply(&set, Batch::live(vec![barcode("A")]));
        let next = apply(&set, Batch::still("img-2", vec![barcode("C")]));
        assert_eq!(raw_values(&next), vec![("C".into(), Some("img-1".into()))]);
    }

    #[test]
    fn test_still_empty_batch_leaves_set_alone() {
        let set = apply(&ResultSet::new(), Batch::live(vec![barcode("A")]));
        let outcome = reconcile(&set, Batch::still("img-1", vec![]));
        assert!(outcome.is_unchanged());
    }

    #[test]
    fn test_still_all_duplicates_is_noop() {
        let set = apply(&ResultSet::new(), Batch::still("img-1", vec![barcode("A")]));
        assert!(reconcile(&set, Batch::still("img-2", vec![barcode("A")])).is_unchanged());
    }

    #[test]
    fn test_object_same_label_different_box_are_distinct() {
        let set = apply(&ResultSet::new(), Batch::still("img-1", vec![object("Food", 0)]));
        let set = apply(&set, Batch::still("img-2", vec![object("Food", 50), object("Food", 0)]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_still_text_blocks_join_into_one_record() {
        let batch = Batch::still(
            "img-1",
            vec![
                Detection::Text { text: "Hello".into(), bounds: Some(BoundingBox::new(0, 0, 10, 5)) },
                Detection::Text { text: "world".into(), bounds: Some(BoundingBox::new(2, 6, 30, 12)) },
            ],
        );
        let Batch::Still { detections, .. } = &batch else {
            panic!("expected still batch");
        };
        assert_eq!(
            detections,
            &vec![Detection::Text {
                text: "Hello\nworld".into(),
                bounds: Some(BoundingBox::new(0, 0, 30, 12)),
            }]
        );
    }

    #[test]
    fn test_still_blank_text_is_empty_batch() {
        assert!(Batch::still("img-1", vec![text("  "), text("\n")]).is_empty());
    }

    #[test]
    fn test_still_text_suppresses_exact_repeat() {
        let set = apply(&ResultSet::new(), Batch::still("img-1", vec![text("Total 4.20")]));
        assert!(reconcile(&set, Batch::still("img-2", vec![text("Total 4.20")])).is_unchanged());
        let set = apply(&set, Batch::still("img-3", vec![text("Total 4.21")]));
        assert_eq!(set.len(), 2);
    }
}
