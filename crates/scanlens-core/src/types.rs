use serde::{Deserialize, Serialize};
use std::fmt;

/// The five detection screens the scanner offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Label,
    Barcode,
    Object,
    FaceMesh,
    Text,
}

impl DetectionKind {
    /// Plural noun used in user-facing messages ("No barcodes found").
    pub fn plural_noun(self) -> &'static str {
        match self {
            DetectionKind::Label => "labels",
            DetectionKind::Barcode => "barcodes",
            DetectionKind::Object => "objects",
            DetectionKind::FaceMesh => "faces",
            DetectionKind::Text => "text",
        }
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectionKind::Label => "label",
            DetectionKind::Barcode => "barcode",
            DetectionKind::Object => "object",
            DetectionKind::FaceMesh => "face-mesh",
            DetectionKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Axis-aligned pixel rectangle, as reported by the inference collaborator.
///
/// Integer coordinates so that boxes can take part in identity keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bbox = Self::new(x0, y0, x0, y0);
        for (x, y) in iter {
            bbox.left = bbox.left.min(x);
            bbox.top = bbox.top.min(y);
            bbox.right = bbox.right.max(x);
            bbox.bottom = bbox.bottom.max(y);
        }
        Some(bbox)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.left, self.top, self.right, self.bottom)
    }
}

/// Barcode symbology reported alongside a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    QrCode,
    DataMatrix,
    Aztec,
    Pdf417,
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Code128,
    Code39,
    Code93,
    Codabar,
    Itf,
    Unknown,
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarcodeFormat::QrCode => "QR Code",
            BarcodeFormat::DataMatrix => "Data Matrix",
            BarcodeFormat::Aztec => "Aztec",
            BarcodeFormat::Pdf417 => "PDF417",
            BarcodeFormat::Ean13 => "EAN-13",
            BarcodeFormat::Ean8 => "EAN-8",
            BarcodeFormat::UpcA => "UPC-A",
            BarcodeFormat::UpcE => "UPC-E",
            BarcodeFormat::Code128 => "Code 128",
            BarcodeFormat::Code39 => "Code 39",
            BarcodeFormat::Code93 => "Code 93",
            BarcodeFormat::Codabar => "Codabar",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// One classification attached to a detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLabel {
    pub text: String,
    pub confidence: f32,
}

/// A face-mesh vertex in image coordinates (z is relative depth).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshPoint {
    pub index: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Kind-specific payload of one detected entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Detection {
    Label {
        text: String,
        confidence: f32,
        index: i32,
    },
    Barcode {
        raw_value: String,
        display_value: String,
        format: BarcodeFormat,
        bounds: Option<BoundingBox>,
    },
    Object {
        tracking_id: Option<i32>,
        bounds: BoundingBox,
        labels: Vec<ObjectLabel>,
    },
    FaceMesh {
        bounds: BoundingBox,
        points: Vec<MeshPoint>,
    },
    Text {
        text: String,
        bounds: Option<BoundingBox>,
    },
}

impl Detection {
    pub fn kind(&self) -> DetectionKind {
        match self {
            Detection::Label { .. } => DetectionKind::Label,
            Detection::Barcode { .. } => DetectionKind::Barcode,
            Detection::Object { .. } => DetectionKind::Object,
            Detection::FaceMesh { .. } => DetectionKind::FaceMesh,
            Detection::Text { .. } => DetectionKind::Text,
        }
    }

    /// Box to draw on the overlay, if the kind carries one.
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Detection::Label { .. } => None,
            Detection::Barcode { bounds, .. } | Detection::Text { bounds, .. } => *bounds,
            Detection::Object { bounds, .. } | Detection::FaceMesh { bounds, .. } => Some(*bounds),
        }
    }
}

/// A detection tagged with where it came from.
///
/// `source_image_id == None` marks a live camera frame; `Some(id)` names the
/// picked image the detection was produced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    #[serde(flatten)]
    pub detection: Detection,
    pub source_image_id: Option<String>,
}

impl DetectionRecord {
    pub fn live(detection: Detection) -> Self {
        Self { detection, source_image_id: None }
    }

    pub fn still(detection: Detection, image_id: impl Into<String>) -> Self {
        Self { detection, source_image_id: Some(image_id.into()) }
    }

    pub fn is_live(&self) -> bool {
        self.source_image_id.is_none()
    }

    pub fn kind(&self) -> DetectionKind {
        self.detection.kind()
    }

    /// De-duplication key. Two records with equal keys are the same entity.
    pub fn identity_key(&self) -> IdentityKey {
        match &self.detection {
            Detection::Barcode { raw_value, .. } => IdentityKey::Barcode(raw_value.clone()),
            Detection::Label { text, .. } => {
                IdentityKey::Label(text.clone(), self.source_image_id.clone())
            }
            Detection::Object { bounds, labels, .. } => {
                IdentityKey::Object(labels.first().map(|l| l.text.clone()), *bounds)
            }
            Detection::FaceMesh { bounds, .. } => IdentityKey::FaceMesh(*bounds),
            Detection::Text { text, .. } => IdentityKey::Text(text.clone()),
        }
    }
}

/// Kind-specific equality used for de-duplication.
///
/// Barcodes match on raw value alone, labels on (text, source image),
/// objects on (first label, box), face meshes on box, text on the exact string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Barcode(String),
    Label(String, Option<String>),
    Object(Option<String>, BoundingBox),
    FaceMesh(BoundingBox),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barcode(raw: &str, display: &str) -> Detection {
        Detection::Barcode {
            raw_value: raw.into(),
            display_value: display.into(),
            format: BarcodeFormat::QrCode,
            bounds: None,
        }
    }

    #[test]
    fn test_barcode_key_ignores_display_and_source() {
        let a = DetectionRecord::live(barcode("0123", "first"));
        let b = DetectionRecord::still(barcode("0123", "second"), "img-1");
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_label_key_includes_source_image() {
        let label = Detection::Label { text: "Cat".into(), confidence: 0.9, index: 1 };
        let a = DetectionRecord::still(label.clone(), "img-1");
        let b = DetectionRecord::still(label.clone(), "img-2");
        let c = DetectionRecord::still(label, "img-1");
        assert_ne!(a.identity_key(), b.identity_key());
        assert_eq!(a.identity_key(), c.identity_key());
    }

    #[test]
    fn test_object_key_uses_first_label_and_box() {
        let bounds = BoundingBox::new(0, 0, 10, 10);
        let object = |labels: &[&str]| Detection::Object {
            tracking_id: None,
            bounds,
            labels: labels
                .iter()
                .map(|t| ObjectLabel { text: (*t).into(), confidence: 0.5 })
                .collect(),
        };
        let a = DetectionRecord::live(object(&["Food", "Plant"]));
        let b = DetectionRecord::live(object(&["Food"]));
        let c = DetectionRecord::live(object(&["Plant", "Food"]));
        assert_eq!(a.identity_key(), b.identity_key());
        assert_ne!(a.identity_key(), c.identity_key());
    }

    #[test]
    fn test_face_mesh_key_ignores_points() {
        let bounds = BoundingBox::new(5, 5, 50, 60);
        let a = DetectionRecord::live(Detection::FaceMesh { bounds, points: vec![] });
        let b = DetectionRecord::live(Detection::FaceMesh {
            bounds,
            points: vec![MeshPoint { index: 0, x: 1.0, y: 2.0, z: 0.0 }],
        });
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_enclosing_box() {
        let bbox = BoundingBox::enclosing([(3, 9), (1, 4), (7, 2)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(1, 2, 7, 9));
        assert_eq!(bbox.width(), 6);
        assert_eq!(bbox.height(), 7);
        assert!(BoundingBox::enclosing(Vec::new()).is_none());
    }

    #[test]
    fn test_record_serializes_with_kind_tag() {
        let record = DetectionRecord::still(barcode("abc", "abc"), "img-7");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "barcode");
        assert_eq!(json["raw_value"], "abc");
        assert_eq!(json["source_image_id"], "img-7");
    }
}
