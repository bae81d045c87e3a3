//! scanlens-core — Detection records and result reconciliation.
//!
//! Holds the kind-tagged detection types produced by the inference
//! collaborators, the live/still reconciliation rules that merge them into
//! a screen's accumulated result set, and the projection to result cards.

pub mod barcode;
pub mod card;
pub mod detector;
pub mod reconcile;
pub mod types;

pub use barcode::QrDetector;
pub use card::ResultCard;
pub use detector::{Detector, DetectorError};
pub use reconcile::{reconcile, Batch, Reconciled, ResultSet};
pub use types::{
    BarcodeFormat, BoundingBox, Detection, DetectionKind, DetectionRecord, IdentityKey,
    MeshPoint, ObjectLabel,
};
