//! Projection of accumulated detections into persistable result cards.

use crate::reconcile::ResultSet;
use crate::types::{Detection, DetectionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TEXT_TITLE_MAX_CHARS: usize = 48;

/// A saved result, as shown in the history list.
///
/// Created at the moment of an explicit save; owned by the store from then on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultCard {
    pub title: String,
    pub subtitle: String,
    /// Identifier of the picked image the result came from, if any.
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResultCard {
    /// Map one record to a card using the kind-specific title/subtitle rules.
    pub fn from_record(record: &DetectionRecord, created_at: DateTime<Utc>) -> Self {
        let (title, subtitle) = describe(&record.detection);
        Self {
            title,
            subtitle,
            image_ref: record.source_image_id.clone(),
            created_at,
        }
    }
}

/// One card per record, in accumulation order.
pub fn project(results: &ResultSet, created_at: DateTime<Utc>) -> Vec<ResultCard> {
    results
        .iter()
        .map(|record| ResultCard::from_record(record, created_at))
        .collect()
}

fn describe(detection: &Detection) -> (String, String) {
    match detection {
        Detection::Label { text, confidence, .. } => {
            (text.clone(), format!("Confidence: {}", percent(*confidence)))
        }
        Detection::Barcode { raw_value, display_value, format, .. } => {
            let title = if display_value.is_empty() { raw_value } else { display_value };
            (title.clone(), format!("{format} · {raw_value}"))
        }
        Detection::Object { bounds, labels, .. } => match labels.first() {
            Some(first) => {
                let subtitle = labels
                    .iter()
                    .map(|l| format!("{} ({})", l.text, percent(l.confidence)))
                    .collect::<Vec<_>>()
                    .join(", ");
                (first.text.clone(), subtitle)
            }
            None => ("Unknown object".to_string(), format!("Box {bounds}")),
        },
        Detection::FaceMesh { bounds, points } => {
            ("Face mesh".to_string(), format!("{} points in {bounds}", points.len()))
        }
        Detection::Text { text, .. } => {
            let first_line = text.lines().next().unwrap_or_default();
            let mut title: String = first_line.chars().take(TEXT_TITLE_MAX_CHARS).collect();
            if first_line.chars().count() > TEXT_TITLE_MAX_CHARS {
                title.push('…');
            }
            (title, format!("{} characters", text.chars().count()))
        }
    }
}

fn percent(confidence: f32) -> String {
    format!("{:.0}%", (confidence * 100.0).clamp(0.0, 100.0))
}
