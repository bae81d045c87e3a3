//! QR code detector backed by `rqrr`.

use crate::detector::{Detector, DetectorError};
use crate::types::{BarcodeFormat, BoundingBox, Detection, DetectionKind};
use image::DynamicImage;

/// Images smaller than this on either side cannot hold a decodable grid.
const QR_MIN_SIDE: u32 = 21;

/// Decodes every QR code in an image into a barcode detection.
#[derive(Debug, Default)]
pub struct QrDetector;

impl QrDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for QrDetector {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Barcode
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        if image.width() < QR_MIN_SIDE || image.height() < QR_MIN_SIDE {
            return Ok(Vec::new());
        }

        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| gray.get_pixel(x as u32, y as u32).0[0],
        );

        let grids = prepared.detect_grids();
        tracing::debug!(grids = grids.len(), width, height, "QR grids located");

        let mut detections = Vec::with_capacity(grids.len());
        for grid in grids {
            let bounds = BoundingBox::enclosing(grid.bounds.iter().map(|p| (p.x, p.y)));
            match grid.decode() {
                Ok((_, content)) => detections.push(Detection::Barcode {
                    raw_value: content.clone(),
                    display_value: content,
                    format: BarcodeFormat::QrCode,
                    bounds,
                }),
                Err(e) => tracing::debug!(error = %e, ?bounds, "skipping undecodable QR grid"),
            }
        }

        Ok(detections)
    }
}
