//! PDF page rotation functionality
//!
//! Rotation only changes the `/Rotate` entry of each page: content streams
//! are never rewritten and the MediaBox stays as it is.

use super::PageRange;
use crate::document::Document;
use crate::error::{PdfError, Result};

/// Rotation angle, clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAngle {
    /// No rotation (0 degrees)
    None,
    /// 90 degrees clockwise
    Clockwise90,
    /// 180 degrees
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Clockwise270,
}

impl RotationAngle {
    /// Create from degrees; only 0, 90, 180 and 270 are accepted
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        match degrees {
            0 => Ok(RotationAngle::None),
            90 => Ok(RotationAngle::Clockwise90),
            180 => Ok(RotationAngle::Rotate180),
            270 => Ok(RotationAngle::Clockwise270),
            _ => Err(PdfError::InvalidRotation(degrees)),
        }
    }

    /// Convert to degrees
    pub fn to_degrees(self) -> i32 {
        match self {
            RotationAngle::None => 0,
            RotationAngle::Clockwise90 => 90,
            RotationAngle::Rotate180 => 180,
            RotationAngle::Clockwise270 => 270,
        }
    }

    /// Compose with an existing page rotation, modulo 360
    pub fn apply_to(self, current: i32) -> i32 {
        (current + self.to_degrees()).rem_euclid(360)
    }

    /// Combine two rotations
    pub fn combine(self, other: RotationAngle) -> RotationAngle {
        match other.apply_to(self.to_degrees()) {
            90 => RotationAngle::Clockwise90,
            180 => RotationAngle::Rotate180,
            270 => RotationAngle::Clockwise270,
            _ => RotationAngle::None,
        }
    }
}

impl TryFrom<i32> for RotationAngle {
    type Error = PdfError;

    fn try_from(degrees: i32) -> Result<Self> {
        Self::from_degrees(degrees)
    }
}

/// Rotate the selected pages of `doc` in place.
///
/// The new rotation is written on each page itself, so an inherited
/// `/Rotate` no longer applies to it. Returns the number of pages rotated.
pub fn rotate_pages(doc: &mut Document, pages: &PageRange, angle: RotationAngle) -> Result<usize> {
    let selected = pages.select(doc)?;

    for page in &selected {
        let rotation = angle.apply_to(page.rotate);
        let dict = doc
            .get_mut(page.reference)
            .and_then(|object| object.as_dict_mut())
            .ok_or(PdfError::DanglingReference(page.reference))?;
        dict.insert("Rotate", i64::from(rotation));
        tracing::debug!(
            "Page {} rotated from {} to {} degrees ({})",
            page.reference,
            page.rotate,
            rotation,
            page.orientation
        );
    }

    tracing::info!(
        "Rotated {} pages by {} degrees",
        selected.len(),
        angle.to_degrees()
    );
    Ok(selected.len())
}

/// Rotate every page of `doc` in place
pub fn rotate_all_pages(doc: &mut Document, angle: RotationAngle) -> Result<usize> {
    rotate_pages(doc, &PageRange::All, angle)
}
