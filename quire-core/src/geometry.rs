//! Basic geometric types for PDF pages

use crate::parser::objects::{PdfArray, PdfObject};

/// A point in 2D space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Origin point (0, 0)
    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

/// A rectangle defined by two points, as used by MediaBox and CropBox
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    /// Lower-left corner
    pub lower_left: Point,
    /// Upper-right corner
    pub upper_right: Point,
}

impl Rectangle {
    /// Create a new rectangle from two points
    pub fn new(lower_left: Point, upper_right: Point) -> Self {
        Self {
            lower_left,
            upper_right,
        }
    }

    /// Create a rectangle from position and size
    pub fn from_position_and_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            lower_left: Point::new(x, y),
            upper_right: Point::new(x + width, y + height),
        }
    }

    /// US Letter, the default page size when no MediaBox is present
    pub fn us_letter() -> Self {
        Self::from_position_and_size(0.0, 0.0, 612.0, 792.0)
    }

    /// Read a `[llx lly urx ury]` array.
    ///
    /// Corners given in any order are normalised so width and height are
    /// never negative.
    pub fn from_array(array: &PdfArray) -> Option<Self> {
        if array.len() != 4 {
            return None;
        }
        let values: Vec<f64> = array.iter().filter_map(PdfObject::as_real).collect();
        let [x1, y1, x2, y2] = values[..] else {
            return None;
        };
        Some(Self::new(
            Point::new(x1.min(x2), y1.min(y2)),
            Point::new(x1.max(x2), y1.max(y2)),
        ))
    }

    /// Write as a `[llx lly urx ury]` array, keeping integers integral
    pub fn to_array(&self) -> PdfArray {
        let number = |v: f64| {
            if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                PdfObject::Integer(v as i64)
            } else {
                PdfObject::Real(v)
            }
        };
        PdfArray(vec![
            number(self.lower_left.x),
            number(self.lower_left.y),
            number(self.upper_right.x),
            number(self.upper_right.y),
        ])
    }

    /// Get the width
    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    /// Get the height
    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    /// Get the center point
    pub fn center(&self) -> Point {
        Point::new(
            (self.lower_left.x + self.upper_right.x) / 2.0,
            (self.lower_left.y + self.upper_right.y) / 2.0,
        )
    }

    /// Landscape when strictly wider than tall
    pub fn orientation(&self) -> Orientation {
        Orientation::from_size(self.width(), self.height())
    }
}

/// Page orientation derived from the page box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn from_size(width: f64, height: f64) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::Landscape => write!(f, "landscape"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point() {
        let p = Point::new(10.0, 20.0);
        assert_eq!(p.x, 10.0);
        assert_eq!(p.y, 20.0);
        assert_eq!(Point::origin(), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_rectangle() {
        let rect = Rectangle::new(Point::new(10.0, 20.0), Point::new(110.0, 120.0));

        assert_eq!(rect.width(), 100.0);
        assert_eq!(rect.height(), 100.0);

        let center = rect.center();
        assert_eq!(center.x, 60.0);
        assert_eq!(center.y, 70.0);
    }

    #[test]
    fn test_rectangle_from_array_normalises_corners() {
        let array = PdfArray(vec![
            PdfObject::Integer(612),
            PdfObject::Real(792.0),
            PdfObject::Integer(0),
            PdfObject::Integer(0),
        ]);
        let rect = Rectangle::from_array(&array).unwrap();
        assert_eq!(rect, Rectangle::us_letter());
    }

    #[test]
    fn test_rectangle_from_invalid_array() {
        assert!(Rectangle::from_array(&PdfArray(vec![PdfObject::Integer(1)])).is_none());
        let array = PdfArray(vec![
            PdfObject::Integer(0),
            PdfObject::Integer(0),
            PdfObject::name("Wide"),
            PdfObject::Integer(10),
        ]);
        assert!(Rectangle::from_array(&array).is_none());
    }

    #[test]
    fn test_rectangle_to_array() {
        let rect = Rectangle::from_position_and_size(0.0, 0.0, 595.5, 842.0);
        let array = rect.to_array();
        assert_eq!(array.get(2), Some(&PdfObject::Real(595.5)));
        assert_eq!(array.get(3), Some(&PdfObject::Integer(842)));
    }

    #[test]
    fn test_orientation() {
        assert_eq!(
            Rectangle::from_position_and_size(0.0, 0.0, 800.0, 600.0).orientation(),
            Orientation::Landscape
        );
        assert_eq!(
            Rectangle::from_position_and_size(0.0, 0.0, 600.0, 800.0).orientation(),
            Orientation::Portrait
        );
        // Square pages are portrait
        assert_eq!(Orientation::from_size(500.0, 500.0), Orientation::Portrait);
        assert_eq!(Orientation::Landscape.to_string(), "landscape");
    }
}
