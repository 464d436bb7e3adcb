#![allow(missing_docs)]

//! Retained drawing layers shared by the overlay renderers.
//!
//! A [`Layer`] is rebuilt as a unit; front-ends only ever paint what is in it.

use crate::models::Point;

/// Width of the invisible hit area drawn for every segment.
pub const SEGMENT_HIT_WIDTH: f64 = 1.2;
pub const CITY_MARKER_RADIUS: f64 = 0.7;
pub const TERMINAL_MARKER_RADIUS: f64 = 1.2;
pub const GLOW_WIDTH: f64 = 1.5;
pub const GLOW_OPACITY: f64 = 0.3;
pub const SOLID_WIDTH: f64 = 0.7;

/// Plain RGB color; front-ends translate it to their own color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn from_hex(value: u32) -> Self {
        Self(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        )
    }
}

pub const BLOCKED_COLOR: Rgb = Rgb::from_hex(0xff4444);
pub const CITY_STROKE: Rgb = Rgb::from_hex(0xa8b2d1);
pub const CALIBRATION_COLOR: Rgb = Rgb::from_hex(0xff00ff);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStyle {
    Transparent,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeKind {
    /// Wide, low-opacity underlay.
    Glow,
    /// Narrow opaque line drawn over the glow.
    Solid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Segment {
        index: usize,
        from: Point,
        to: Point,
        style: SegmentStyle,
    },
    CityMarker {
        name: String,
        at: Point,
        terminal: bool,
    },
    Stroke {
        kind: StrokeKind,
        from: Point,
        to: Point,
        color: Rgb,
        width: f64,
        opacity: f64,
    },
    TerminalMarker {
        name: String,
        at: Point,
        color: Rgb,
    },
    CalibrationMarker {
        city: String,
        at: Point,
    },
    CalibrationLabel {
        city: String,
        at: Point,
    },
}

impl Primitive {
    pub fn is_calibration(&self) -> bool {
        matches!(
            self,
            Primitive::CalibrationMarker { .. } | Primitive::CalibrationLabel { .. }
        )
    }
}

/// Topmost interactive shape under a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit<'a> {
    Segment(usize),
    City(&'a str),
}

/// Ordered primitives; later entries are drawn on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    primitives: Vec<Primitive>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
    }

    pub fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    pub fn pop(&mut self) -> Option<Primitive> {
        self.primitives.pop()
    }

    pub fn last(&self) -> Option<&Primitive> {
        self.primitives.last()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub(crate) fn primitives_mut(&mut self) -> &mut [Primitive] {
        &mut self.primitives
    }

    pub fn count_where(&self, predicate: impl Fn(&Primitive) -> bool) -> usize {
        self.primitives.iter().filter(|p| predicate(p)).count()
    }

    /// Interactive shape closest to `at` within reach.
    ///
    /// A shape is in reach when `at` lies within its own footprint or within
    /// `tolerance` of it. Distance is measured from the footprint edge, so
    /// a pointer inside several footprints ties at zero; ties go to the
    /// topmost shape.
    pub fn hit_test(&self, at: Point, tolerance: f64) -> Option<Hit<'_>> {
        let mut best: Option<(f64, Hit<'_>)> = None;
        for primitive in self.primitives.iter().rev() {
            let (distance, footprint, hit) = match primitive {
                Primitive::CityMarker { name, at: center, .. } => (
                    at.distance_to(*center),
                    CITY_MARKER_RADIUS,
                    Hit::City(name.as_str()),
                ),
                Primitive::Segment {
                    index, from, to, ..
                } => (
                    at.distance_to_segment(*from, *to),
                    SEGMENT_HIT_WIDTH / 2.0,
                    Hit::Segment(*index),
                ),
                _ => continue,
            };
            if distance > footprint.max(tolerance) {
                continue;
            }
            let gap = (distance - footprint).max(0.0);
            if best.map_or(true, |(best_gap, _)| gap < best_gap) {
                best = Some((gap, hit));
            }
        }
        best.map(|(_, hit)| hit)
    }
}

/// Rectangle of map space shown by a viewport, in image coordinates (y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapExtent {
    pub min: Point,
    pub max: Point,
}

impl MapExtent {
    /// Extent of an image of the given size anchored at the origin.
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            min: Point::new(0.0, 0.0),
            max: Point::new(width, height),
        }
    }

    /// Bounding box of `min`..`max` grown by `margin` of its larger side.
    pub fn around(min: Point, max: Point, margin: f64) -> Self {
        let span = (max.x - min.x).max(max.y - min.y).max(1.0);
        let pad = span * margin;
        Self {
            min: Point::new(min.x - pad, min.y - pad),
            max: Point::new(max.x + pad, max.y + pad),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Mapping between a grid of display cells and map space.
///
/// Depends only on the drawing area and the extent, so recomputing it after
/// any number of resize events yields the same mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub left: u16,
    pub top: u16,
    pub cols: u16,
    pub rows: u16,
    pub extent: MapExtent,
}

impl Viewport {
    pub fn new(left: u16, top: u16, cols: u16, rows: u16, extent: MapExtent) -> Self {
        Self {
            left,
            top,
            cols,
            rows,
            extent,
        }
    }

    fn cell_size(&self) -> Option<(f64, f64)> {
        if self.cols == 0 || self.rows == 0 {
            return None;
        }
        Some((
            self.extent.width() / f64::from(self.cols),
            self.extent.height() / f64::from(self.rows),
        ))
    }

    /// Map coordinate at the center of a display cell, `None` outside the area.
    pub fn cell_to_map(&self, col: u16, row: u16) -> Option<Point> {
        let (cell_w, cell_h) = self.cell_size()?;
        if col < self.left || row < self.top {
            return None;
        }
        let dx = col - self.left;
        let dy = row - self.top;
        if dx >= self.cols || dy >= self.rows {
            return None;
        }
        Some(Point::new(
            self.extent.min.x + (f64::from(dx) + 0.5) * cell_w,
            self.extent.min.y + (f64::from(dy) + 0.5) * cell_h,
        ))
    }

    /// Pointer tolerance in map units: half of the larger cell dimension.
    pub fn tolerance(&self) -> f64 {
        self.cell_span() / 2.0
    }

    /// Map distance covered by one display cell along its larger side.
    pub fn cell_span(&self) -> f64 {
        self.cell_size().map(|(w, h)| w.max(h)).unwrap_or(0.0)
    }
}
