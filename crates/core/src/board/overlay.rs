#![allow(missing_docs)]

//! Interaction layer: one clickable shape per segment and one marker per city.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::scene::{Hit, Layer, Primitive, SegmentStyle};
use super::selection::SelectionState;
use crate::models::{GameData, Point};

/// Minimum perpendicular spacing between parallel segments joining the same cities.
pub const MIN_LANE_SPACING: f64 = 1.4;

/// Builds and restyles the interaction layer from game data and selections.
#[derive(Debug)]
pub struct MapOverlayRenderer {
    layer: Layer,
    lane_spacing: f64,
}

impl Default for MapOverlayRenderer {
    fn default() -> Self {
        Self {
            layer: Layer::new(),
            lane_spacing: MIN_LANE_SPACING,
        }
    }
}

impl MapOverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lane_spacing(&self) -> f64 {
        self.lane_spacing
    }

    /// Set the distance between parallel lanes, never below
    /// [`MIN_LANE_SPACING`]. Returns whether the value changed; the layer
    /// keeps its old geometry until the next [`rebuild`](Self::rebuild).
    pub fn set_lane_spacing(&mut self, spacing: f64) -> bool {
        let spacing = if spacing.is_finite() {
            spacing.max(MIN_LANE_SPACING)
        } else {
            MIN_LANE_SPACING
        };
        if spacing == self.lane_spacing {
            return false;
        }
        self.lane_spacing = spacing;
        true
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub(crate) fn layer_mut(&mut self) -> &mut Layer {
        &mut self.layer
    }

    pub fn clear(&mut self) {
        self.layer.clear();
    }

    /// Rebuild the whole layer: segments first, city markers on top.
    ///
    /// Segments whose cities are unknown are skipped.
    pub fn rebuild(&mut self, data: &GameData, selection: &SelectionState) {
        self.layer.clear();

        let lanes = lane_assignments(data);
        for segment in data.segments() {
            let (Some(from), Some(to)) = (
                data.position_of(&segment.from),
                data.position_of(&segment.to),
            ) else {
                debug!(index = segment.index, "Skipping segment with unknown city");
                continue;
            };
            let (lane, lanes_total) = lanes.get(&segment.index).copied().unwrap_or((0, 1));
            let reversed = segment.from > segment.to;
            let (from, to) =
                offset_lane(from, to, lane, lanes_total, reversed, self.lane_spacing);
            self.layer.push(Primitive::Segment {
                index: segment.index,
                from,
                to,
                style: SegmentStyle::Transparent,
            });
        }

        for city in data.cities() {
            self.layer.push(Primitive::CityMarker {
                name: city.name.clone(),
                at: city.position,
                terminal: false,
            });
        }

        self.apply_selection(data, selection);
    }

    /// Restyle existing shapes from the current selections.
    ///
    /// Every segment and marker is reassigned, so stale highlights are dropped.
    pub fn apply_selection(&mut self, data: &GameData, selection: &SelectionState) {
        let terminals: BTreeSet<String> = selection.terminal_cities(data);
        for primitive in self.layer.primitives_mut() {
            match primitive {
                Primitive::Segment { index, style, .. } => {
                    *style = if selection.is_blocked(*index) {
                        SegmentStyle::Blocked
                    } else {
                        SegmentStyle::Transparent
                    };
                }
                Primitive::CityMarker { name, terminal, .. } => {
                    *terminal = terminals.contains(name.as_str());
                }
                _ => {}
            }
        }
    }

    pub fn hit_test(&self, at: Point, tolerance: f64) -> Option<Hit<'_>> {
        self.layer.hit_test(at, tolerance)
    }

    pub fn segment_style(&self, segment_index: usize) -> Option<SegmentStyle> {
        self.layer.primitives().iter().find_map(|primitive| match primitive {
            Primitive::Segment { index, style, .. } if *index == segment_index => Some(*style),
            _ => None,
        })
    }

    /// Names of city markers currently highlighted as terminals.
    pub fn highlighted_cities(&self) -> BTreeSet<String> {
        self.layer
            .primitives()
            .iter()
            .filter_map(|primitive| match primitive {
                Primitive::CityMarker {
                    name,
                    terminal: true,
                    ..
                } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Lane number and lane count for every segment, grouped by unordered city pair.
fn lane_assignments(data: &GameData) -> HashMap<usize, (usize, usize)> {
    let mut groups: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    for segment in data.segments() {
        let key = if segment.from <= segment.to {
            (segment.from.as_str(), segment.to.as_str())
        } else {
            (segment.to.as_str(), segment.from.as_str())
        };
        groups.entry(key).or_default().push(segment.index);
    }

    let mut lanes = HashMap::new();
    for indices in groups.values() {
        for (lane, &index) in indices.iter().enumerate() {
            lanes.insert(index, (lane, indices.len()));
        }
    }
    lanes
}

/// Shift a segment sideways into its lane. `reversed` keeps the shift on the
/// same side for segments stored in the opposite direction.
fn offset_lane(
    from: Point,
    to: Point,
    lane: usize,
    total: usize,
    reversed: bool,
    spacing: f64,
) -> (Point, Point) {
    if total <= 1 {
        return (from, to);
    }
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f64::EPSILON {
        return (from, to);
    }
    let mut shift = (lane as f64 - (total as f64 - 1.0) / 2.0) * spacing;
    if reversed {
        shift = -shift;
    }
    let (nx, ny) = (-dy / len * shift, dx / len * shift);
    (
        Point::new(from.x + nx, from.y + ny),
        Point::new(to.x + nx, to.y + ny),
    )
}
