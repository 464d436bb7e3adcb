#![allow(missing_docs)]

//! City coordinate calibration.
//!
//! The operator clicks every city once, in walk order. Each capture draws a
//! marker and a label onto the interaction layer; undo removes that pair again.
//! Once every city is captured the coordinates can be exported as a table that
//! the data backend reads back in.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info};

use super::overlay::MapOverlayRenderer;
use super::scene::Primitive;
use crate::models::Point;

/// Column width reserved for city names in the exported table.
pub const NAME_COLUMN_WIDTH: usize = 20;

/// Phase of an active calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Walking,
    Complete,
}

/// Progress of one calibration run.
///
/// `cursor` always equals the number of captures, and exactly the cities
/// before it in `walk_order` have a coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationState {
    walk_order: Vec<String>,
    cursor: usize,
    captures: HashMap<String, (i64, i64)>,
}

impl CalibrationState {
    pub fn new(walk_order: Vec<String>) -> Self {
        Self {
            walk_order,
            cursor: 0,
            captures: HashMap::new(),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total(&self) -> usize {
        self.walk_order.len()
    }

    pub fn phase(&self) -> CalibrationPhase {
        if self.cursor >= self.walk_order.len() {
            CalibrationPhase::Complete
        } else {
            CalibrationPhase::Walking
        }
    }

    /// City the next click will be recorded for.
    pub fn current_city(&self) -> Option<&str> {
        self.walk_order.get(self.cursor).map(String::as_str)
    }

    pub fn captured(&self, city: &str) -> Option<(i64, i64)> {
        self.captures.get(city).copied()
    }

    /// Captured coordinates in walk order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, (i64, i64))> + '_ {
        self.walk_order[..self.cursor]
            .iter()
            .filter_map(|name| self.captures.get(name).map(|&xy| (name.as_str(), xy)))
    }

    fn record(&mut self, at: Point) -> Option<(String, (i64, i64))> {
        let city = self.current_city()?.to_string();
        let xy = (at.x.round() as i64, at.y.round() as i64);
        self.captures.insert(city.clone(), xy);
        self.cursor += 1;
        Some((city, xy))
    }

    fn unrecord(&mut self) -> Option<String> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        let city = self.walk_order[self.cursor].clone();
        self.captures.remove(&city);
        Some(city)
    }
}

/// Modal controller for the calibration walk: inactive, walking or complete.
#[derive(Debug, Default)]
pub struct CalibrationController {
    state: Option<CalibrationState>,
}

impl CalibrationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&CalibrationState> {
        self.state.as_ref()
    }

    /// `None` while inactive.
    pub fn phase(&self) -> Option<CalibrationPhase> {
        self.state.as_ref().map(CalibrationState::phase)
    }

    /// Begin a fresh walk over `walk_order`, discarding earlier progress and
    /// clearing the interaction layer.
    pub fn start(&mut self, walk_order: Vec<String>, overlay: &mut MapOverlayRenderer) {
        info!(cities = walk_order.len(), "Calibration started");
        overlay.clear();
        self.state = Some(CalibrationState::new(walk_order));
    }

    /// Record a click for the current city. Returns the city captured, or
    /// `None` when inactive or already complete.
    pub fn capture(&mut self, at: Point, overlay: &mut MapOverlayRenderer) -> Option<String> {
        let state = self.state.as_mut()?;
        let (city, (x, y)) = state.record(at)?;
        let at = Point::new(x as f64, y as f64);
        let layer = overlay.layer_mut();
        layer.push(Primitive::CalibrationMarker {
            city: city.clone(),
            at,
        });
        layer.push(Primitive::CalibrationLabel {
            city: city.clone(),
            at,
        });
        debug!(%city, x, y, cursor = state.cursor(), "Calibration capture");
        if state.phase() == CalibrationPhase::Complete {
            info!(cities = state.total(), "Calibration complete");
        }
        Some(city)
    }

    /// Step back one capture, removing its marker and label together.
    pub fn undo(&mut self, overlay: &mut MapOverlayRenderer) -> Option<String> {
        let state = self.state.as_mut()?;
        let city = state.unrecord()?;
        let layer = overlay.layer_mut();
        for _ in 0..2 {
            if layer.last().is_some_and(Primitive::is_calibration) {
                layer.pop();
            }
        }
        debug!(%city, cursor = state.cursor(), "Calibration undo");
        Some(city)
    }

    /// Formatted coordinate table, available once every city is captured.
    pub fn export_table(&self) -> Option<String> {
        let state = self.state.as_ref()?;
        (state.phase() == CalibrationPhase::Complete)
            .then(|| format_coordinate_table(state.entries()))
    }

    /// Leave calibration, returning the discarded progress.
    pub fn end(&mut self) -> Option<CalibrationState> {
        let state = self.state.take();
        if let Some(state) = &state {
            info!(
                captured = state.cursor(),
                total = state.total(),
                "Calibration ended"
            );
        }
        state
    }
}

/// Render captured coordinates as a `CITIES = { ... }` block, one city per line.
pub fn format_coordinate_table<'a>(
    entries: impl IntoIterator<Item = (&'a str, (i64, i64))>,
) -> String {
    let mut table = String::from("CITIES = {\n");
    for (name, (x, y)) in entries {
        let key = format!("\"{name}\":");
        table.push_str(&format!(
            "    {key:<width$} {{\"x\": {x:>4}, \"y\": {y:>4}}},\n",
            width = NAME_COLUMN_WIDTH + 3
        ));
    }
    table.push_str("}\n");
    table
}

/// Write a coordinate table to a timestamped file under `dir`.
pub fn write_export(dir: impl AsRef<Path>, table: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;
    let path = dir.join(format!(
        "calibration_{}.txt",
        Local::now().format("%Y%m%d%H%M%S")
    ));
    fs::write(&path, table).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Calibration table exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cities(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn calibration_primitives(overlay: &MapOverlayRenderer) -> usize {
        overlay.layer().count_where(Primitive::is_calibration)
    }

    #[test]
    fn walking_captures_every_city_then_completes() {
        let mut overlay = MapOverlayRenderer::new();
        let mut controller = CalibrationController::new();
        controller.start(cities(&["A", "B", "C"]), &mut overlay);
        assert_eq!(controller.phase(), Some(CalibrationPhase::Walking));

        for (i, x) in [10.4, 20.6, 30.0].iter().enumerate() {
            assert_eq!(controller.export_table(), None);
            controller.capture(Point::new(*x, 5.0), &mut overlay);
            let state = controller.state().expect("active");
            assert_eq!(state.cursor(), i + 1);
            assert_eq!(calibration_primitives(&overlay), 2 * (i + 1));
        }

        let state = controller.state().expect("active");
        assert_eq!(state.phase(), CalibrationPhase::Complete);
        assert_eq!(state.captured("A"), Some((10, 5)));
        assert_eq!(state.captured("B"), Some((21, 5)));
        assert!(controller.capture(Point::new(1.0, 1.0), &mut overlay).is_none());
        assert_eq!(calibration_primitives(&overlay), 6);
        assert!(controller.export_table().is_some());
    }

    #[test]
    fn undo_everything_returns_to_start() {
        let mut overlay = MapOverlayRenderer::new();
        let mut controller = CalibrationController::new();
        controller.start(cities(&["A", "B", "C", "D"]), &mut overlay);
        let initial = controller.state().cloned();

        assert!(controller.undo(&mut overlay).is_none());
        for k in 0..3 {
            controller.capture(Point::new(k as f64, 0.0), &mut overlay);
        }
        assert_eq!(controller.undo(&mut overlay).as_deref(), Some("C"));
        assert_eq!(calibration_primitives(&overlay), 4);
        assert_eq!(controller.undo(&mut overlay).as_deref(), Some("B"));
        assert_eq!(controller.undo(&mut overlay).as_deref(), Some("A"));

        assert_eq!(controller.state().cloned(), initial);
        assert_eq!(calibration_primitives(&overlay), 0);
        assert!(overlay.layer().is_empty());
    }

    #[test]
    fn restart_discards_prior_progress() {
        let mut overlay = MapOverlayRenderer::new();
        let mut controller = CalibrationController::new();
        controller.start(cities(&["A", "B"]), &mut overlay);
        controller.capture(Point::new(1.0, 1.0), &mut overlay);
        controller.start(cities(&["A", "B"]), &mut overlay);
        let state = controller.state().expect("active");
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.captured("A"), None);
        assert!(overlay.layer().is_empty());

        let ended = controller.end().expect("was active");
        assert_eq!(ended.cursor(), 0);
        assert!(!controller.is_active());
        assert_eq!(controller.phase(), None);
    }

    #[test]
    fn table_lists_cities_in_walk_order() {
        let mut overlay = MapOverlayRenderer::new();
        let mut controller = CalibrationController::new();
        controller.start(cities(&["Rio", "Lima"]), &mut overlay);
        controller.capture(Point::new(120.0, 45.0), &mut overlay);
        controller.capture(Point::new(900.0, 300.0), &mut overlay);

        let table = controller.export_table().expect("complete");
        let expected = format!(
            "CITIES = {{\n    \"Rio\":{} {{\"x\":  120, \"y\":   45}},\n    \"Lima\":{} {{\"x\":  900, \"y\":  300}},\n}}\n",
            " ".repeat(17),
            " ".repeat(16),
        );
        assert_eq!(table, expected);
    }

    #[test]
    fn export_writes_table_file() -> Result<()> {
        let dir = tempdir()?;
        let table = format_coordinate_table([("A", (1, 2))]);
        let path = write_export(dir.path().join("exports"), &table)?;
        assert_eq!(fs::read_to_string(&path)?, table);
        assert!(path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("calibration_")));
        Ok(())
    }
}
