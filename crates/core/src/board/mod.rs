#![allow(missing_docs)]

//! Interactive board state machine.
//!
//! [`BoardController`] owns the selections, both overlay layers and the
//! calibration walk, and keeps the layers consistent after every mutation.
//! A single [`InteractionMode`] decides whether pointer clicks toggle segments
//! or capture calibration coordinates.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SolveRequest};
use crate::models::{GameData, Point, SolutionSet};
use crate::store::GameDataStore;

/// City coordinate calibration walk.
pub mod calibration;
/// Interaction layer renderer.
pub mod overlay;
/// Retained drawing primitives and viewport math.
pub mod scene;
/// Mutable selection state.
pub mod selection;
/// Solution layer renderer and results panel model.
pub mod solution;

pub use calibration::{CalibrationController, CalibrationPhase, CalibrationState};
pub use overlay::MapOverlayRenderer;
pub use scene::{Hit, Layer, MapExtent, Primitive, Rgb, SegmentStyle, StrokeKind, Viewport};
pub use selection::{BlockedEntry, SelectionState};
pub use solution::{
    solution_details, solution_tabs, EdgeRow, SolutionDetails, SolutionRenderer, SolutionTab,
};

/// Margin added around the city bounding box when no map size is configured.
const EXTENT_MARGIN: f64 = 0.05;

/// Rejected board operations. None of these leave the state modified.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("game data has not been loaded yet")]
    NotLoaded,
    #[error("ticket {index} out of range ({len} tickets)")]
    TicketOutOfRange { index: usize, len: usize },
    #[error("unknown segment {0}")]
    UnknownSegment(usize),
    #[error("blocked entry {position} out of range ({len} entries)")]
    BlockedOutOfRange { position: usize, len: usize },
    #[error("alternative {index} out of range ({len} alternatives)")]
    AlternativeOutOfRange { index: usize, len: usize },
    #[error("select at least one destination ticket before solving")]
    NoTicketsSelected,
    #[error("not available while calibrating")]
    Calibrating,
    #[error("calibration is not active")]
    NotCalibrating,
}

/// Which handler receives pointer clicks on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    Normal,
    Calibrating,
}

/// Result of routing a click through the active handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    SegmentToggled { index: usize, blocked: bool },
    Captured { city: String, complete: bool },
    Ignored,
}

/// A validated solve request tagged with its sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSolve {
    pub seq: u64,
    pub request: SolveRequest,
}

/// What happened to a solver response handed to [`BoardController::finish_solve`].
#[derive(Debug)]
pub enum SolveOutcome {
    Installed { alternatives: usize },
    /// A newer request was issued after this one; the response was dropped.
    Stale,
    Failed(ApiError),
}

/// Ticket row in the objectives panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketItem {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub points: u32,
    pub selected: bool,
}

/// Tickets split by the long/short classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketGroups {
    pub long: Vec<TicketItem>,
    pub short: Vec<TicketItem>,
}

/// Owns the session's board state and keeps both layers in sync with it.
pub struct BoardController {
    store: GameDataStore,
    extent_override: Option<MapExtent>,
    selection: SelectionState,
    overlay: MapOverlayRenderer,
    solutions: SolutionRenderer,
    calibration: CalibrationController,
    mode: InteractionMode,
    last_solve_seq: u64,
}

impl BoardController {
    pub fn new(store: GameDataStore) -> Self {
        Self {
            store,
            extent_override: None,
            selection: SelectionState::new(),
            overlay: MapOverlayRenderer::new(),
            solutions: SolutionRenderer::new(),
            calibration: CalibrationController::new(),
            mode: InteractionMode::Normal,
            last_solve_seq: 0,
        }
    }

    /// Pin the map extent instead of deriving it from city coordinates.
    pub fn with_extent(mut self, extent: Option<MapExtent>) -> Self {
        self.extent_override = extent;
        self
    }

    fn data(&self) -> Result<Arc<GameData>, BoardError> {
        self.store.snapshot().ok_or(BoardError::NotLoaded)
    }

    fn ensure_normal(&self, operation: &'static str) -> Result<(), BoardError> {
        match self.mode {
            InteractionMode::Normal => Ok(()),
            InteractionMode::Calibrating => {
                warn!(operation, "Rejected while calibrating");
                Err(BoardError::Calibrating)
            }
        }
    }

    /// Build the interaction layer once data is available. No-op before that.
    pub fn init(&mut self) {
        let Some(data) = self.store.snapshot() else {
            return;
        };
        self.reset();
        info!(
            segments = data.segments().len(),
            cities = data.cities().len(),
            "Board initialised"
        );
    }

    /// Session end: leave calibration, drop all selections and ignore any
    /// solve still in flight.
    pub fn reset(&mut self) {
        self.calibration.end();
        self.mode = InteractionMode::Normal;
        self.selection.clear();
        self.solutions.clear();
        self.last_solve_seq += 1;
        match self.store.snapshot() {
            Some(data) => self.overlay.rebuild(&data, &self.selection),
            None => self.overlay.clear(),
        }
        info!("Board reset");
    }

    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Ticket, blocking and solve controls are hidden while calibrating.
    pub fn selection_ui_visible(&self) -> bool {
        self.mode == InteractionMode::Normal
    }

    pub fn interaction_layer(&self) -> &Layer {
        self.overlay.layer()
    }

    pub fn solution_layer(&self) -> &Layer {
        self.solutions.layer()
    }

    pub fn overlay(&self) -> &MapOverlayRenderer {
        &self.overlay
    }

    pub fn solution_renderer(&self) -> &SolutionRenderer {
        &self.solutions
    }

    pub fn calibration(&self) -> &CalibrationController {
        &self.calibration
    }

    /// Map area to display: configured size, or the padded city bounding box.
    pub fn map_extent(&self) -> Option<MapExtent> {
        if let Some(extent) = self.extent_override {
            return Some(extent);
        }
        let data = self.store.snapshot()?;
        let (min, max) = data.bounds()?;
        Some(MapExtent::around(min, max, EXTENT_MARGIN))
    }

    pub fn ticket_groups(&self) -> TicketGroups {
        let Some(data) = self.store.snapshot() else {
            return TicketGroups::default();
        };
        let mut groups = TicketGroups::default();
        for ticket in data.tickets() {
            let item = TicketItem {
                index: ticket.index,
                from: ticket.from.clone(),
                to: ticket.to.clone(),
                points: ticket.points,
                selected: self.selection.is_ticket_selected(ticket.index),
            };
            if ticket.is_long {
                groups.long.push(item);
            } else {
                groups.short.push(item);
            }
        }
        groups
    }

    pub fn toggle_ticket(&mut self, index: usize) -> Result<bool, BoardError> {
        self.ensure_normal("toggle ticket")?;
        let data = self.data()?;
        let selected = self.selection.toggle_ticket(&data, index)?;
        self.overlay.apply_selection(&data, &self.selection);
        debug!(index, selected, "Ticket toggled");
        Ok(selected)
    }

    pub fn toggle_blocked_segment(&mut self, segment_index: usize) -> Result<bool, BoardError> {
        self.ensure_normal("toggle blocked segment")?;
        let data = self.data()?;
        let blocked = self
            .selection
            .toggle_blocked_segment(&data, segment_index)?;
        self.overlay.apply_selection(&data, &self.selection);
        debug!(segment_index, blocked, "Segment toggled");
        Ok(blocked)
    }

    pub fn remove_blocked_at(&mut self, position: usize) -> Result<BlockedEntry, BoardError> {
        self.ensure_normal("remove blocked at")?;
        let data = self.data()?;
        let removed = self.selection.remove_blocked_at(position)?;
        self.overlay.apply_selection(&data, &self.selection);
        debug!(position, route_index = removed.route_index, "Blocked entry removed");
        Ok(removed)
    }

    /// Drop every selection and the current solution, restoring baseline styling.
    /// Solves still in flight are invalidated.
    pub fn clear(&mut self) -> Result<(), BoardError> {
        self.ensure_normal("clear")?;
        self.selection.clear();
        self.solutions.clear();
        self.last_solve_seq += 1;
        if let Some(data) = self.store.snapshot() {
            self.overlay.apply_selection(&data, &self.selection);
        }
        info!("Selections cleared");
        Ok(())
    }

    /// Route a pointer click at map coordinate `at` to the active handler.
    pub fn click(&mut self, at: Point, tolerance: f64) -> ClickOutcome {
        match self.mode {
            InteractionMode::Normal => {
                let hit = match self.overlay.hit_test(at, tolerance) {
                    Some(Hit::Segment(index)) => index,
                    _ => return ClickOutcome::Ignored,
                };
                match self.toggle_blocked_segment(hit) {
                    Ok(blocked) => ClickOutcome::SegmentToggled {
                        index: hit,
                        blocked,
                    },
                    Err(err) => {
                        warn!(%err, "Segment click rejected");
                        ClickOutcome::Ignored
                    }
                }
            }
            InteractionMode::Calibrating => {
                match self.calibration.capture(at, &mut self.overlay) {
                    Some(city) => ClickOutcome::Captured {
                        city,
                        complete: self.calibration.phase() == Some(CalibrationPhase::Complete),
                    },
                    None => ClickOutcome::Ignored,
                }
            }
        }
    }

    /// City label under the pointer, outside calibration.
    pub fn hover(&self, at: Point, tolerance: f64) -> Option<String> {
        if self.mode != InteractionMode::Normal {
            return None;
        }
        match self.overlay.hit_test(at, tolerance) {
            Some(Hit::City(name)) => Some(name.to_string()),
            _ => None,
        }
    }

    /// Show another alternative; only the solution layer is redrawn.
    pub fn select_alternative(&mut self, index: usize) -> Result<(), BoardError> {
        self.selection.select_alternative(index)?;
        self.redraw_solution();
        Ok(())
    }

    fn redraw_solution(&mut self) {
        if self.mode != InteractionMode::Normal {
            return;
        }
        let (Some(data), Some(set)) = (self.store.snapshot(), self.selection.solution()) else {
            self.solutions.clear();
            return;
        };
        self.solutions
            .draw(&data, set, self.selection.active_alternative());
    }

    /// Validate the selection and issue a new solve sequence number.
    pub fn begin_solve(&mut self, num_alternatives: u32) -> Result<PendingSolve, BoardError> {
        self.ensure_normal("begin solve")?;
        let request = SolveRequest::from_selection(&self.selection, num_alternatives)
            .ok_or(BoardError::NoTicketsSelected)?;
        self.last_solve_seq += 1;
        info!(
            seq = self.last_solve_seq,
            tickets = request.tickets.len(),
            blocked = request.blocked.len(),
            "Solve issued"
        );
        Ok(PendingSolve {
            seq: self.last_solve_seq,
            request,
        })
    }

    /// Accept a solver response. Only the newest request may install a result;
    /// failures leave the previous solution in place.
    pub fn finish_solve(&mut self, seq: u64, result: Result<SolutionSet, ApiError>) -> SolveOutcome {
        if seq != self.last_solve_seq {
            warn!(seq, latest = self.last_solve_seq, "Dropping stale solve response");
            return SolveOutcome::Stale;
        }
        match result {
            Ok(set) => {
                let alternatives = set.solutions.len();
                self.selection.install_solution(set);
                self.redraw_solution();
                info!(seq, alternatives, "Solution installed");
                SolveOutcome::Installed { alternatives }
            }
            Err(err) => {
                warn!(seq, %err, "Solve failed");
                SolveOutcome::Failed(err)
            }
        }
    }

    pub fn solution_tabs(&self) -> Vec<SolutionTab> {
        self.selection
            .solution()
            .map(|set| solution_tabs(set, self.selection.active_alternative()))
            .unwrap_or_default()
    }

    pub fn solution_details(&self) -> Option<SolutionDetails> {
        let set = self.selection.solution()?;
        let data = self.store.snapshot()?;
        solution_details(&data, set, self.selection.active_alternative())
    }

    /// Spread parallel lanes at least one display cell apart so each stays
    /// clickable. The interaction layer is rebuilt when the spacing changes;
    /// during calibration the rebuild waits for [`end_calibration`](Self::end_calibration).
    pub fn fit_to_viewport(&mut self, viewport: &Viewport) {
        if !self.overlay.set_lane_spacing(viewport.cell_span()) {
            return;
        }
        debug!(spacing = self.overlay.lane_spacing(), "Lane spacing changed");
        if self.mode != InteractionMode::Normal {
            return;
        }
        if let Some(data) = self.store.snapshot() {
            self.overlay.rebuild(&data, &self.selection);
        }
    }

    /// Enter calibration: both layers are cleared and clicks become captures.
    pub fn start_calibration(&mut self) -> Result<usize, BoardError> {
        let data = self.data()?;
        let walk_order = data.city_names();
        let total = walk_order.len();
        self.solutions.clear();
        self.calibration.start(walk_order, &mut self.overlay);
        self.mode = InteractionMode::Calibrating;
        Ok(total)
    }

    pub fn undo_calibration(&mut self) -> Option<String> {
        self.calibration.undo(&mut self.overlay)
    }

    pub fn calibration_table(&self) -> Option<String> {
        self.calibration.export_table()
    }

    /// Leave calibration, discard its progress and rebuild both layers.
    pub fn end_calibration(&mut self) -> Result<CalibrationState, BoardError> {
        let state = self.calibration.end().ok_or(BoardError::NotCalibrating)?;
        self.mode = InteractionMode::Normal;
        match self.store.snapshot() {
            Some(data) => self.overlay.rebuild(&data, &self.selection),
            None => self.overlay.clear(),
        }
        self.redraw_solution();
        Ok(state)
    }
}
