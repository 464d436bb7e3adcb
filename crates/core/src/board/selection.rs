#![allow(missing_docs)]

//! Mutable per-session selections: chosen tickets, blocked segments and the
//! most recent solver result.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::BoardError;
use crate::models::{GameData, SolutionSet};

/// A segment the player marked unusable. Unique by `route_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedEntry {
    pub from: String,
    pub to: String,
    pub route_index: usize,
}

/// Client-side selection state. Created empty and reset by [`SelectionState::clear`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    tickets: HashSet<usize>,
    blocked: Vec<BlockedEntry>,
    solution: Option<SolutionSet>,
    active_alternative: usize,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of a ticket. Returns whether it is now selected.
    pub fn toggle_ticket(&mut self, data: &GameData, index: usize) -> Result<bool, BoardError> {
        if data.ticket(index).is_none() {
            return Err(BoardError::TicketOutOfRange {
                index,
                len: data.tickets().len(),
            });
        }
        if self.tickets.remove(&index) {
            Ok(false)
        } else {
            self.tickets.insert(index);
            Ok(true)
        }
    }

    /// Block or unblock a segment. Returns whether it is now blocked.
    ///
    /// Re-blocking appends, so an entry removed and added again moves to the end.
    pub fn toggle_blocked_segment(
        &mut self,
        data: &GameData,
        segment_index: usize,
    ) -> Result<bool, BoardError> {
        if let Some(pos) = self
            .blocked
            .iter()
            .position(|entry| entry.route_index == segment_index)
        {
            self.blocked.remove(pos);
            return Ok(false);
        }
        let segment = data
            .segment(segment_index)
            .ok_or(BoardError::UnknownSegment(segment_index))?;
        self.blocked.push(BlockedEntry {
            from: segment.from.clone(),
            to: segment.to.clone(),
            route_index: segment.index,
        });
        Ok(true)
    }

    /// Remove the blocked entry at a list position.
    pub fn remove_blocked_at(&mut self, position: usize) -> Result<BlockedEntry, BoardError> {
        if position >= self.blocked.len() {
            return Err(BoardError::BlockedOutOfRange {
                position,
                len: self.blocked.len(),
            });
        }
        Ok(self.blocked.remove(position))
    }

    /// Return to the empty startup state.
    pub fn clear(&mut self) {
        self.tickets.clear();
        self.blocked.clear();
        self.solution = None;
        self.active_alternative = 0;
    }

    pub fn is_ticket_selected(&self, index: usize) -> bool {
        self.tickets.contains(&index)
    }

    /// Selected ticket indices in ascending order.
    pub fn selected_tickets(&self) -> Vec<usize> {
        let mut indices: Vec<_> = self.tickets.iter().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub fn has_selected_tickets(&self) -> bool {
        !self.tickets.is_empty()
    }

    pub fn blocked(&self) -> &[BlockedEntry] {
        &self.blocked
    }

    pub fn is_blocked(&self, segment_index: usize) -> bool {
        self.blocked
            .iter()
            .any(|entry| entry.route_index == segment_index)
    }

    /// Union of the endpoints of every selected ticket.
    pub fn terminal_cities(&self, data: &GameData) -> BTreeSet<String> {
        self.tickets
            .iter()
            .filter_map(|&index| data.ticket(index))
            .flat_map(|ticket| [ticket.from.clone(), ticket.to.clone()])
            .collect()
    }

    pub fn solution(&self) -> Option<&SolutionSet> {
        self.solution.as_ref()
    }

    pub fn active_alternative(&self) -> usize {
        self.active_alternative
    }

    /// Store a solver result and show its first alternative.
    pub fn install_solution(&mut self, solution: SolutionSet) {
        self.solution = Some(solution);
        self.active_alternative = 0;
    }

    pub fn select_alternative(&mut self, index: usize) -> Result<(), BoardError> {
        let len = self
            .solution
            .as_ref()
            .map(|set| set.solutions.len())
            .unwrap_or(0);
        if index >= len {
            return Err(BoardError::AlternativeOutOfRange { index, len });
        }
        self.active_alternative = index;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{City, Point, Segment, Solution, Ticket};

    fn sample_data() -> GameData {
        let cities = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, name)| City {
                name: name.to_string(),
                position: Point::new(i as f64 * 10.0, 0.0),
            })
            .collect();
        let segments = vec![
            Segment {
                index: 0,
                from: "A".to_string(),
                to: "B".to_string(),
                length: 2,
                color: "red".to_string(),
                tunnel: false,
                ferry: 0,
            },
            Segment {
                index: 1,
                from: "B".to_string(),
                to: "C".to_string(),
                length: 3,
                color: "blue".to_string(),
                tunnel: true,
                ferry: 1,
            },
        ];
        let tickets = vec![
            Ticket {
                index: 0,
                from: "A".to_string(),
                to: "B".to_string(),
                points: 5,
                is_long: false,
            },
            Ticket {
                index: 1,
                from: "B".to_string(),
                to: "C".to_string(),
                points: 8,
                is_long: true,
            },
        ];
        GameData::new(cities, segments, tickets, BTreeMap::new())
    }

    #[test]
    fn terminals_follow_ticket_toggles() {
        let data = sample_data();
        let mut selection = SelectionState::new();
        assert!(selection.toggle_ticket(&data, 0).unwrap());
        assert!(selection.toggle_ticket(&data, 1).unwrap());
        let expected: BTreeSet<_> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(selection.terminal_cities(&data), expected);

        assert!(!selection.toggle_ticket(&data, 0).unwrap());
        let expected: BTreeSet<_> = ["B", "C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(selection.terminal_cities(&data), expected);
        assert_eq!(selection.selected_tickets(), vec![1]);
    }

    #[test]
    fn out_of_range_ticket_is_rejected_without_change() {
        let data = sample_data();
        let mut selection = SelectionState::new();
        let err = selection.toggle_ticket(&data, 7).unwrap_err();
        assert_eq!(err, BoardError::TicketOutOfRange { index: 7, len: 2 });
        assert_eq!(selection, SelectionState::new());
    }

    #[test]
    fn blocking_twice_restores_the_set() {
        let data = sample_data();
        let mut selection = SelectionState::new();
        selection.toggle_blocked_segment(&data, 0).unwrap();
        selection.toggle_blocked_segment(&data, 1).unwrap();
        assert!(!selection.toggle_blocked_segment(&data, 0).unwrap());
        assert!(selection.toggle_blocked_segment(&data, 0).unwrap());

        let order: Vec<_> = selection.blocked().iter().map(|b| b.route_index).collect();
        assert_eq!(order, vec![1, 0]);
        assert_eq!(selection.blocked()[1].from, "A");
        assert_eq!(selection.blocked()[1].to, "B");
        assert!(matches!(
            selection.toggle_blocked_segment(&data, 42),
            Err(BoardError::UnknownSegment(42))
        ));
    }

    #[test]
    fn remove_blocked_at_checks_bounds() {
        let data = sample_data();
        let mut selection = SelectionState::new();
        selection.toggle_blocked_segment(&data, 1).unwrap();
        assert!(selection.remove_blocked_at(3).is_err());
        let removed = selection.remove_blocked_at(0).unwrap();
        assert_eq!(removed.route_index, 1);
        assert!(selection.blocked().is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let data = sample_data();
        let mut selection = SelectionState::new();
        selection.toggle_ticket(&data, 1).unwrap();
        selection.toggle_blocked_segment(&data, 0).unwrap();
        selection.install_solution(SolutionSet {
            selected_tickets: vec![],
            terminals: vec![],
            solutions: vec![
                Solution {
                    label: "first".to_string(),
                    total_cars: 0,
                    total_points: 0,
                    edges: vec![],
                },
                Solution {
                    label: "second".to_string(),
                    total_cars: 0,
                    total_points: 0,
                    edges: vec![],
                },
            ],
        });
        selection.select_alternative(1).unwrap();

        selection.clear();
        assert_eq!(selection, SelectionState::new());
        selection.clear();
        assert_eq!(selection, SelectionState::new());
        assert!(selection.select_alternative(0).is_err());
    }
}
