#![allow(missing_docs)]

//! Request and response payloads exchanged with the backend.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::board::{BlockedEntry, SelectionState};
use crate::models::{deserialize_cities, City, GameData, Segment, Ticket};

/// Body of `POST /api/solve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub tickets: Vec<usize>,
    pub blocked: Vec<BlockedEntry>,
    pub num_alternatives: u32,
}

impl SolveRequest {
    /// Package the current selections. `None` when no ticket is selected.
    pub fn from_selection(selection: &SelectionState, num_alternatives: u32) -> Option<Self> {
        if !selection.has_selected_tickets() {
            return None;
        }
        Some(Self {
            tickets: selection.selected_tickets(),
            blocked: selection.blocked().to_vec(),
            num_alternatives,
        })
    }
}

/// Body of `GET /api/data`. Segments are called routes on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct RawGameData {
    #[serde(deserialize_with = "deserialize_cities")]
    cities: Vec<City>,
    #[serde(default)]
    routes: Vec<Segment>,
    #[serde(default)]
    tickets: Vec<Ticket>,
    #[serde(default)]
    scoring: HashMap<String, u32>,
}

impl RawGameData {
    pub(crate) fn into_game_data(self) -> GameData {
        let scoring: BTreeMap<u32, u32> = self
            .scoring
            .into_iter()
            .filter_map(|(length, points)| match length.trim().parse::<u32>() {
                Ok(length) => Some((length, points)),
                Err(_) => {
                    warn!(%length, "Ignoring scoring entry with non-numeric length");
                    None
                }
            })
            .collect();
        GameData::new(self.cities, self.routes, self.tickets, scoring)
    }
}
