#![warn(clippy::all, missing_docs)]

//! Core logic for the route-planning client.
//!
//! This crate hosts the game data models, configuration handling, the HTTP
//! client for the data/solver backend, and the interactive board state
//! machine used by the terminal UI and any future frontends.

pub mod api;
pub mod board;
pub mod config;
pub mod models;
pub mod store;

pub use api::{ApiError, SolveRequest, SolverClient};
pub use board::{BoardController, BoardError, ClickOutcome, InteractionMode, SolveOutcome};
pub use config::AppConfig;
pub use models::{GameData, Point, SolutionSet};
pub use store::GameDataStore;
