//! Local-first editing history and project sync for an AI image studio.
//!
//! Edits are recorded on an undo/redo [`history`] stack and persisted to a
//! SQLite [`db`] of local projects, each carrying an append-only log of
//! events and state revisions. The [`sync`] reconciler pushes those
//! projects to a [`remote`] backend whenever one is reachable.

pub mod api;
pub mod config;
pub mod db;
pub mod editor;
pub mod history;
pub mod models;
pub mod remote;
pub mod snapshot;
pub mod sync;
pub mod tasks;
