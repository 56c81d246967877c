//! Persistence of tracked cache records.
//!
//! `StateStore` keeps the whole record list in one JSON file that is
//! rewritten after every polling cycle. A missing or unreadable file is
//! treated as an empty state.

pub mod state;

pub use state::StateStore;
