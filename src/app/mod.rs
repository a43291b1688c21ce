//! Session wiring shared by every in-process peer

mod state;

pub use state::AppState;
