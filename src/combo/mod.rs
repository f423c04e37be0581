//! Combo Data Model and File Loading

mod loader;
mod types;

pub use loader::{load_combos, ComboLoadResult};
pub use types::Combo;
