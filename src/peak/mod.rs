//! Elements, emission lines, transition series and the peak table registry.

pub mod element;
pub mod table;
pub mod transition;

pub use element::*;
pub use table::*;
pub use transition::*;
