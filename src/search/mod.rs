//! Peak search and series proposal.
//!
//! - `searcher`: detect peak channels in raw data
//! - `scoring`: rate candidate series against a channel / residual
//! - `proposal`: candidate generation, two-tier ranking, greedy assignment
//! - `job`: run a proposal search on a worker thread with progress + cancel

pub mod job;
pub mod proposal;
pub mod scoring;
pub mod searcher;

pub use job::*;
pub use proposal::*;
pub use scoring::*;
pub use searcher::*;
