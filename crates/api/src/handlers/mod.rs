//! Request handlers.
//!
//! Each submodule serves one audience: requesters submitting targets and
//! reading artifacts and score comparisons, and testing agents pulling
//! jobs and posting results.
//! Errors map to HTTP via [`AppError`](crate::error::AppError), or to an
//! HTML page via [`PageError`](crate::error::PageError) on browser routes.

pub mod agent;
pub mod artifacts;
pub mod intake;
pub mod report;
pub mod scores;
