//! Testu domain core.
//!
//! Pure types and functions shared by the server: the job model and its
//! identifier generator, test scripts and the batch/merge helpers that
//! build jobs from them, agent reports and their validation, and the
//! scoring, digesting and comparison contracts with their default
//! implementations.
//! Nothing here performs I/O.

pub mod batch;
pub mod compare;
pub mod digest;
pub mod error;
pub mod job;
pub mod milestone;
pub mod report;
pub mod scoring;
pub mod script;
pub mod submission;
pub mod types;
