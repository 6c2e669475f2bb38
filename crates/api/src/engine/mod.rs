//! Job distribution engine.
//!
//! Contains the in-memory job store, the agent roster and pull
//! dispatcher, the report archive and script library, and the report
//! ingestion pipeline that drives a job from posted report to persisted
//! digest.

pub mod archive;
pub mod dispatcher;
pub mod ingest;
pub mod roster;
pub mod scripts;
pub mod store;
