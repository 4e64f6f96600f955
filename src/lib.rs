//! Epinet reconstructs what happened in a proximity-driven epidemic
//! simulation from the event logs its devices left behind.
//!
//! A run's inputs are a JSON properties file and a directory of CSV tables
//! (participants, event histories, mutations, reference sequence). From
//! those, the crate rebuilds, window by window:
//!
//! * the health status of every participant over time ([`status`]),
//! * who infected whom, with duplicate and conflicting reports suppressed
//!   ([`infection`]),
//! * how long each pair of participants was in contact ([`contact`]),
//! * the pathogen's mutation lineage and per-case genome sequences
//!   ([`lineage`]).
//!
//! The [`sweep`] module drives a full sequential pass and [`report`] writes
//! the CSV and FASTA exports. Identifiers appear in two historical
//! encodings; [`identity`] maps both onto dense vertex indices that every
//! network structure shares. Recoverable data problems are skipped, logged,
//! and tallied in [`anomalies::Anomalies`]; they never abort a run.

pub mod anomalies;
pub mod config;
pub mod contact;
pub mod error;
pub mod graph;
pub mod identity;
pub mod infection;
pub mod input;
pub mod lineage;
pub mod log;
pub mod report;
pub mod status;
pub mod sweep;
pub mod window;

pub use crate::anomalies::Anomalies;
pub use crate::config::{IdSchema, SimProperties};
pub use crate::error::EpinetError;
pub use crate::identity::{IdentityResolver, VertexId};
pub use crate::input::{Dataset, Event, ParticipantId};
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::status::{Status, StatusBoard};
pub use crate::sweep::{run_sweep, summarize, RunSummary, SweepOutput};
