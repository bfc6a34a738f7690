//! # insight-dataops
//!
//! A versioned, hash-verified mutation engine for small tabular datasets.
//! Every change to a dataset goes through one pipeline:
//!
//! ```text
//! ingest ──▶ DatasetSnapshot v1
//!                 │
//!   TransformationPlan ──▶ TransformationRunner ──▶ DatasetSnapshot v2 (+ history entry, new hash)
//!                 │
//!          DraftController: staged edits stay local until save; discard returns to the committed state
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use insight_dataops::dataops::{OperationKind, TransformationPlan};
//! use insight_dataops::session::Session;
//!
//! # fn example() -> insight_dataops::error::Result<()> {
//! let mut session = Session::default();
//! session.upload_text("people.csv", "name,age\nAlice,30\nBob,\n")?;
//!
//! let outcome = session.apply_to_active(&TransformationPlan::single(OperationKind::FillNulls), None)?;
//! assert_eq!(outcome.snapshot.version(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`dataset`]: cell values, rows with stable ids, schemas and versioned snapshots
//! - [`ingest`]: CSV / JSON parsing with type inference
//! - [`dataops`]: operations, plan validation and the transformation runner
//! - [`integrity`]: content fingerprints
//! - [`planner`]: the boundary to plan producers, plus a keyword planner
//! - [`session`]: dataset cache, draft/commit control and commit notifications
//! - [`config`]: settings and the activity log
//! - [`export`]: writing snapshots back to CSV / JSON
//! - [`error`]: error types and handling utilities

pub mod config;
pub mod dataops;
pub mod dataset;
pub mod error;
pub mod export;
pub mod ingest;
pub mod integrity;
pub mod logging;
pub mod planner;
pub mod session;
