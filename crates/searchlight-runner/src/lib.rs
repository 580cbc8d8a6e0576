//! Searchlight Runner - crawls audits in bounded batches across invocations.
//!
//! - [`BatchRunner`] claims an audit, crawls one slice of its frontier within a
//!   time budget, then either completes the audit or releases it and arms the
//!   next batch through a [`ContinuationTrigger`].
//! - [`sweep`] and [`SweepLoop`] fail audits whose worker went silent and
//!   re-arm audits whose continuation was lost.
//!
//! # Example
//!
//! ```ignore
//! use searchlight_runner::{BatchRunner, RunnerSettings};
//!
//! let runner = BatchRunner::in_process(db, fetcher, None, RunnerSettings::default());
//! let outcome = runner.run_batch(&audit_id).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod runner;
pub mod settings;
pub mod sweeper;
pub mod trigger;

// Re-export commonly used types
pub use error::{Result, RunnerError};
pub use runner::{AuditReport, BatchOutcome, BatchRunner, FETCH_CUT_OFF};
pub use settings::{RunnerSettings, SweepPolicy};
pub use sweeper::{sweep, sweep_organization, SweepLoop, SweepReport};
pub use trigger::{
    ContinuationTrigger, HttpContinuation, InProcessContinuation, CONTINUATION_SECRET_HEADER,
};
