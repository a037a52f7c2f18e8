//! patchtester core library.
//!
//! Speculatively integrates requested changes from a source branch into one
//! or more target branches of a Perforce depot, checks that each resolves
//! cleanly, and diagnoses the ones that do not: configuration, the request
//! tree, the `p4` backend adapter, the integration orchestrator, the conflict
//! diagnostician, and report building and delivery.

pub mod config;
pub mod diagnose;
pub mod errors;
pub mod fakes;
pub mod integration;
pub mod model;
pub mod notify;
pub mod p4;
pub mod report;
pub mod requests;

// Re-exports for convenience.
pub use config::AppConfig;
pub use integration::{AutoConfirm, Confirmer, PatchTester, RunSettings};
pub use model::{Branch, RequestTree};
pub use p4::{P4Backend, P4Client};
pub use report::{ReportBuilder, ReportSection};
