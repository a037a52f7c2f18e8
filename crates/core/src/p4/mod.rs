//! Perforce CLI wrapper for patchtester.

pub mod backend;
pub mod client;
pub mod parser;

pub use backend::{CommandOutcome, NoOp, P4Backend, RevRange};
pub use client::P4Client;
pub use parser::*;
