//! reqtrace - Traffic Dependency Tracer
//!
//! Reads a recorded HTTP capture, discovers interesting values (high-entropy
//! tokens, identifiers, credentials), finds where a value first appears and
//! maps which later requests consume or re-emit related values.

pub mod capture;
pub mod cli;
pub mod config;
pub mod entropy;
pub mod error;
pub mod patterns;
pub mod report;
pub mod seeds;
pub mod tokens;
pub mod tracer;

pub use error::{ReqtraceError, Result};
