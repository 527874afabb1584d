//! Report model
//!
//! This module provides:
//! - Summary statistics over defined band estimates ([`summary`])
//! - The per-band RT60 report and its serialized table ([`report`])

pub mod report;
pub mod summary;
