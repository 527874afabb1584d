//! Energy decay analysis
//!
//! - Schroeder backward integration with noise-floor handling ([`curve`])
//! - Least-squares decay-rate extraction for T20/T30/T60/EDT ([`regression`])

pub mod curve;
pub mod regression;
