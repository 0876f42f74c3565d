//! Gateway middleware

pub mod errors;
pub mod metrics;
