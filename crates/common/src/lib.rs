// idox-common: shared types and text metrics for the idox workspace

pub mod metrics;
pub mod types;
