//! Gated /v1 endpoints

pub mod packages;
pub mod rescrape;
