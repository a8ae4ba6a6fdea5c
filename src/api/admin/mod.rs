//! Admin endpoints - key lifecycle management

pub mod api_keys;
