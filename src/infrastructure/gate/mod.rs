//! Request gate infrastructure - the composed decision pipeline

mod service;

pub use service::RequestGate;
