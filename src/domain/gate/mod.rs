//! Request gate domain - per-request decision types

mod decision;

pub use decision::{DenyReason, GateDecision, GateRequest, RequestIdentity};
