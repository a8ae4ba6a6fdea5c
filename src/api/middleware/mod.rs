//! API middleware - gate enforcement, admin auth, client IP resolution

pub mod admin_auth;
pub mod client_ip;
pub mod gate;

pub use admin_auth::RequireManageKeys;
pub use gate::{gate_middleware, GateContext};
