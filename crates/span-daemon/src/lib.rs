//! spand - the SPAN deployment daemon
//!
//! Wires the span-core runtime and action scheduler to two HTTP surfaces:
//! the Deployment service that peer deployments call and the Resources
//! service that local infrastructure adapters call.

pub mod api;
pub mod config;
pub mod error;
pub mod program;
pub mod server;

pub use config::SpanConfig;
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult};
pub use server::Server;
