//! SPAN Client - unary RPC clients
//!
//! Two clients over the same HTTP/JSON substrate:
//!
//! - [`PeerClient`]: a deployment's view of a remote's Deployment service
//!   (`offer`, `releaseOffer`, `heartbeat`). One client per registered
//!   remote, owned by the remote registry.
//! - [`ResourcesClient`]: the client provisioning adapters use against their
//!   own deployment's Resources service (remote/offer lifecycle, wish polls).
//!
//! Errors classify availability: [`ClientError::is_unavailable`] is true for
//! connect failures, timeouts, and 503 responses, which the core treats as
//! transient and recovers from via resend-on-reconnect.

#![deny(unsafe_code)]

pub mod error;
pub mod peer;
pub mod resources;

pub use error::{ClientError, ClientResult};
pub use peer::PeerClient;
pub use resources::ResourcesClient;
