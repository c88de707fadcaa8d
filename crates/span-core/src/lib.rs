//! SPAN Core - the cross-deployment offer/wish protocol engine
//!
//! This crate implements the protocol that keeps offers and wishes
//! consistent across unreliable, independently-restarting peers:
//!
//! - **Remote registry** ([`registry::RemoteRegistry`]): known peers and
//!   their exclusive RPC connections
//! - **Heartbeat monitor** ([`heartbeat`]): fixed-cadence liveness rounds
//!   with edge-triggered connect events
//! - **Outbound offer store** ([`outbound::OutboundOfferStore`]): offers to
//!   beneficiaries, forwarded directly and re-sent on reconnect
//! - **Inbound offer store** ([`inbound::InboundOfferStore`]): offers
//!   received from origins, with the deployed/withdrawn release handshake
//! - **Runtime** ([`runtime::Runtime`]): the single task folding all of the
//!   above over one merged event stream
//! - **Action scheduler** ([`scheduler::Scheduler`]): the reaction loop
//!   driving the opaque provisioning program
//!
//! ## Concurrency model
//!
//! One logical thread of control: every store and the registry are owned by
//! the runtime task and mutated only by the ordered event fold, so the maps
//! need no locks. Network I/O runs in spawned tasks whose completions
//! re-enter the fold as events. Held acknowledgements (withdrawal callbacks,
//! release acks) are parked `oneshot` senders inside the fold state.

#![deny(unsafe_code)]

pub mod error;
pub mod event;
pub mod heartbeat;
pub mod inbound;
pub mod outbound;
pub mod registry;
pub mod runtime;
pub mod scheduler;

pub use error::{CoreError, CoreResult};
pub use event::Event;
pub use inbound::{InboundOfferRecord, InboundOfferStore};
pub use outbound::OutboundOfferStore;
pub use registry::RemoteRegistry;
pub use runtime::{Handle, Runtime, RuntimeConfig};
pub use scheduler::{ApplyProgram, Scheduler};
