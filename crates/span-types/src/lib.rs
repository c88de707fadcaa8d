//! SPAN Types - Core types for cross-deployment resource exchange
//!
//! SPAN (Stack Peering and Negotiation) lets independently-deployed
//! infrastructure stacks exchange resource handles without a central
//! coordinator. One deployment *offers* a resource to a named beneficiary;
//! another deployment *wishes* for a resource from a named target.
//!
//! ## Key Concepts
//!
//! - **Remote**: a known peer deployment and its RPC endpoint
//! - **Offer**: an outbound resource handle addressed to a beneficiary
//! - **DeploymentOffer**: an offer as it appears on the wire / inbound side
//! - **Wish**: a dependency declaration polled against a target deployment
//! - **RemoteOffer**: the answer to a wish poll
//! - **Action**: the deploy/terminate/destroy decision driving a deployment

#![deny(unsafe_code)]

pub mod action;
pub mod offer;
pub mod remote;
pub mod wish;

// Re-export main types
pub use action::Action;
pub use offer::{DeploymentOffer, Offer, OfferKey};
pub use remote::{Ack, HeartbeatResponse, Remote};
pub use wish::{RemoteOffer, Wish};
