//! Wire types for promptcast.
//!
//! This crate contains the serde-serializable types exchanged between the
//! dispatch core, the relay, the browser extension background worker, and the
//! extension UI. It depends on nothing but serde so it builds for `wasm32`.
//!
//! # Main Types
//!
//! - [`ProviderDescriptor`] - one configured chat endpoint
//! - [`RequestContext`] - the prompt plus optional page environment
//! - [`DeliveryResult`] / [`DispatchOutcome`] - per-provider outcomes
//! - [`InboundRequest`] / [`InboundResponse`] - UI-facing request envelope
//! - [`RelayMessage`] / [`ExtensionMessage`] - relay <-> extension bridge frames

pub mod bridge;
pub mod context;
pub mod inbound;
pub mod provider;
pub mod result;

pub use bridge::*;
pub use context::*;
pub use inbound::*;
pub use provider::*;
pub use result::*;
