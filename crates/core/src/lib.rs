//! promptcast core - multi-provider prompt dispatch
//!
//! Delivers one prompt to one or many chat providers, each living in its own
//! host session (a browser tab in production):
//!
//! - **Registry**: provider id -> live session, at most one per provider
//! - **Provisioner**: reuse a live session or open a new one, serialized per provider
//! - **Readiness**: bounded fixed-interval polling until the session is ready
//! - **Delivery**: acquire, wait, send; every failure becomes a result record
//! - **Coordinator**: single-target and concurrent all-target dispatch
//! - **Monitor**: evicts sessions closed outside our control
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ DispatchCoordinator  │  dispatch_one / dispatch_all (join_all fan-out)
//! └──────────┬───────────┘
//!     ┌──────▼──────┐
//!     │ DeliveryUnit│  acquire -> await_ready -> send (bounded)
//!     └──┬───────┬──┘
//!        │       │
//! ┌──────▼───┐ ┌─▼───────────────┐      ┌──────────────────┐
//! │Provisioner│ │ ReadinessWaiter │      │ LifecycleMonitor │
//! └──────┬───┘ └─────────────────┘      └────────┬─────────┘
//!        │          SessionRegistry  ◄────────────┘ evict
//!        ▼
//!   dyn SessionHost  (relay to chrome.tabs, or MockHost in tests)
//! ```

pub mod config;
pub mod coordinator;
pub mod delivery;
pub mod error;
pub mod host;
pub mod monitor;
pub mod provisioner;
pub mod readiness;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{DispatchOptions, ProviderSet};
pub use coordinator::DispatchCoordinator;
pub use delivery::DeliveryUnit;
pub use error::{Error, Result};
pub use host::{HostError, SessionHost};
pub use monitor::LifecycleMonitor;
pub use provisioner::SessionProvisioner;
pub use readiness::ReadinessWaiter;
pub use registry::{SessionHandle, SessionRegistry};

// Wire types are part of this crate's API surface.
pub use promptcast_protocol as protocol;
