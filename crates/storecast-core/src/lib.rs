//! # storecast-core
//!
//! Channel registry, mailboxes and snapshot producers for the storecast
//! broadcaster.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Mailbox** - Bounded per-subscriber FIFO with drop-oldest overflow
//! - **Channel** - One store's subscribers and its producer handle
//! - **Registry** - Single owner of membership: subscribe, unsubscribe, broadcast, status
//! - **Producer** - Per-channel task redistributing snapshots while the channel is non-empty
//! - **Dispatch** - The one delivery path shared by pushes and snapshots
//! - **Lifecycle** - Producer start/stop decisions and the shutdown sweep
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ subscribe ┌─────────────┐  after_join   ┌─────────────┐
//! │ Subscription │──────────▶│  Registry   │──────────────▶│  Lifecycle  │
//! └──────────────┘  (drop →  └─────────────┘  after_leave  └─────────────┘
//!        ▲        unsubscribe)      │ broadcast                   │ spawn/stop
//!        │ recv                     ▼                             ▼
//! ┌──────────────┐   push    ┌─────────────┐   deliver     ┌─────────────┐
//! │   Mailbox    │◀──────────│  Dispatch   │◀──────────────│  Producer   │
//! └──────────────┘           └─────────────┘               └─────────────┘
//! ```

pub mod channel;
pub mod dispatch;
pub mod lifecycle;
pub mod mailbox;
pub mod message;
pub mod producer;
pub mod registry;
pub mod source;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{Channel, ChannelId, SubscriberId};
pub use dispatch::Delivery;
pub use lifecycle::ShutdownReport;
pub use mailbox::{Mailbox, MailboxError, PushOutcome};
pub use message::{Message, Origin};
pub use producer::ProducerState;
pub use registry::{ChannelStatus, Registry, RegistryConfig, RegistryError, RegistryStatus};
pub use source::{ChannelCatalog, SnapshotSource, SourceError};
pub use subscription::Subscription;
