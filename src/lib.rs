//! fleetsync - client-side data synchronization for a VPN fleet dashboard
//!
//! Keeps per-domain snapshots of backend data fresh through polling and
//! push merges, discards stale responses by generation, applies optimistic
//! mutations with guaranteed rollback, and drives paged listings and bulk
//! actions over the same store.

pub mod bulk;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod logging;
pub mod mutation;
pub mod paging;
pub mod polling;
pub mod push;
pub mod snapshot;
pub mod widgets;

pub use error::SyncError;
