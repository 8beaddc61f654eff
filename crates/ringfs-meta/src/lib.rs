#![warn(missing_docs)]

//! RingFS metadata subsystem: in-memory metadata authority, namespace tree, inode allocation, ring distribution

pub mod backend;
pub mod blockspec;
pub mod config;
pub mod directory;
pub mod inode;
pub mod kvstore;
pub mod membership;
pub mod ring;
pub mod service;
pub mod types;
pub mod volume;
pub mod watch;

pub use backend::BackendRegistry;
pub use config::MetaConfig;
pub use ring::{build_ring, Ring, RingDescriptor, RingType, RingView};
pub use service::{Authority, LocalMetadata, MetadataService};
pub use types::*;
pub use watch::{RingSubscription, SubscriptionId};
