//! Per-user access resolution
//!
//! Three signals decide what a user may do with an integration: the org
//! admin's category ceiling, the user's connection record, and the level the
//! user chose for that connection. The pure combination rule lives in
//! `access-core`; this module reads the signals and applies it.

mod resolver;
mod store;

pub use access_core::{
    AccessLevel, Category, ConnectionSignal, ConnectionStatus, EffectiveAccess, OperationAccess,
};
pub use resolver::{AccessProfile, AccessResolver, ProviderAccess, UserContext};
pub use store::{
    ConnectionSnapshot, ConnectionStore, MemoryStore, OrgPolicy, OrgPolicyStore, OrgRecords,
    OrgSnapshot, StoreError, StoreSnapshot,
};
