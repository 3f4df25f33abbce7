//! OVN Northbound command layer
//!
//! Expresses virtual network topology (logical switches and ports, routers
//! and router ports, static routes, ACLs, address sets and service function
//! chains) as typed commands, and applies batches of them atomically with
//! optimistic concurrency over a [`ovn_nb_store::RowStore`].
//!
//! Parent/child membership lists are maintained by the commands: creating a
//! child appends it to its parent, deleting it removes it, and deleting a
//! parent removes everything it owns.

mod acl;
mod api;
mod batch;
mod columns;
mod command;
mod config;
mod connection;
mod entity;
mod error;
mod membership;
pub mod naming;
mod query;
mod transaction;

pub use acl::{
    compute_diff, AclChangeSummary, AclPatch, AclRemovalPolicy, AclRule, AclSnapshot,
    AclUpdateMode, CurrentAcl, TargetPort, UpdateAcls,
};
pub use api::{log_results, DeleteBy, NbApi};
pub use batch::{build_commands, parse_batch, BatchOp};
pub use columns::ColumnMap;
pub use command::{
    AddAcl, AddStaticRoute, BindRouterPort, Command, CommandResult, CreateEntity, DeleteAcls,
    DeleteEntity, DeleteStaticRoute, SetEntity, SetExternalId, UpdateAddressSet,
};
pub use config::{AclConfig, ConnectionConfig, NbConfig, QueryConfig, DEFAULT_CONFIG_PATH};
pub use connection::NbConnection;
pub use entity::{Entity, Relation};
pub use error::{NbError, NbResult, TxnStatus};
pub use query::{RouterSummary, StaticRouteSummary, SwitchPorts};
pub use transaction::Transaction;
