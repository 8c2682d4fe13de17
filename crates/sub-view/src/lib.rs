// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Materialized-view maintenance for rangedb.
//!
//! Given a base-table write and the set of views registered against the
//! base table, this subsystem decides which views are affected, diffs the
//! partition's pre-write and post-write row states, and produces the view
//! mutations that keep each view consistent with the base rows that
//! currently satisfy its filter. Generated mutations are handed to a
//! dispatcher that routes them to the replicas owning each view's own
//! partition key.

mod definition;
pub mod dispatch;
mod evaluate;
mod filter;
mod generate;
mod registry;

pub use definition::{BindingSource, ViewArtifacts, ViewColumnBinding, ViewDefinition};
pub use dispatch::{ChannelDispatcher, DeliverySink, NodeId, ReplicaResolver, ViewMutationDispatcher};
pub use filter::{CompiledFilter, FilterSpec, Restriction};
pub use generate::generate_view_updates;
pub use rangedb_core::Result;
pub use registry::ViewRegistry;
