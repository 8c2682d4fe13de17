// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

pub use error::Error;
pub use key::{ClusteringKey, ClusteringPrefix, PartitionKey, Token, ValueRange};
pub use liveness::{Cell, ClockTime, Tombstone, WriteTimestamp};
pub use mutation::{RowOp, ViewMutation};
pub use row::{ClusteringRow, RowDelta};
pub use schema::{ColumnDef, ColumnId, ColumnKind, Schema, SchemaRef, SchemaVersion, TableId};
pub use stream::{PartitionStream, RowReader, VecRowReader};
pub use value::Value;

pub mod diagnostic;
mod error;
mod key;
mod liveness;
mod mutation;
mod row;
mod schema;
mod stream;
mod value;

pub type Result<T> = std::result::Result<T, Error>;
