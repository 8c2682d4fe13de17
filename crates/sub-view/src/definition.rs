// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! View definitions and their cached derived artifacts.

use std::{collections::BTreeSet, sync::Arc};

use once_cell::sync::OnceCell;
use rangedb_core::{
	ClusteringPrefix, ColumnId, ColumnKind, Error, Result, Schema, SchemaRef, SchemaVersion, TableId, ValueRange,
	diagnostic::view::{view_definition_invalid, view_schema_mismatch},
};
use tracing::debug;

use crate::filter::{CompiledFilter, FilterSpec};

/// Where a view column's value comes from in the base row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
	BasePartitionKey(usize),
	BaseClustering(usize),
	BaseRegular,
}

/// Maps one view column onto the base column it projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewColumnBinding {
	pub view_column: ColumnId,
	pub view_kind: ColumnKind,
	pub base_column: ColumnId,
	pub source: BindingSource,
}

/// The derived artifact group of a view definition: compiled filter,
/// partition-key restriction ranges, clustering prefix, column bindings
/// and the promoted base column. Built once per binding, invalidated as a
/// whole on [`ViewDefinition::update`]; never partially refreshed.
#[derive(Debug)]
pub struct ViewArtifacts {
	pub filter: CompiledFilter,
	pub key_ranges: Vec<ValueRange>,
	pub clustering_prefix: ClusteringPrefix,
	pub bindings: Vec<ViewColumnBinding>,
	/// At most one base regular column promoted into the view primary
	/// key; its liveness gates view-row existence.
	pub promoted: Option<ColumnId>,
	/// Base columns whose change can affect view membership or content:
	/// filter-referenced columns plus every projected base column.
	pub affected_columns: BTreeSet<ColumnId>,
}

/// A registered view: the view schema, the filter it was created with,
/// and the base schema version it is bound against.
///
/// Definitions are replaced wholesale on schema change, never mutated in
/// place; in-flight evaluations keep the artifact snapshot they started
/// with (the artifacts are shared via `Arc`).
#[derive(Debug)]
pub struct ViewDefinition {
	schema: SchemaRef,
	filter: FilterSpec,
	base_table: TableId,
	base_version: SchemaVersion,
	artifacts: OnceCell<Arc<ViewArtifacts>>,
}

impl ViewDefinition {
	pub fn new(schema: SchemaRef, filter: FilterSpec, base: &Schema) -> Self {
		Self {
			schema,
			filter,
			base_table: base.table,
			base_version: base.version,
			artifacts: OnceCell::new(),
		}
	}

	pub fn schema(&self) -> SchemaRef {
		self.schema.clone()
	}

	pub fn table(&self) -> TableId {
		self.schema.table
	}

	pub fn base_table(&self) -> TableId {
		self.base_table
	}

	pub fn base_schema_version(&self) -> SchemaVersion {
		self.base_version
	}

	pub fn filter(&self) -> &FilterSpec {
		&self.filter
	}

	/// Replaces the view schema and rebinds against the given base
	/// schema, discarding the whole derived artifact group. Callers must
	/// externally synchronize with in-flight evaluations; those keep the
	/// snapshot they already hold.
	pub fn update(&mut self, schema: SchemaRef, base: &Schema) {
		debug!(view = self.schema.table.0, base = base.table.0, base_version = base.version.0, "rebinding view definition");
		self.schema = schema;
		self.base_table = base.table;
		self.base_version = base.version;
		self.artifacts = OnceCell::new();
	}

	/// The base regular column embedded in this view's primary key, if
	/// any. O(1) after the first computation.
	pub fn promoted_base_column(&self, base: &Schema) -> Result<Option<ColumnId>> {
		Ok(self.artifacts(base)?.promoted)
	}

	/// The lazily built artifact group for this binding. Fails if the
	/// presented base schema is not the version this definition was bound
	/// against; stale definitions are never evaluated silently.
	pub fn artifacts(&self, base: &Schema) -> Result<Arc<ViewArtifacts>> {
		if base.version != self.base_version || base.table != self.base_table {
			return Err(Error(view_schema_mismatch(self.schema.table, self.base_version, base.version)));
		}
		self.artifacts
			.get_or_try_init(|| self.build_artifacts(base).map(Arc::new))
			.cloned()
	}

	fn build_artifacts(&self, base: &Schema) -> Result<ViewArtifacts> {
		let filter = CompiledFilter::compile(&self.filter, base)?;

		let mut bindings = Vec::with_capacity(self.schema.columns().len());
		let mut promoted = None;

		for view_column in self.schema.columns() {
			let Some(base_column) = base.column_by_name(&view_column.name) else {
				return Err(Error(view_definition_invalid(
					self.schema.table,
					format!("view column '{}' has no base counterpart", view_column.name),
				)));
			};

			let source = match base_column.kind {
				ColumnKind::PartitionKey(position) => BindingSource::BasePartitionKey(position),
				ColumnKind::Clustering(position) => BindingSource::BaseClustering(position),
				ColumnKind::Regular => BindingSource::BaseRegular,
			};

			if view_column.kind.is_primary_key() && source == BindingSource::BaseRegular {
				if promoted.replace(base_column.id).is_some() {
					return Err(Error(view_definition_invalid(
						self.schema.table,
						"more than one base regular column in the view primary key",
					)));
				}
			}

			bindings.push(ViewColumnBinding {
				view_column: view_column.id,
				view_kind: view_column.kind,
				base_column: base_column.id,
				source,
			});
		}

		let mut affected_columns = filter.referenced().clone();
		affected_columns.extend(bindings.iter().map(|b| b.base_column));

		Ok(ViewArtifacts {
			key_ranges: filter.key_ranges().to_vec(),
			clustering_prefix: filter.clustering_prefix().clone(),
			filter,
			bindings,
			promoted,
			affected_columns,
		})
	}
}
