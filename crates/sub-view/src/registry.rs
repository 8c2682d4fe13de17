// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use rangedb_core::TableId;
use tracing::debug;

use crate::definition::ViewDefinition;

/// Registered views, keyed by base table. Lookups hand out a snapshot of
/// the registration list; an in-flight diff keeps evaluating the
/// definitions it was given even while the set changes underneath.
pub struct ViewRegistry {
	views: RwLock<HashMap<TableId, Vec<Arc<ViewDefinition>>>>,
}

impl ViewRegistry {
	pub fn new() -> Self {
		Self {
			views: RwLock::new(HashMap::new()),
		}
	}

	pub fn register(&self, view: Arc<ViewDefinition>) {
		debug!(base = view.base_table().0, view = view.table().0, "registering view");
		self.views.write().entry(view.base_table()).or_default().push(view);
	}

	/// Replaces the registration for `view`'s table with the given
	/// definition, publishing the new snapshot atomically. Registers the
	/// view if it was not present.
	pub fn replace(&self, view: Arc<ViewDefinition>) {
		let mut views = self.views.write();
		let entries = views.entry(view.base_table()).or_default();
		match entries.iter_mut().find(|v| v.table() == view.table()) {
			Some(entry) => *entry = view,
			None => entries.push(view),
		}
	}

	pub fn deregister(&self, base: TableId, view: TableId) {
		let mut views = self.views.write();
		if let Some(entries) = views.get_mut(&base) {
			entries.retain(|v| v.table() != view);
			if entries.is_empty() {
				views.remove(&base);
			}
		}
		debug!(base = base.0, view = view.0, "deregistered view");
	}

	/// Snapshot of the views registered against a base table.
	pub fn views_for(&self, base: TableId) -> Vec<Arc<ViewDefinition>> {
		self.views.read().get(&base).cloned().unwrap_or_default()
	}
}

impl Default for ViewRegistry {
	fn default() -> Self {
		Self::new()
	}
}
