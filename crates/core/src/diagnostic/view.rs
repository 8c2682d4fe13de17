// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use crate::{
	diagnostic::Diagnostic,
	schema::{SchemaVersion, TableId},
};

/// View definition bound against a different base schema version than the
/// one presented for evaluation.
pub fn view_schema_mismatch(view: TableId, bound: SchemaVersion, presented: SchemaVersion) -> Diagnostic {
	Diagnostic {
		code: "VIEW_001".to_string(),
		message: format!(
			"view {} was bound against base schema version {} but version {} was presented",
			view.0, bound.0, presented.0
		),
		label: Some("stale view definition".to_string()),
		help: Some("Rebuild the view definition with ViewDefinition::update before evaluating".to_string()),
		notes: vec![],
		cause: None,
	}
}

/// A row stream handed to the update generator was not in clustering-key
/// order. This is a contract violation by the caller.
pub fn stream_order_violation(stream: &str) -> Diagnostic {
	Diagnostic {
		code: "VIEW_002".to_string(),
		message: format!("{} stream is not in clustering-key order", stream),
		label: Some("malformed stream ordering".to_string()),
		help: Some(
			"Streams passed to generate_view_updates must yield rows in ascending \
			 clustering-key order; the generator never sorts"
				.to_string(),
		),
		notes: vec![],
		cause: None,
	}
}

/// View filter compilation or evaluation fault.
pub fn view_filter_error(message: impl Into<String>) -> Diagnostic {
	Diagnostic {
		code: "VIEW_003".to_string(),
		message: format!("view filter error: {}", message.into()),
		label: None,
		help: Some("Check the view's filter specification against the base schema".to_string()),
		notes: vec![],
		cause: None,
	}
}

/// Structurally invalid view definition (e.g. more than one base regular
/// column promoted into the view primary key).
pub fn view_definition_invalid(view: TableId, message: impl Into<String>) -> Diagnostic {
	Diagnostic {
		code: "VIEW_004".to_string(),
		message: format!("invalid definition for view {}: {}", view.0, message.into()),
		label: None,
		help: None,
		notes: vec!["A view primary key may contain at most one base non-key column.".to_string()],
		cause: None,
	}
}
