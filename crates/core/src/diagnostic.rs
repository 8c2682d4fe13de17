// Copyright (c) rangedb.io 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

pub mod view;

/// Structured description of a fault, carried by every [`crate::Error`].
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
	pub code: String,
	pub message: String,
	pub label: Option<String>,
	pub help: Option<String>,
	pub notes: Vec<String>,
	pub cause: Option<Box<Diagnostic>>,
}

/// Creates an internal error diagnostic with source location context.
pub fn internal_with_location(reason: impl Into<String>, file: &str, line: u32, column: u32) -> Diagnostic {
	let reason = reason.into();

	Diagnostic {
		code: "INTERNAL_ERROR".to_string(),
		message: format!("Internal error: {}", reason),
		label: Some(format!("internal invariant violated at {}:{}:{}", file, line, column)),
		help: Some(
			"This is an internal error that should never occur in normal operation. \
			 Please file a bug report at: https://github.com/rangedb/rangedb/issues"
				.to_string(),
		),
		notes: vec!["This error indicates a critical internal inconsistency.".to_string()],
		cause: None,
	}
}

/// Simplified internal error without location context.
pub fn internal(reason: impl Into<String>) -> Diagnostic {
	internal_with_location(reason, "unknown", 0, 0)
}

/// Macro to create an internal error diagnostic with automatic source
/// location capture.
#[macro_export]
macro_rules! internal_error {
    ($reason:expr) => {
        $crate::diagnostic::internal_with_location($reason, file!(), line!(), column!())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::diagnostic::internal_with_location(format!($fmt, $($arg)*), file!(), line!(), column!())
    };
}

/// Macro to create an internal error result with automatic source location
/// capture.
#[macro_export]
macro_rules! internal_err {
    ($reason:expr) => {
        Err($crate::Error($crate::internal_error!($reason)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::Error($crate::internal_error!($fmt, $($arg)*)))
    };
}

/// Macro to return an internal error with automatic source location capture.
#[macro_export]
macro_rules! return_internal_error {
    ($reason:expr) => {
        return Err($crate::Error($crate::internal_error!($reason)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::Error($crate::internal_error!($fmt, $($arg)*)))
    };
}
