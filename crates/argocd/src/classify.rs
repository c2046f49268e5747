//! Error classification for Argo CD API failures.
//!
//! A structured gRPC status code wins when the gateway returns one. Otherwise
//! the error text is matched against [`KNOWN_MESSAGES`]; anything unmatched is
//! `Other`, so a change in Argo CD's wording turns absence into a hard error
//! rather than the reverse.

use argonaut_core::ErrorKind;

use crate::error::{Code, RemoteError};

/// Substrings of Argo CD error messages and what they mean.
pub const KNOWN_MESSAGES: &[(&str, ErrorKind)] = &[
    ("code = NotFound desc = cluster", ErrorKind::NotFound),
    ("code = NotFound desc = repo", ErrorKind::NotFound),
    ("code = NotFound desc = project", ErrorKind::NotFound),
    ("code = PermissionDenied desc = permission denied", ErrorKind::PermissionDenied),
];

pub fn classify(err: &RemoteError) -> ErrorKind {
    match err {
        RemoteError::Status { code: Code::NotFound, .. } => ErrorKind::NotFound,
        RemoteError::Status { code: Code::PermissionDenied, .. } => ErrorKind::PermissionDenied,
        RemoteError::Http { status: 404, .. } => ErrorKind::NotFound,
        RemoteError::Http { status: 403, .. } => ErrorKind::PermissionDenied,
        // Unknown/Internal statuses often wrap an inner gRPC error in their text.
        other => classify_message(&other.to_string()),
    }
}

pub fn classify_message(message: &str) -> ErrorKind {
    KNOWN_MESSAGES
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::Other)
}

pub fn is_not_found(err: &RemoteError) -> bool {
    classify(err) == ErrorKind::NotFound
}
