//! Field-level comparison of set parameters against a remote object.

use serde::Serialize;

/// One parameter whose desired value differs from the remote one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub path: String,
    pub desired: String,
    pub observed: String,
}

impl std::fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: want {} have {}", self.path, self.desired, self.observed)
    }
}

/// Collects differences between the caller's set parameters and the remote object.
///
/// Unset parameters are skipped; they express no opinion. Remote-only state
/// and write-only secrets must not be fed in.
#[derive(Debug, Default, Clone)]
pub struct Comparison {
    diffs: Vec<FieldDiff>,
}

impl Comparison {
    pub fn new() -> Self { Self::default() }

    pub fn field<T>(&mut self, path: &str, desired: Option<&T>, observed: &T) -> &mut Self
    where
        T: PartialEq + Serialize,
    {
        if let Some(want) = desired {
            if want != observed {
                self.push(path, want, Some(observed));
            }
        }
        self
    }

    /// Compare against a remote field that may be missing; a set parameter
    /// with no remote counterpart is a difference.
    pub fn optional<T>(&mut self, path: &str, desired: Option<&T>, observed: Option<&T>) -> &mut Self
    where
        T: PartialEq + Serialize,
    {
        if let Some(want) = desired {
            if Some(want) != observed {
                self.push(path, want, observed);
            }
        }
        self
    }

    /// Record a difference that is not a plain field equality (e.g. a
    /// derived lifetime check).
    pub fn mismatch(&mut self, path: &str, desired: impl Into<String>, observed: impl Into<String>) -> &mut Self {
        self.diffs.push(FieldDiff { path: path.to_string(), desired: desired.into(), observed: observed.into() });
        self
    }

    pub fn is_up_to_date(&self) -> bool { self.diffs.is_empty() }

    pub fn diffs(&self) -> &[FieldDiff] { &self.diffs }

    pub fn into_diffs(self) -> Vec<FieldDiff> { self.diffs }

    fn push<T: Serialize>(&mut self, path: &str, want: &T, have: Option<&T>) {
        self.diffs.push(FieldDiff {
            path: path.to_string(),
            desired: render(want),
            observed: have.map(render).unwrap_or_else(|| "<unset>".to_string()),
        });
    }
}

fn render<T: Serialize>(v: &T) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "<unrenderable>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_never_differ() {
        let mut c = Comparison::new();
        c.field::<String>("name", None, &"remote".to_string())
            .optional::<bool>("insecure", None, None);
        assert!(c.is_up_to_date());
    }

    #[test]
    fn set_field_against_remote_silence_differs() {
        let mut c = Comparison::new();
        c.field("config.username", Some(&"testuser".to_string()), &String::new());
        assert!(!c.is_up_to_date());
        assert_eq!(c.diffs()[0].path, "config.username");
        assert_eq!(c.diffs()[0].desired, "\"testuser\"");
        assert_eq!(c.diffs()[0].observed, "\"\"");
    }

    #[test]
    fn optional_missing_remote_is_reported_as_unset() {
        let mut c = Comparison::new();
        c.optional("shard", Some(&2i64), None);
        let diffs = c.into_diffs();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].to_string(), "shard: want 2 have <unset>");
    }

    #[test]
    fn matching_fields_are_up_to_date() {
        let mut c = Comparison::new();
        c.field("server", Some(&"https://example.com/".to_string()), &"https://example.com/".to_string())
            .field("config.tlsClientConfig.insecure", Some(&true), &true)
            .field("namespaces", Some(&vec!["default".to_string()]), &vec!["default".to_string()]);
        assert!(c.is_up_to_date());
    }
}
