//! Late-initialization: fill parameters the caller left unset from the remote object.
//!
//! Only unset (`None`) parameters are touched, and only with non-empty remote
//! values. A remote zero value (`""`, `false`, `0`, empty list) is treated as
//! remote silence and never copied, so a second pass over the same inputs is a
//! no-op.

use std::collections::BTreeMap;

/// Zero-like values the remote API omits from its payloads.
pub trait IsEmpty {
    fn is_empty_value(&self) -> bool;
}

impl IsEmpty for String {
    fn is_empty_value(&self) -> bool { self.is_empty() }
}

impl IsEmpty for bool {
    fn is_empty_value(&self) -> bool { !*self }
}

impl IsEmpty for i64 {
    fn is_empty_value(&self) -> bool { *self == 0 }
}

impl IsEmpty for i32 {
    fn is_empty_value(&self) -> bool { *self == 0 }
}

impl<T> IsEmpty for Vec<T> {
    fn is_empty_value(&self) -> bool { self.is_empty() }
}

impl<K, V> IsEmpty for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool { self.is_empty() }
}

/// Accumulates late-initialization over a set of fields.
///
/// ```
/// use argonaut_core::LateInit;
///
/// let mut project: Option<String> = None;
/// let mut li = LateInit::new();
/// li.field(&mut project, &"default".to_string());
/// assert!(li.changed());
/// assert_eq!(project.as_deref(), Some("default"));
/// ```
#[derive(Debug, Default)]
pub struct LateInit {
    changed: bool,
}

impl LateInit {
    pub fn new() -> Self { Self::default() }

    /// Fill `desired` from `observed` when unset and `observed` is non-empty.
    pub fn field<T>(&mut self, desired: &mut Option<T>, observed: &T) -> &mut Self
    where
        T: IsEmpty + Clone,
    {
        if desired.is_none() && !observed.is_empty_value() {
            *desired = Some(observed.clone());
            self.changed = true;
        }
        self
    }

    /// Like [`LateInit::field`] for remote fields that may be absent entirely.
    pub fn optional<T>(&mut self, desired: &mut Option<T>, observed: Option<&T>) -> &mut Self
    where
        T: IsEmpty + Clone,
    {
        if let Some(obs) = observed {
            self.field(desired, obs);
        }
        self
    }

    /// Late-initialize a nested optional group.
    ///
    /// An unset group is only materialised when `fill` sets at least one inner field.
    pub fn group<T, F>(&mut self, desired: &mut Option<T>, fill: F) -> &mut Self
    where
        T: Default,
        F: FnOnce(&mut LateInit, &mut T),
    {
        let was_set = desired.is_some();
        let mut inner = desired.take().unwrap_or_default();
        let mut nested = LateInit::new();
        fill(&mut nested, &mut inner);
        if was_set || nested.changed {
            *desired = Some(inner);
        }
        self.changed |= nested.changed;
        self
    }

    pub fn changed(&self) -> bool { self.changed }
}
