//! Explicit registry of the managed kinds and their CRDs.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

use crate::{
    Cluster, NamespacedCluster, NamespacedProjectToken, NamespacedRepository, ProjectToken, Repository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagedKind {
    Cluster,
    Repository,
    ProjectToken,
}

impl ManagedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "Cluster",
            Self::Repository => "Repository",
            Self::ProjectToken => "ProjectToken",
        }
    }
}

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManagedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cluster" | "clusters" => Ok(Self::Cluster),
            "repository" | "repositories" | "repo" => Ok(Self::Repository),
            "projecttoken" | "projecttokens" | "token" => Ok(Self::ProjectToken),
            other => Err(format!("unknown kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Cluster,
    Namespaced,
}

/// One registered resource: a kind in one scope.
#[derive(Clone)]
pub struct KindEntry {
    pub kind: ManagedKind,
    pub scope: Scope,
    pub group: &'static str,
    crd: fn() -> CustomResourceDefinition,
}

impl KindEntry {
    pub fn new<K: CustomResourceExt>(kind: ManagedKind, scope: Scope, group: &'static str) -> Self {
        Self { kind, scope, group, crd: K::crd }
    }

    pub fn crd(&self) -> CustomResourceDefinition { (self.crd)() }
}

impl fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindEntry")
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("group", &self.group)
            .finish()
    }
}

/// Resources served by a manager. Built explicitly and handed to the
/// manager; nothing registers itself globally.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    entries: Vec<KindEntry>,
}

impl KindRegistry {
    pub fn new() -> Self { Self::default() }

    /// Every kind in both scopes.
    pub fn standard() -> Self {
        use crate::{CLUSTER_GROUP as C, NAMESPACED_GROUP as N};
        let mut r = Self::new();
        r.register(KindEntry::new::<Cluster>(ManagedKind::Cluster, Scope::Cluster, C))
            .register(KindEntry::new::<NamespacedCluster>(ManagedKind::Cluster, Scope::Namespaced, N))
            .register(KindEntry::new::<Repository>(ManagedKind::Repository, Scope::Cluster, C))
            .register(KindEntry::new::<NamespacedRepository>(ManagedKind::Repository, Scope::Namespaced, N))
            .register(KindEntry::new::<ProjectToken>(ManagedKind::ProjectToken, Scope::Cluster, C))
            .register(KindEntry::new::<NamespacedProjectToken>(ManagedKind::ProjectToken, Scope::Namespaced, N));
        r
    }

    /// Add an entry; a repeated (kind, scope) pair replaces the earlier one.
    pub fn register(&mut self, entry: KindEntry) -> &mut Self {
        self.entries.retain(|e| !(e.kind == entry.kind && e.scope == entry.scope));
        self.entries.push(entry);
        self
    }

    /// Keep only the listed kinds; an empty list keeps everything.
    pub fn retain_kinds(&mut self, kinds: &[ManagedKind]) -> &mut Self {
        if !kinds.is_empty() {
            self.entries.retain(|e| kinds.contains(&e.kind));
        }
        self
    }

    pub fn entries(&self) -> &[KindEntry] { &self.entries }

    pub fn contains(&self, kind: ManagedKind, scope: Scope) -> bool {
        self.entries.iter().any(|e| e.kind == kind && e.scope == scope)
    }

    pub fn crds(&self) -> Vec<CustomResourceDefinition> {
        self.entries.iter().map(KindEntry::crd).collect()
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_every_kind_in_both_scopes() {
        let r = KindRegistry::standard();
        assert_eq!(r.len(), 6);
        for kind in [ManagedKind::Cluster, ManagedKind::Repository, ManagedKind::ProjectToken] {
            assert!(r.contains(kind, Scope::Cluster));
            assert!(r.contains(kind, Scope::Namespaced));
        }
    }

    #[test]
    fn register_replaces_same_kind_and_scope() {
        let mut r = KindRegistry::standard();
        r.register(KindEntry::new::<Cluster>(ManagedKind::Cluster, Scope::Cluster, crate::CLUSTER_GROUP));
        assert_eq!(r.len(), 6);
    }

    #[test]
    fn retain_kinds_filters() {
        let mut r = KindRegistry::standard();
        r.retain_kinds(&[ManagedKind::ProjectToken]);
        assert_eq!(r.len(), 2);
        r.retain_kinds(&[]);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn kind_names_parse() {
        assert_eq!("clusters".parse::<ManagedKind>(), Ok(ManagedKind::Cluster));
        assert_eq!("ProjectToken".parse::<ManagedKind>(), Ok(ManagedKind::ProjectToken));
        assert!("application".parse::<ManagedKind>().is_err());
    }
}
