//! Patches applied to managed resources.
//!
//! Metadata and spec use JSON merge patches; status goes through server-side
//! apply so each write fully replaces what the manager owns.

use std::fmt::Debug;

use argonaut_apis::{Condition, EXTERNAL_NAME_ANNOTATION};
use kube::api::{Api, Patch, PatchParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const FIELD_MANAGER: &str = "argonaut";

pub fn external_name_patch(external_name: &str) -> Value {
    let mut annotations = Map::new();
    annotations.insert(EXTERNAL_NAME_ANNOTATION.to_string(), Value::String(external_name.to_string()));
    json!({ "metadata": { "annotations": annotations } })
}

pub fn for_provider_patch<P: Serialize>(params: &P) -> Result<Value, serde_json::Error> {
    Ok(json!({ "spec": { "forProvider": serde_json::to_value(params)? } }))
}

/// Status body for server-side apply of `K`.
pub fn status_patch<K, O>(at_provider: Option<&O>, conditions: &[Condition]) -> Result<Value, serde_json::Error>
where
    K: Resource<DynamicType = ()>,
    O: Serialize,
{
    let mut status = Map::new();
    if let Some(obs) = at_provider {
        status.insert("atProvider".into(), serde_json::to_value(obs)?);
    }
    status.insert("conditions".into(), serde_json::to_value(conditions)?);
    Ok(json!({
        "apiVersion": K::api_version(&()),
        "kind": K::kind(&()),
        "status": status,
    }))
}

/// Merge patch replacing the finalizer list.
pub fn finalizers_patch(finalizers: &[String]) -> Value {
    json!({ "metadata": { "finalizers": finalizers } })
}

pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta().finalizers.as_ref().is_some_and(|f| f.iter().any(|s| s == finalizer))
}

/// Add `finalizer` unless present; returns whether a patch was sent.
pub async fn add_finalizer<K>(api: &Api<K>, obj: &K, finalizer: &str) -> Result<bool, kube::Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    if has_finalizer(obj, finalizer) {
        return Ok(false);
    }
    let mut finalizers = obj.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    let name = obj.meta().name.clone().unwrap_or_default();
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&finalizers_patch(&finalizers))).await?;
    Ok(true)
}

pub async fn remove_finalizer<K>(api: &Api<K>, obj: &K, finalizer: &str) -> Result<(), kube::Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let finalizers: Vec<String> = obj
        .meta()
        .finalizers
        .as_ref()
        .map(|f| f.iter().filter(|s| *s != finalizer).cloned().collect())
        .unwrap_or_default();
    let name = obj.meta().name.clone().unwrap_or_default();
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&finalizers_patch(&finalizers))).await?;
    Ok(())
}

pub async fn annotate_external_name<K>(api: &Api<K>, name: &str, external_name: &str) -> Result<K, kube::Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.patch(name, &PatchParams::default(), &Patch::Merge(&external_name_patch(external_name))).await
}

/// Persist late-initialized parameters.
pub async fn patch_for_provider<K, P>(api: &Api<K>, name: &str, params: &P) -> Result<K, kube::Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
    P: Serialize,
{
    let body = for_provider_patch(params).map_err(kube::Error::SerdeError)?;
    api.patch(name, &PatchParams::default(), &Patch::Merge(&body)).await
}

pub async fn apply_status<K>(api: &Api<K>, name: &str, body: &Value) -> Result<K, kube::Error>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use argonaut_apis::{ClusterObservation, NamespacedRepository};

    #[test]
    fn external_name_lands_in_annotations() {
        let p = external_name_patch("https://example.com/");
        assert_eq!(p["metadata"]["annotations"][EXTERNAL_NAME_ANNOTATION], "https://example.com/");
    }

    #[test]
    fn finalizer_presence() {
        use argonaut_apis::{DeletionPolicy, RepositoryParameters, NamespacedRepositorySpec, FINALIZER};
        let mut r = NamespacedRepository::new("charts", NamespacedRepositorySpec {
            for_provider: RepositoryParameters::default(),
            deletion_policy: DeletionPolicy::Delete,
            write_connection_secret_to_ref: None,
        });
        assert!(!has_finalizer(&r, FINALIZER));
        r.metadata.finalizers = Some(vec!["other".into(), FINALIZER.into()]);
        assert!(has_finalizer(&r, FINALIZER));
        assert_eq!(finalizers_patch(&["other".to_string()])["metadata"]["finalizers"][0], "other");
    }

    #[test]
    fn for_provider_patch_nests_under_spec() {
        let p = for_provider_patch(&json!({ "namespaces": ["default"] })).unwrap();
        assert_eq!(p, json!({ "spec": { "forProvider": { "namespaces": ["default"] } } }));
    }

    #[test]
    fn status_patch_is_typed_for_apply() {
        let obs = ClusterObservation { server_version: "1.29".into(), ..Default::default() };
        let body = status_patch::<NamespacedRepository, _>(Some(&obs), &[Condition::available()]).unwrap();
        assert_eq!(body["apiVersion"], "argocd.m.argonaut.io/v1alpha1");
        assert_eq!(body["kind"], "Repository");
        assert_eq!(body["status"]["atProvider"]["serverVersion"], "1.29");
        assert_eq!(body["status"]["conditions"][0]["type"], "Ready");
    }

    #[test]
    fn status_patch_without_observation_omits_it() {
        let body = status_patch::<NamespacedRepository, ClusterObservation>(None, &[]).unwrap();
        assert!(body["status"].get("atProvider").is_none());
    }
}
