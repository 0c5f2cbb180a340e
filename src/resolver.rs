use crate::{
    environment::{Environment, Source},
    error::BindingError,
};
use serde::Deserialize;
use serde_json::value::RawValue;
use std::collections::HashMap;

/// Category label -> service descriptors, as found under the catalog key
type Catalog = HashMap<String, Option<Vec<Box<RawValue>>>>;

/// A missing or `null` name reads as the empty string
#[derive(Deserialize)]
struct ServiceName {
    #[serde(default)]
    name: Option<String>,
}

/// Build an [`Environment`] from a raw catalog payload
///
/// The payload is a JSON object whose `catalog_key` member maps category labels to
/// lists of service descriptors. Descriptors are indexed by their lower-cased
/// `name`; when two descriptors share a name, whichever is processed last wins.
/// A single malformed descriptor fails the whole payload.
pub fn resolve(data: &[u8], source: Source, catalog_key: &str) -> Result<Environment, BindingError> {
    let top: Option<HashMap<String, Box<RawValue>>> =
        serde_json::from_slice(data).map_err(BindingError::Parse)?;

    let catalog: Option<Catalog> = match top.as_ref().and_then(|t| t.get(catalog_key)) {
        Some(raw) => serde_json::from_str(raw.get()).map_err(BindingError::Parse)?,
        None => {
            tracing::debug!(key = catalog_key, "catalog key not present, no services bound");
            None
        }
    };

    let mut services_by_name = HashMap::new();
    for (category, services) in catalog.into_iter().flatten() {
        for service in services.into_iter().flatten() {
            let ServiceName { name } =
                serde_json::from_str(service.get()).map_err(BindingError::Parse)?;
            let name = name.unwrap_or_default();
            let key = name.to_lowercase();
            if services_by_name.insert(key, service).is_some() {
                tracing::debug!(
                    service = %name,
                    category = %category,
                    "duplicate service name, keeping the later entry"
                );
            }
        }
    }

    tracing::debug!(
        source = %source,
        services = services_by_name.len(),
        "resolved service catalog"
    );

    Ok(Environment::new(source, services_by_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_CATALOG_KEY;

    fn resolve_str(json: &str) -> Result<Environment, BindingError> {
        resolve(json.as_bytes(), Source::Raw, DEFAULT_CATALOG_KEY)
    }

    #[test]
    fn test_flattens_categories() {
        let env = resolve_str(
            r#"{"VCAP_SERVICES": {
                "xsuaa": [{"name": "portal-uaa"}, {"name": "Other-UAA"}],
                "hana": [{"name": "db", "credentials": {"host": "h"}}]
            }}"#,
        )
        .unwrap();

        assert_eq!(env.len(), 3);
        assert!(env.services_by_name().contains_key("portal-uaa"));
        assert!(env.services_by_name().contains_key("other-uaa"));
        assert!(env.services_by_name().contains_key("db"));
        assert_eq!(env.source(), Source::Raw);
    }

    #[test]
    fn test_keys_are_lowercased_on_insert() {
        let env = resolve_str(r#"{"VCAP_SERVICES": {"cat": [{"name": "Test"}]}}"#).unwrap();

        assert_eq!(env.names().collect::<Vec<_>>(), vec!["test"]);
        for query in ["test", "TEST", "Test"] {
            assert!(env.contains(query), "lookup of {query} failed");
        }
    }

    #[test]
    fn test_payload_is_kept_verbatim() {
        let env = resolve_str(r#"{"VCAP_SERVICES":{"cat":[{"name":"Test","tags":[1, 2]}]}}"#)
            .unwrap();

        let raw = env.services_by_name().get("test").unwrap();
        assert_eq!(raw.get(), r#"{"name":"Test","tags":[1, 2]}"#);

        let reparsed: serde_json::Value = serde_json::from_str(raw.get()).unwrap();
        assert_eq!(reparsed["name"], "Test");
    }

    #[test]
    fn test_duplicate_names_keep_one_entry() {
        // Which entry wins depends on category iteration order, so only the count is checked
        let env = resolve_str(
            r#"{"VCAP_SERVICES": {
                "a": [{"name": "Shared", "from": "a"}],
                "b": [{"name": "shared", "from": "b"}]
            }}"#,
        )
        .unwrap();

        assert_eq!(env.len(), 1);
        assert!(env.contains("SHARED"));
    }

    #[test]
    fn test_duplicate_within_category_later_wins() {
        let env = resolve_str(
            r#"{"VCAP_SERVICES": {"a": [{"name": "x", "n": 1}, {"name": "X", "n": 2}]}}"#,
        )
        .unwrap();

        let value: serde_json::Value = env.deserialize_service("x").unwrap();
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn test_missing_name_indexes_empty_string() {
        let env = resolve_str(r#"{"VCAP_SERVICES": {"a": [{"label": "nameless"}]}}"#).unwrap();

        assert!(env.services_by_name().contains_key(""));
    }

    #[test]
    fn test_null_name_indexes_empty_string() {
        let env =
            resolve_str(r#"{"VCAP_SERVICES": {"a": [{"name": null}, {"name": "ok"}]}}"#).unwrap();

        let mut names: Vec<_> = env.names().collect();
        names.sort();
        assert_eq!(names, vec!["", "ok"]);
    }

    #[test]
    fn test_missing_catalog_key_is_empty() {
        let env = resolve_str(r#"{"OTHER": {}}"#).unwrap();
        assert!(env.is_empty());

        let env = resolve_str(r#"{"VCAP_SERVICES": null}"#).unwrap();
        assert!(env.is_empty());

        let env = resolve_str(r#"{"VCAP_SERVICES": {"a": null}}"#).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn test_custom_catalog_key() {
        let env = resolve(
            br#"{"SERVICES": {"a": [{"name": "one"}]}}"#,
            Source::File,
            "SERVICES",
        )
        .unwrap();

        assert!(env.contains("one"));
        assert_eq!(env.source(), Source::File);
    }

    #[test]
    fn test_malformed_json_fails() {
        let err = resolve_str(r#"{"VCAP_SERVICES": {"#).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_wrong_catalog_shape_fails() {
        let err = resolve_str(r#"{"VCAP_SERVICES": [1, 2]}"#).unwrap_err();
        assert!(err.is_parse());

        let err = resolve_str(r#"[]"#).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_single_bad_descriptor_fails_whole_load() {
        let err = resolve_str(
            r#"{"VCAP_SERVICES": {"a": [{"name": "good"}, {"name": 42}]}}"#,
        )
        .unwrap_err();
        assert!(err.is_parse());

        let err = resolve_str(r#"{"VCAP_SERVICES": {"a": ["not-an-object"]}}"#).unwrap_err();
        assert!(err.is_parse());
    }
}
