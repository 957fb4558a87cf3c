//! Reading registry snapshots produced by the registry parser.

use vk_capgraph::registry::Registry;

/// Parses a registry snapshot from JSON.
///
/// # Errors
///
/// Returns an error if the text is not a registry snapshot.
#[inline]
pub fn registry_from_json(text: &str) -> Result<Registry, LoadError> {
    let registry: Registry = serde_json::from_str(text).map_err(LoadError::Json)?;
    log::debug!(
        "loaded registry snapshot{}: {} entities, {} records, {} capabilities, {} SPIR-V extensions",
        registry
            .header_version
            .map_or_else(String::new, |version| format!(" (header version {version})")),
        registry.entities.len(),
        registry.records.len(),
        registry.capabilities.len(),
        registry.spirv_extensions.len()
    );
    Ok(registry)
}

/// Parses a registry snapshot from TOML.
///
/// # Errors
///
/// Returns an error if the text is not a registry snapshot.
#[inline]
pub fn registry_from_toml(text: &str) -> Result<Registry, LoadError> {
    let registry: Registry = toml::from_str(text)?;
    log::debug!(
        "loaded registry snapshot: {} entities, {} records",
        registry.entities.len(),
        registry.records.len()
    );
    Ok(registry)
}

/// An error indicating that a registry snapshot could not be read.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The JSON text is not a registry snapshot.
    #[error("invalid JSON registry snapshot: {0}")]
    Json(#[source] serde_json::Error),
    /// The TOML text is not a registry snapshot.
    #[error("invalid TOML registry snapshot: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn reads_both_formats() {
        let json = r#"{
            "extensions": [{ "name": "VK_KHR_maintenance3", "number": 169, "promotedto": "VK_VERSION_1_1" }],
            "constants": { "VK_SUBGROUP_FEATURE_BASIC_BIT": 1 }
        }"#;
        let toml = r#"
            [[extensions]]
            name = "VK_KHR_maintenance3"
            number = 169
            promotedto = "VK_VERSION_1_1"

            [constants]
            VK_SUBGROUP_FEATURE_BASIC_BIT = 1
        "#;
        let from_json = registry_from_json(json).unwrap();
        let from_toml = registry_from_toml(toml).unwrap();
        assert_eq!(from_json, from_toml);
        assert_eq!(from_json.entities.len(), 1);
    }

    #[test_log::test]
    fn rejects_other_shapes() {
        assert!(matches!(
            registry_from_json(r#"{ "extensions": 3 }"#),
            Err(LoadError::Json(_))
        ));
        assert!(matches!(
            registry_from_toml("extensions = 3"),
            Err(LoadError::Toml(_))
        ));
    }
}
