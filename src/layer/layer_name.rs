use std::{collections::HashSet, fmt};

use crate::error::FeatureError;

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a valid layer name")]
pub struct InvalidLayerName(pub String);

/// Name of a table that is safe to hand to the store: ASCII letters, digits and underscores,
/// not starting with a digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerName(String);

impl LayerName {
    pub fn parse(name: &str) -> Result<Self, InvalidLayerName> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };
        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(InvalidLayerName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allow-list of the layers exposed for reading.
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    layers: HashSet<LayerName>,
}

impl LayerCatalog {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, InvalidLayerName> {
        let layers = names
            .iter()
            .map(|name| LayerName::parse(name.as_ref()))
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self { layers })
    }

    /// Look up a requested layer. Anything outside the allow-list is reported as not found
    /// without touching the store.
    pub fn resolve(&self, requested: &str) -> Result<LayerName, FeatureError> {
        match LayerName::parse(requested) {
            Ok(name) if self.layers.contains(&name) => Ok(name),
            _ => {
                log::warn!("Rejected request for unknown layer {:?}", requested);
                Err(FeatureError::NotFound(format!(
                    "Layer '{}' not found",
                    requested
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{LayerCatalog, LayerName};
    use crate::error::FeatureError;

    #[rstest]
    #[case("business")]
    #[case("streets_2023")]
    #[case("_staging")]
    #[case("Buildings")]
    fn test_valid_layer_names(#[case] name: &str) {
        assert_eq!(name, LayerName::parse(name).unwrap().as_str());
    }

    #[rstest]
    #[case("")]
    #[case("2streets")]
    #[case("business; DROP TABLE business")]
    #[case("public.business")]
    #[case("stra\u{df}e")]
    #[case("streets--")]
    fn test_invalid_layer_names(#[case] name: &str) {
        assert!(LayerName::parse(name).is_err());
    }

    #[test]
    fn test_catalog_resolves_only_allowed_layers() {
        let catalog = LayerCatalog::new(&["streets", "business"]).unwrap();
        assert_eq!("streets", catalog.resolve("streets").unwrap().as_str());
        assert!(matches!(
            catalog.resolve("buildings"),
            Err(FeatureError::NotFound(_))
        ));
        assert!(matches!(
            catalog.resolve("pg_catalog.pg_user"),
            Err(FeatureError::NotFound(_))
        ));
    }

    #[test]
    fn test_catalog_rejects_invalid_configuration() {
        let err = LayerCatalog::new(&["streets", "bad name"]).unwrap_err();
        assert_eq!("bad name", err.0);
    }
}
