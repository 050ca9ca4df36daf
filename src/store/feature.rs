use geojson::{feature::Id, JsonObject};

/// Identifier assigned by the store to every row of a layer.
pub type FeatureId = u64;

/// A row read back from a spatial store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeature {
    pub id: FeatureId,
    /// `None` when the geometry column of the row is NULL.
    pub geometry: Option<geojson::Geometry>,
    /// All non-geometry columns, keyed by column name.
    pub attributes: JsonObject,
}

impl From<StoredFeature> for geojson::Feature {
    fn from(value: StoredFeature) -> Self {
        Self {
            bbox: None,
            geometry: value.geometry,
            id: Some(Id::Number(value.id.into())),
            properties: Some(value.attributes),
            foreign_members: None,
        }
    }
}
