use crate::{
    error::FeatureError,
    store::{AccessMode, Connection, SpatialStore},
};

use super::layer_name::LayerName;

/// Serves whole layers as GeoJSON feature collections. Only ever opens read-only connections.
pub struct LayerReader<'s, S> {
    store: &'s S,
}

impl<'s, S: SpatialStore> LayerReader<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn fetch(&self, layer: &LayerName) -> Result<geojson::FeatureCollection, FeatureError> {
        let mut connection = self.store.connect(AccessMode::ReadOnly)?;
        let features = connection.read_layer(layer.as_str())?;
        log::debug!("Read {} features from layer {}", features.len(), layer);
        Ok(features.into_iter().map(geojson::Feature::from).collect())
    }
}
