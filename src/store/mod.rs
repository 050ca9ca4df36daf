pub mod error;
pub mod feature;
pub mod gdal_store;
#[cfg(test)]
pub mod memory;
#[cfg(test)]
pub mod testing;

pub use error::{StoreError, StoreResult};
pub use feature::{FeatureId, StoredFeature};

/// Whether a connection is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// A database holding layers with geometry columns.
///
/// Connections are scoped: a connection is released when the value returned by `connect` is
/// dropped, whichever way the caller exits.
pub trait SpatialStore {
    type Connection<'s>: Connection
    where
        Self: 's;

    fn connect(&self, mode: AccessMode) -> StoreResult<Self::Connection<'_>>;
}

pub trait Connection {
    type Transaction<'c>: Transaction
    where
        Self: 'c;

    /// Read every row of `layer`, converting its geometry to GeoJSON.
    fn read_layer(&mut self, layer: &str) -> StoreResult<Vec<StoredFeature>>;

    /// Start a transaction. Dropping it without calling `commit` rolls it back.
    fn begin(&mut self) -> StoreResult<Self::Transaction<'_>>;
}

/// Writes against a single layer, applied atomically on `commit`.
pub trait Transaction {
    /// Insert a point tagged with EPSG:4326 and return the stored row.
    fn insert_point(
        &mut self,
        layer: &str,
        location: geo::Point,
        attributes: &[(&str, &str)],
    ) -> StoreResult<StoredFeature>;

    fn find_feature(&mut self, layer: &str, id: FeatureId) -> StoreResult<Option<StoredFeature>>;

    /// Overwrite the given string attributes of an existing row. The geometry is left untouched.
    fn update_attributes(
        &mut self,
        layer: &str,
        id: FeatureId,
        attributes: &[(&str, &str)],
    ) -> StoreResult<StoredFeature>;

    fn delete_feature(&mut self, layer: &str, id: FeatureId) -> StoreResult<()>;

    fn commit(self) -> StoreResult<()>;

    fn rollback(self) -> StoreResult<()>;
}
