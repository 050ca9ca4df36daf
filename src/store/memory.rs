use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
};

use geojson::{JsonObject, JsonValue};

use super::{
    AccessMode, Connection, FeatureId, SpatialStore, StoreError, StoreResult, StoredFeature,
    Transaction,
};

/// Where `MemoryStore` injects a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Every insert, update and delete fails.
    Write,
    /// Writes succeed but the commit fails.
    Commit,
    /// Another session deletes the row right before it is updated or deleted.
    ConcurrentDelete,
}

#[derive(Debug, Clone, Default)]
struct MemoryLayer {
    rows: BTreeMap<FeatureId, StoredFeature>,
    next_id: FeatureId,
}

/// Store keeping layers in memory, with transactions that stage a copy of all layers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    layers: RefCell<BTreeMap<String, MemoryLayer>>,
    fail_point: Cell<Option<FailPoint>>,
    open_connections: Cell<usize>,
}

impl MemoryStore {
    pub fn create_layer(&self, name: &str) {
        self.layers
            .borrow_mut()
            .insert(name.to_string(), MemoryLayer::default());
    }

    pub fn fail_at(&self, fail_point: Option<FailPoint>) {
        self.fail_point.set(fail_point);
    }

    /// Connections currently checked out and not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.open_connections.get()
    }
}

impl SpatialStore for MemoryStore {
    type Connection<'s> = MemoryConnection<'s> where Self: 's;

    fn connect(&self, mode: AccessMode) -> StoreResult<MemoryConnection<'_>> {
        self.open_connections.set(self.open_connections.get() + 1);
        Ok(MemoryConnection { store: self, mode })
    }
}

pub struct MemoryConnection<'s> {
    store: &'s MemoryStore,
    mode: AccessMode,
}

impl Drop for MemoryConnection<'_> {
    fn drop(&mut self) {
        let open_connections = self.store.open_connections.get();
        self.store.open_connections.set(open_connections - 1);
    }
}

impl<'s> Connection for MemoryConnection<'s> {
    type Transaction<'c> = MemoryTransaction<'c> where Self: 'c;

    fn read_layer(&mut self, layer_name: &str) -> StoreResult<Vec<StoredFeature>> {
        let layers = self.store.layers.borrow();
        let layer = layers
            .get(layer_name)
            .ok_or_else(|| StoreError::LayerNotFound(layer_name.to_string()))?;
        Ok(layer.rows.values().cloned().collect())
    }

    fn begin(&mut self) -> StoreResult<MemoryTransaction<'_>> {
        if self.mode == AccessMode::ReadOnly {
            return Err(StoreError::ReadOnly);
        }
        Ok(MemoryTransaction {
            store: self.store,
            staged: self.store.layers.borrow().clone(),
        })
    }
}

pub struct MemoryTransaction<'c> {
    store: &'c MemoryStore,
    staged: BTreeMap<String, MemoryLayer>,
}

impl MemoryTransaction<'_> {
    fn layer_mut(&mut self, layer_name: &str) -> StoreResult<&mut MemoryLayer> {
        if self.store.fail_point.get() == Some(FailPoint::Write) {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        self.staged
            .get_mut(layer_name)
            .ok_or_else(|| StoreError::LayerNotFound(layer_name.to_string()))
    }

    /// The layer with row `id` removed first if a concurrent delete is injected.
    fn layer_for_row(&mut self, layer_name: &str, id: FeatureId) -> StoreResult<&mut MemoryLayer> {
        let concurrent_delete = self.store.fail_point.get() == Some(FailPoint::ConcurrentDelete);
        let layer = self.layer_mut(layer_name)?;
        if concurrent_delete {
            layer.rows.remove(&id);
        }
        Ok(layer)
    }
}

fn set_attributes(attributes: &mut JsonObject, values: &[(&str, &str)]) {
    for (name, value) in values {
        attributes.insert(name.to_string(), JsonValue::from(*value));
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn insert_point(
        &mut self,
        layer_name: &str,
        location: geo::Point,
        attributes: &[(&str, &str)],
    ) -> StoreResult<StoredFeature> {
        let layer = self.layer_mut(layer_name)?;
        layer.next_id += 1;
        let mut stored = StoredFeature {
            id: layer.next_id,
            geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                location.x(),
                location.y(),
            ]))),
            attributes: JsonObject::new(),
        };
        set_attributes(&mut stored.attributes, attributes);
        layer.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn find_feature(
        &mut self,
        layer_name: &str,
        id: FeatureId,
    ) -> StoreResult<Option<StoredFeature>> {
        let layer = self
            .staged
            .get(layer_name)
            .ok_or_else(|| StoreError::LayerNotFound(layer_name.to_string()))?;
        Ok(layer.rows.get(&id).cloned())
    }

    fn update_attributes(
        &mut self,
        layer_name: &str,
        id: FeatureId,
        attributes: &[(&str, &str)],
    ) -> StoreResult<StoredFeature> {
        let layer = self.layer_for_row(layer_name, id)?;
        let stored = layer
            .rows
            .get_mut(&id)
            .ok_or(StoreError::FeatureNotFound(id))?;
        set_attributes(&mut stored.attributes, attributes);
        Ok(stored.clone())
    }

    fn delete_feature(&mut self, layer_name: &str, id: FeatureId) -> StoreResult<()> {
        let layer = self.layer_for_row(layer_name, id)?;
        layer
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::FeatureNotFound(id))
    }

    fn commit(self) -> StoreResult<()> {
        if self.store.fail_point.get() == Some(FailPoint::Commit) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        *self.store.layers.borrow_mut() = self.staged;
        Ok(())
    }

    fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}
