use geojson::{feature::Id, JsonObject, JsonValue};

use crate::{
    error::FeatureError,
    layer::layer_name::LayerName,
    store::{
        AccessMode, Connection, FeatureId, SpatialStore, StoreError, StoredFeature, Transaction,
    },
};

use super::input::{BusinessUpdate, NewBusiness, NAME, TYPE};

/// Creates, updates and deletes businesses. Every call runs in its own connection and
/// transaction, which is committed only if the whole operation succeeded.
pub struct FeatureWriter<'s, S> {
    store: &'s S,
    table: &'s LayerName,
}

impl<'s, S: SpatialStore> FeatureWriter<'s, S> {
    pub fn new(store: &'s S, table: &'s LayerName) -> Self {
        Self { store, table }
    }

    pub fn create(&self, body: &JsonValue) -> Result<geojson::Feature, FeatureError> {
        let business = NewBusiness::from_json(body)?;
        let mut connection = self.store.connect(AccessMode::ReadWrite)?;
        let stored = finish(connection.begin()?, |transaction| {
            Ok(transaction.insert_point(
                self.table.as_str(),
                business.location,
                &business.attributes(),
            )?)
        })?;
        log::info!("Created business {} ({})", stored.id, business.name);
        Ok(business_feature(stored))
    }

    /// Overwrite name and type. The location is kept.
    pub fn update(&self, id: FeatureId, body: &JsonValue) -> Result<geojson::Feature, FeatureError> {
        let update = BusinessUpdate::from_json(body)?;
        let mut connection = self.store.connect(AccessMode::ReadWrite)?;
        let stored = finish(connection.begin()?, |transaction| {
            self.find_existing(transaction, id)?;
            transaction
                .update_attributes(self.table.as_str(), id, &update.attributes())
                .map_err(missing_business)
        })?;
        log::info!("Updated business {}", id);
        Ok(business_feature(stored))
    }

    pub fn delete(&self, id: FeatureId) -> Result<(), FeatureError> {
        let mut connection = self.store.connect(AccessMode::ReadWrite)?;
        finish(connection.begin()?, |transaction| {
            self.find_existing(transaction, id)?;
            transaction
                .delete_feature(self.table.as_str(), id)
                .map_err(missing_business)
        })?;
        log::info!("Deleted business {}", id);
        Ok(())
    }

    fn find_existing<X: Transaction>(
        &self,
        transaction: &mut X,
        id: FeatureId,
    ) -> Result<StoredFeature, FeatureError> {
        transaction
            .find_feature(self.table.as_str(), id)?
            .ok_or_else(business_not_found)
    }
}

fn business_not_found() -> FeatureError {
    FeatureError::NotFound("Business not found".to_string())
}

/// A row that disappears between the existence check and the write was deleted by another
/// session.
fn missing_business(err: StoreError) -> FeatureError {
    match err {
        StoreError::FeatureNotFound(_) => business_not_found(),
        err => err.into(),
    }
}

/// Run `operation` inside `transaction`, then commit. On failure the transaction is rolled back
/// and the error of `operation` is returned, even if the rollback fails as well.
fn finish<X: Transaction, T>(
    mut transaction: X,
    operation: impl FnOnce(&mut X) -> Result<T, FeatureError>,
) -> Result<T, FeatureError> {
    match operation(&mut transaction) {
        Ok(value) => {
            transaction.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = transaction.rollback() {
                log::warn!("Rollback failed after \"{}\": {}", err, rollback_err);
            }
            Err(err)
        }
    }
}

/// The public view of a business: `{id, name, type}` plus its point.
fn business_feature(stored: StoredFeature) -> geojson::Feature {
    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), JsonValue::from(stored.id));
    for key in [NAME, TYPE] {
        let value = stored.attributes.get(key).cloned().unwrap_or(JsonValue::Null);
        properties.insert(key.to_string(), value);
    }
    geojson::Feature {
        bbox: None,
        geometry: stored.geometry,
        id: Some(Id::Number(stored.id.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}
