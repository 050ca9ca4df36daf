use std::{
    collections::HashSet,
    ffi::{c_char, c_void, CStr},
};

use gdal::vector::{Feature, FieldValue, Layer, LayerAccess};
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use gdal_sys::{OGRErr, OGRFieldSubType};
use geojson::{JsonObject, JsonValue};

use crate::{
    config::Datasource,
    crs::crs_utils::{epsg_4326, epsg_code_to_authority_string, WGS84},
};

use super::{
    AccessMode, Connection, FeatureId, SpatialStore, StoreError, StoreResult, StoredFeature,
    Transaction,
};

/// Spatial store over any OGR vector datasource, e.g. a PostGIS database or a GeoPackage file.
///
/// Holds only the connection string. Every `connect` opens a fresh dataset, which GDAL closes
/// when the connection is dropped.
#[derive(Debug, Clone)]
pub struct GdalStore {
    connection_string: String,
    description: String,
}

impl GdalStore {
    pub fn new(datasource: &Datasource) -> Self {
        Self {
            connection_string: datasource.connection_string(),
            description: datasource.describe(),
        }
    }
}

impl SpatialStore for GdalStore {
    type Connection<'s> = GdalConnection where Self: 's;

    fn connect(&self, mode: AccessMode) -> StoreResult<GdalConnection> {
        gdal::DriverManager::register_all();
        let mut open_options = DatasetOptions::default();
        open_options.open_flags = match mode {
            AccessMode::ReadOnly => GdalOpenFlags::GDAL_OF_VECTOR,
            AccessMode::ReadWrite => GdalOpenFlags::GDAL_OF_VECTOR | GdalOpenFlags::GDAL_OF_UPDATE,
        };
        let dataset = Dataset::open_ex(&self.connection_string, open_options)?;
        log::debug!("Opened {} ({:?})", self.description, mode);
        Ok(GdalConnection { dataset, mode })
    }
}

pub struct GdalConnection {
    dataset: Dataset,
    mode: AccessMode,
}

impl Connection for GdalConnection {
    type Transaction<'c> = GdalTransaction<'c> where Self: 'c;

    fn read_layer(&mut self, layer_name: &str) -> StoreResult<Vec<StoredFeature>> {
        let mut layer = open_layer(&mut self.dataset, layer_name)?;
        let schema = LayerSchema::of(&layer);
        let features: StoreResult<Vec<StoredFeature>> = layer
            .features()
            .map(|feature| schema.stored_feature(&feature))
            .collect();
        features
    }

    fn begin(&mut self) -> StoreResult<GdalTransaction<'_>> {
        if self.mode == AccessMode::ReadOnly {
            return Err(StoreError::ReadOnly);
        }
        let transaction = self.dataset.start_transaction()?;
        Ok(GdalTransaction { transaction })
    }
}

/// A GDAL dataset transaction. GDAL rolls it back if it is dropped uncommitted.
pub struct GdalTransaction<'c> {
    transaction: gdal::Transaction<'c>,
}

impl<'c> Transaction for GdalTransaction<'c> {
    fn insert_point(
        &mut self,
        layer_name: &str,
        location: geo::Point,
        attributes: &[(&str, &str)],
    ) -> StoreResult<StoredFeature> {
        let layer = open_layer(&mut self.transaction, layer_name)?;
        let geometry = point_to_gdal(location)?;

        let id = with_driver_message(|| {
            let mut feature = Feature::new(layer.defn())?;
            feature.set_geometry(geometry)?;
            for (name, value) in attributes {
                feature.set_field_string(name, value)?;
            }
            feature.create(&layer)?;
            feature
                .fid()
                .ok_or_else(|| StoreError::Backend("Store did not assign a feature id".to_string()))
        })?;
        log::debug!(
            "Inserted feature {} into {} as {}",
            id,
            layer_name,
            epsg_code_to_authority_string(WGS84)
        );
        read_feature(&layer, id)?.ok_or_else(|| {
            StoreError::Backend(format!("Feature {} vanished after insert", id))
        })
    }

    fn find_feature(
        &mut self,
        layer_name: &str,
        id: FeatureId,
    ) -> StoreResult<Option<StoredFeature>> {
        let layer = open_layer(&mut self.transaction, layer_name)?;
        read_feature(&layer, id)
    }

    fn update_attributes(
        &mut self,
        layer_name: &str,
        id: FeatureId,
        attributes: &[(&str, &str)],
    ) -> StoreResult<StoredFeature> {
        let layer = open_layer(&mut self.transaction, layer_name)?;
        let mut feature = layer.feature(id).ok_or(StoreError::FeatureNotFound(id))?;
        with_driver_message(|| {
            for (name, value) in attributes {
                feature.set_field_string(name, value)?;
            }
            let code = unsafe { gdal_sys::OGR_L_SetFeature(layer.c_layer(), feature.c_feature()) };
            check_feature_write(code, "OGR_L_SetFeature", id)
        })?;
        read_feature(&layer, id)?.ok_or(StoreError::FeatureNotFound(id))
    }

    fn delete_feature(&mut self, layer_name: &str, id: FeatureId) -> StoreResult<()> {
        let layer = open_layer(&mut self.transaction, layer_name)?;
        let fid = gdal_sys::GIntBig::try_from(id).map_err(|_| StoreError::FeatureNotFound(id))?;
        with_driver_message(|| {
            let code = unsafe { gdal_sys::OGR_L_DeleteFeature(layer.c_layer(), fid) };
            check_feature_write(code, "OGR_L_DeleteFeature", id)
        })
    }

    fn commit(self) -> StoreResult<()> {
        with_driver_message(|| Ok(self.transaction.commit()?))
    }

    fn rollback(self) -> StoreResult<()> {
        with_driver_message(|| Ok(self.transaction.rollback()?))
    }
}

/// Open a layer that has at least one geometry column.
fn open_layer<'d>(dataset: &'d mut Dataset, layer_name: &str) -> StoreResult<Layer<'d>> {
    let layer = dataset
        .layer_by_name(layer_name)
        .map_err(|_| StoreError::LayerNotFound(layer_name.to_string()))?;
    let geometry_field_count =
        unsafe { gdal_sys::OGR_FD_GetGeomFieldCount(gdal_sys::OGR_L_GetLayerDefn(layer.c_layer())) };
    if geometry_field_count == 0 {
        return Err(StoreError::NoGeometryColumn(layer_name.to_string()));
    }
    Ok(layer)
}

fn read_feature(layer: &Layer, id: FeatureId) -> StoreResult<Option<StoredFeature>> {
    let schema = LayerSchema::of(layer);
    layer
        .feature(id)
        .map(|feature| schema.stored_feature(&feature))
        .transpose()
}

fn point_to_gdal(location: geo::Point) -> StoreResult<gdal::vector::Geometry> {
    let wkb = wkb::geom_to_wkb(&geo::Geometry::Point(location))
        .map_err(|err| StoreError::Geometry(format!("Could not write point to WKB, {:?}", err)))?;
    let mut geometry = gdal::vector::Geometry::from_wkb(&wkb)?;
    geometry.set_spatial_ref(epsg_4326()?);
    Ok(geometry)
}

/// Result of a write to row `id`. A row deleted by another session in the meantime is not
/// found rather than a failure.
fn check_feature_write(code: OGRErr::Type, method: &'static str, id: FeatureId) -> StoreResult<()> {
    match code {
        OGRErr::OGRERR_NONE => Ok(()),
        OGRErr::NON_EXISTING_FEATURE => Err(StoreError::FeatureNotFound(id)),
        code => Err(StoreError::Ogr { method, code }),
    }
}

/// Run GDAL calls and attach the last message the driver reported to a failure, so that e.g. a
/// constraint violation reaches the caller in the database's own words.
fn with_driver_message<T>(call: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
    unsafe { gdal_sys::CPLErrorReset() };
    call().map_err(|err| {
        if !matches!(err, StoreError::Gdal(_) | StoreError::Ogr { .. }) {
            return err;
        }
        match unsafe { c_str_to_string(gdal_sys::CPLGetLastErrorMsg()) } {
            Some(message) if !message.is_empty() => StoreError::Driver {
                message,
                source: Box::new(err),
            },
            _ => err,
        }
    })
}

/// The parts of a layer definition the safe GDAL API does not expose.
struct LayerSchema {
    /// Name of the column backing the feature id, e.g. `ogc_fid` for tables imported with
    /// ogr2ogr. `None` when the driver has no such column.
    fid_column: Option<String>,
    /// Integer fields flagged with the boolean subtype.
    boolean_fields: HashSet<String>,
}

impl LayerSchema {
    fn of(layer: &Layer) -> Self {
        unsafe {
            let c_layer = layer.c_layer();
            let fid_column =
                c_str_to_string(gdal_sys::OGR_L_GetFIDColumn(c_layer)).filter(|name| !name.is_empty());
            let c_defn = gdal_sys::OGR_L_GetLayerDefn(c_layer);
            let boolean_fields = (0..gdal_sys::OGR_FD_GetFieldCount(c_defn))
                .map(|index| gdal_sys::OGR_FD_GetFieldDefn(c_defn, index))
                .filter(|c_field| {
                    gdal_sys::OGR_Fld_GetSubType(*c_field) == OGRFieldSubType::OFSTBoolean
                })
                .filter_map(|c_field| c_str_to_string(gdal_sys::OGR_Fld_GetNameRef(c_field)))
                .collect();
            Self {
                fid_column,
                boolean_fields,
            }
        }
    }

    fn stored_feature(&self, feature: &Feature) -> StoreResult<StoredFeature> {
        let id = feature
            .fid()
            .ok_or_else(|| StoreError::Backend("Feature without id".to_string()))?;
        let mut attributes = JsonObject::new();
        if let Some(fid_column) = &self.fid_column {
            attributes.insert(fid_column.clone(), JsonValue::from(id));
        }
        for (name, value) in feature.fields() {
            let value = match value {
                Some(FieldValue::IntegerValue(value)) if self.boolean_fields.contains(&name) => {
                    JsonValue::Bool(value != 0)
                }
                Some(value) => field_value_to_json(value),
                None => JsonValue::Null,
            };
            attributes.insert(name, value);
        }
        Ok(StoredFeature {
            id,
            geometry: geometry_to_geojson(feature)?,
            attributes,
        })
    }
}

fn field_value_to_json(value: FieldValue) -> JsonValue {
    match value {
        FieldValue::IntegerValue(value) => value.into(),
        FieldValue::Integer64Value(value) => value.into(),
        FieldValue::RealValue(value) => value.into(),
        FieldValue::StringValue(value) => value.into(),
        FieldValue::IntegerListValue(values) => values.into(),
        FieldValue::Integer64ListValue(values) => values.into(),
        FieldValue::RealListValue(values) => values.into(),
        FieldValue::StringListValue(values) => values.into(),
        FieldValue::DateValue(date) => date.format("%Y-%m-%d").to_string().into(),
        FieldValue::DateTimeValue(datetime) => datetime.to_rfc3339().into(),
    }
}

/// Let OGR serialize the geometry of a feature to GeoJSON. A NULL geometry yields `None`.
fn geometry_to_geojson(feature: &Feature) -> StoreResult<Option<geojson::Geometry>> {
    let json = unsafe {
        let c_geometry = gdal_sys::OGR_F_GetGeometryRef(feature.c_feature());
        if c_geometry.is_null() {
            return Ok(None);
        }
        let c_json = gdal_sys::OGR_G_ExportToJson(c_geometry);
        if c_json.is_null() {
            return Err(StoreError::Geometry(
                "OGR could not export the geometry to GeoJSON".to_string(),
            ));
        }
        let json = c_str_to_string(c_json);
        gdal_sys::VSIFree(c_json as *mut c_void);
        json
    };
    match json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Copy a string owned by GDAL.
unsafe fn c_str_to_string(c_string: *const c_char) -> Option<String> {
    if c_string.is_null() {
        None
    } else {
        Some(CStr::from_ptr(c_string).to_string_lossy().into_owned())
    }
}
