use std::sync::atomic::{AtomicUsize, Ordering};

use gdal::vector::{FieldValue, LayerAccess, OGRFieldType};
use testdir::testdir;

use crate::config::Datasource;

use super::{
    gdal_store::GdalStore, memory::MemoryStore, AccessMode, Connection, SpatialStore,
    Transaction,
};

pub const BUSINESS_LAYER: &str = "business";
pub const EMPTY_LAYER: &str = "empty_layer";

/// A business as (name, type, lng, lat).
pub type BusinessRow<'a> = (&'a str, &'a str, f64, f64);

/// Generic suites share test names, so every GeoPackage fixture gets its own file.
static GEOPACKAGE_FIXTURES: AtomicUsize = AtomicUsize::new(0);

/// Stores the generic test suites run against.
pub trait StoreFixture: SpatialStore + Sized {
    /// A store with a `business` point layer holding `businesses` and an empty point layer.
    fn with_businesses(businesses: &[BusinessRow]) -> Self;
}

impl StoreFixture for MemoryStore {
    fn with_businesses(businesses: &[BusinessRow]) -> Self {
        let store = MemoryStore::default();
        store.create_layer(BUSINESS_LAYER);
        store.create_layer(EMPTY_LAYER);
        {
            let mut connection = store.connect(AccessMode::ReadWrite).unwrap();
            let mut transaction = connection.begin().unwrap();
            for (name, kind, lng, lat) in businesses {
                transaction
                    .insert_point(
                        BUSINESS_LAYER,
                        geo::Point::new(*lng, *lat),
                        &[("name", *name), ("type", *kind)],
                    )
                    .unwrap();
            }
            transaction.commit().unwrap();
        }
        store
    }
}

impl StoreFixture for GdalStore {
    fn with_businesses(businesses: &[BusinessRow]) -> Self {
        let fixture_index = GEOPACKAGE_FIXTURES.fetch_add(1, Ordering::SeqCst);
        let filepath = testdir!().join(format!("layers_{}.gpkg", fixture_index));
        {
            let driver = gdal::DriverManager::get_driver_by_name("GPKG").unwrap();
            let mut dataset = driver.create_vector_only(&filepath).unwrap();
            let crs = crate::crs::crs_utils::epsg_4326().unwrap();
            for layer_name in [BUSINESS_LAYER, EMPTY_LAYER] {
                let mut layer = dataset
                    .create_layer(gdal::LayerOptions {
                        name: layer_name,
                        srs: Some(&crs),
                        ty: gdal::vector::OGRwkbGeometryType::wkbPoint,
                        options: None,
                    })
                    .unwrap();
                layer
                    .create_defn_fields(&[
                        ("name", OGRFieldType::OFTString),
                        ("type", OGRFieldType::OFTString),
                    ])
                    .unwrap();
                if layer_name != BUSINESS_LAYER {
                    continue;
                }
                for (name, kind, lng, lat) in businesses {
                    let wkb = wkb::geom_to_wkb(&geo::Geometry::Point(geo::Point::new(*lng, *lat)))
                        .unwrap();
                    let geometry = gdal::vector::Geometry::from_wkb(&wkb).unwrap();
                    layer
                        .create_feature_fields(
                            geometry,
                            &["name", "type"],
                            &[
                                FieldValue::StringValue(name.to_string()),
                                FieldValue::StringValue(kind.to_string()),
                            ],
                        )
                        .unwrap();
                }
            }
        }
        GdalStore::new(&Datasource::GeoPackage { filepath })
    }
}

/// Number of rows in `layer`, read through a fresh read-only connection.
pub fn row_count<S: SpatialStore>(store: &S, layer: &str) -> usize {
    let mut connection = store.connect(AccessMode::ReadOnly).unwrap();
    connection.read_layer(layer).unwrap().len()
}
