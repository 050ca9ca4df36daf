pub mod router;

use geojson::JsonValue;
use serde_json::json;

use crate::{
    business::writer::FeatureWriter,
    error::FeatureError,
    layer::{
        layer_name::{LayerCatalog, LayerName},
        reader::LayerReader,
    },
    store::{SpatialStore, StoreError},
};

use self::router::ApiRoute;

/// Status code and JSON body of an API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: JsonValue,
}

impl ApiResponse {
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }
}

/// The JSON endpoints, independent of the HTTP server.
pub struct Api<S> {
    store: S,
    catalog: LayerCatalog,
    business_table: LayerName,
}

impl<S: SpatialStore> Api<S> {
    pub fn new(store: S, catalog: LayerCatalog, business_table: LayerName) -> Self {
        Self {
            store,
            catalog,
            business_table,
        }
    }

    pub fn handle(&self, route: &ApiRoute, body: &str) -> ApiResponse {
        match self.dispatch(route, body) {
            Ok((status, body)) => ApiResponse { status, body },
            Err(err) => {
                let status = err.status_code();
                if status >= 500 {
                    log::error!("{:?} failed: {}", route, err);
                }
                ApiResponse::error(status, &err.to_string())
            }
        }
    }

    fn dispatch(&self, route: &ApiRoute, body: &str) -> Result<(u16, JsonValue), FeatureError> {
        let writer = FeatureWriter::new(&self.store, &self.business_table);
        match route {
            ApiRoute::Status => Ok((200, json!({ "status": "ready" }))),
            ApiRoute::Layer(requested) => {
                let layer = self.catalog.resolve(requested)?;
                let collection = LayerReader::new(&self.store).fetch(&layer)?;
                Ok((200, to_json(&collection)?))
            }
            ApiRoute::CreateBusiness => {
                let feature = writer.create(&parse_body(body)?)?;
                Ok((201, to_json(&feature)?))
            }
            ApiRoute::UpdateBusiness(id) => {
                let feature = writer.update(*id, &parse_body(body)?)?;
                Ok((200, to_json(&feature)?))
            }
            ApiRoute::DeleteBusiness(id) => {
                writer.delete(*id)?;
                Ok((200, json!({ "success": true })))
            }
        }
    }
}

fn parse_body(body: &str) -> Result<JsonValue, FeatureError> {
    serde_json::from_str(body)
        .map_err(|err| FeatureError::Validation(format!("Invalid JSON body: {}", err)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<JsonValue, FeatureError> {
    Ok(serde_json::to_value(value).map_err(StoreError::from)?)
}
