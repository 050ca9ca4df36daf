use super::FeatureId;

/// Errors raised by a spatial store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("layer '{0}' does not exist")]
    LayerNotFound(String),
    #[error("layer '{0}' has no geometry column")]
    NoGeometryColumn(String),
    #[error("feature {0} does not exist")]
    FeatureNotFound(FeatureId),
    #[error("{method} failed with OGR error code {code}")]
    Ogr {
        method: &'static str,
        code: gdal_sys::OGRErr::Type,
    },
    #[error("could not convert geometry, {0}")]
    Geometry(String),
    #[error("the connection is read-only")]
    ReadOnly,
    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),
    #[error("invalid GeoJSON from store: {0}")]
    Json(#[from] serde_json::Error),
    /// A driver call failed and the driver reported why, e.g. a database constraint violation.
    #[error("{message}")]
    Driver {
        message: String,
        #[source]
        source: Box<StoreError>,
    },
    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
