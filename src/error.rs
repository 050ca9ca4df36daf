use crate::store::StoreError;

/// Failures of the layer and business feature operations.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// Caller supplied input is missing or malformed.
    #[error("{0}")]
    Validation(String),
    /// The referenced layer or entity does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The store failed. The message is passed through to the caller.
    #[error(transparent)]
    Storage(StoreError),
}

impl FeatureError {
    /// HTTP status code reported for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            FeatureError::Validation(_) => 400,
            FeatureError::NotFound(_) => 404,
            FeatureError::Storage(_) => 500,
        }
    }
}

impl From<StoreError> for FeatureError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LayerNotFound(_)
            | StoreError::NoGeometryColumn(_)
            | StoreError::FeatureNotFound(_) => {
                FeatureError::NotFound(err.to_string())
            }
            err => FeatureError::Storage(err),
        }
    }
}
