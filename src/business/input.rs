use geojson::{JsonObject, JsonValue};

use crate::error::FeatureError;

pub const NAME: &str = "name";
pub const TYPE: &str = "type";
const LAT: &str = "lat";
const LNG: &str = "lng";

/// Body of `POST /api/business/add`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBusiness {
    pub name: String,
    pub kind: String,
    pub location: geo::Point,
}

impl NewBusiness {
    pub fn from_json(body: &JsonValue) -> Result<Self, FeatureError> {
        let object = required_fields(body, &[NAME, TYPE, LAT, LNG])?;
        Ok(Self {
            name: text(object, NAME)?,
            kind: text(object, TYPE)?,
            location: geo::Point::new(coordinate(object, LNG)?, coordinate(object, LAT)?),
        })
    }

    pub fn attributes(&self) -> [(&str, &str); 2] {
        [(NAME, self.name.as_str()), (TYPE, self.kind.as_str())]
    }
}

/// Body of `PUT /api/business/update/{id}`. The location cannot be changed.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessUpdate {
    pub name: String,
    pub kind: String,
}

impl BusinessUpdate {
    pub fn from_json(body: &JsonValue) -> Result<Self, FeatureError> {
        let object = required_fields(body, &[NAME, TYPE])?;
        Ok(Self {
            name: text(object, NAME)?,
            kind: text(object, TYPE)?,
        })
    }

    pub fn attributes(&self) -> [(&str, &str); 2] {
        [(NAME, self.name.as_str()), (TYPE, self.kind.as_str())]
    }
}

/// Every key must be present, not null and not an empty string.
fn required_fields<'b>(body: &'b JsonValue, keys: &[&str]) -> Result<&'b JsonObject, FeatureError> {
    let object = body.as_object().ok_or_else(|| {
        FeatureError::Validation("Request body must be a JSON object".to_string())
    })?;
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|key| match object.get(*key) {
            None | Some(JsonValue::Null) => true,
            Some(JsonValue::String(value)) => value.is_empty(),
            Some(_) => false,
        })
        .collect();
    if !missing.is_empty() {
        return Err(FeatureError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }
    Ok(object)
}

/// Numbers and booleans are stored in their JSON spelling. Only objects and arrays, which have
/// no column representation, are refused.
fn text(object: &JsonObject, key: &str) -> Result<String, FeatureError> {
    match &object[key] {
        JsonValue::String(value) => Ok(value.clone()),
        JsonValue::Number(value) => Ok(value.to_string()),
        JsonValue::Bool(value) => Ok(value.to_string()),
        _ => Err(FeatureError::Validation(format!(
            "Field '{}' must be a scalar value",
            key
        ))),
    }
}

/// Numbers and numeric strings are accepted. No range checking.
fn coordinate(object: &JsonObject, key: &str) -> Result<f64, FeatureError> {
    let value = match &object[key] {
        JsonValue::Number(number) => number.as_f64(),
        JsonValue::String(value) => value.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|value| value.is_finite()).ok_or_else(|| {
        FeatureError::Validation(format!("Field '{}' must be a number", key))
    })
}
