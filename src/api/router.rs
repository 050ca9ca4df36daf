use tiny_http::Method;

use crate::store::FeatureId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRoute {
    Status,
    /// `GET /api/{layer}`, with the layer name as requested.
    Layer(String),
    CreateBusiness,
    UpdateBusiness(FeatureId),
    DeleteBusiness(FeatureId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Api(ApiRoute),
    /// Path of a static file relative to the static directory. Empty for `/`.
    Static(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl RouteError {
    pub fn status_code(&self) -> u16 {
        match self {
            RouteError::NotFound => 404,
            RouteError::MethodNotAllowed => 405,
        }
    }
}

/// Map a request line to a route. The query string is ignored.
pub fn route(method: &Method, url: &str) -> Result<Route, RouteError> {
    let path = url.split_once('?').map_or(url, |(path, _)| path);
    let path = path.trim_start_matches('/');
    let segments: Vec<&str> = path.split('/').collect();
    let api_route = match segments.as_slice() {
        ["api", "status"] => allow(method, Method::Get, ApiRoute::Status),
        ["api", "business", "add"] => allow(method, Method::Post, ApiRoute::CreateBusiness),
        ["api", "business", "update", id] => {
            allow(method, Method::Put, ApiRoute::UpdateBusiness(parse_id(id)?))
        }
        ["api", "business", "delete", id] => {
            allow(method, Method::Delete, ApiRoute::DeleteBusiness(parse_id(id)?))
        }
        ["api", layer] if !layer.is_empty() => {
            allow(method, Method::Get, ApiRoute::Layer(layer.to_string()))
        }
        ["api", ..] => Err(RouteError::NotFound),
        _ => {
            return allow(method, Method::Get, Route::Static(path.to_string()));
        }
    };
    api_route.map(Route::Api)
}

fn allow<T>(method: &Method, expected: Method, route: T) -> Result<T, RouteError> {
    if *method == expected {
        Ok(route)
    } else {
        Err(RouteError::MethodNotAllowed)
    }
}

/// Ids that are not unsigned integers do not match any route.
fn parse_id(id: &str) -> Result<FeatureId, RouteError> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RouteError::NotFound);
    }
    id.parse().map_err(|_| RouteError::NotFound)
}
