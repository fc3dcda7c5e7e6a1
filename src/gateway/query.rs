//! Query string and request body helpers for the surveillance API
//!
//! Array parameters use indexed bracket notation (`datasets[0]=...`) and
//! region geometry travels as a GeoJSON `Feature` inside the POST body.

use serde_json::{json, Value};

/// Ordered list of query parameters
pub type QueryParams = Vec<(String, String)>;

/// Expand an array parameter into `name[0]=a&name[1]=b` pairs
pub fn indexed_array<S: AsRef<str>>(name: &str, values: &[S]) -> QueryParams {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("{}[{}]", name, i), v.as_ref().to_string()))
        .collect()
}

/// Encode parameters into a query string.
///
/// Keys are kept literal so bracket indices survive; values are percent-encoded.
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Wrap a Polygon or MultiPolygon geometry as the report request body
pub fn feature_body(geometry: &Value) -> Value {
    json!({
        "geojson": {
            "type": "Feature",
            "properties": {},
            "geometry": geometry,
        }
    })
}
