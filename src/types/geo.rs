//! `geopoint` and `geojson` types

use serde_json::{Map, Value as JsonValue};

use crate::value::Value;

const GEOJSON_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
    "Feature",
    "FeatureCollection",
];

fn geopoint(lon: f64, lat: f64) -> Option<Value> {
    ((-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat))
        .then_some(Value::GeoPoint { lon, lat })
}

fn pair_from_json(items: &[JsonValue]) -> Option<(f64, f64)> {
    match items {
        [lon, lat] => Some((lon.as_f64()?, lat.as_f64()?)),
        _ => None,
    }
}

/// Cast a geopoint in `default` ("lon, lat"), `array` ([lon, lat]) or
/// `object` ({"lon": .., "lat": ..}) format
pub fn cast_geopoint(format: &str, value: &Value) -> Option<Value> {
    if let Value::GeoPoint { .. } = value {
        return Some(value.clone());
    }
    let (lon, lat) = match (format, value) {
        ("array", Value::Array(items)) => pair_from_json(items)?,
        ("array", Value::String(s)) => match serde_json::from_str::<JsonValue>(s).ok()? {
            JsonValue::Array(items) => pair_from_json(&items)?,
            _ => return None,
        },
        ("object", Value::Object(map)) => object_pair(map)?,
        ("object", Value::String(s)) => match serde_json::from_str::<JsonValue>(s).ok()? {
            JsonValue::Object(map) => object_pair(&map)?,
            _ => return None,
        },
        (_, Value::String(s)) => {
            let mut parts = s.split(',');
            let lon = parts.next()?.trim().parse().ok()?;
            let lat = parts.next()?.trim().parse().ok()?;
            if parts.next().is_some() {
                return None;
            }
            (lon, lat)
        }
        _ => return None,
    };
    geopoint(lon, lat)
}

fn object_pair(map: &Map<String, JsonValue>) -> Option<(f64, f64)> {
    if map.len() != 2 {
        return None;
    }
    Some((map.get("lon")?.as_f64()?, map.get("lat")?.as_f64()?))
}

/// Cast a GeoJSON (`default`) or TopoJSON (`topojson`) object
pub fn cast_geojson(format: &str, value: &Value) -> Option<Value> {
    let map = match value {
        Value::Object(map) => map.clone(),
        Value::String(s) => match serde_json::from_str::<JsonValue>(s).ok()? {
            JsonValue::Object(map) => map,
            _ => return None,
        },
        _ => return None,
    };
    let kind = map.get("type")?.as_str()?;
    let accepted = match format {
        "topojson" => kind == "Topology" && map.contains_key("objects"),
        _ => GEOJSON_TYPES.contains(&kind),
    };
    accepted.then_some(Value::Object(map))
}
