use serde_json::Value;

pub type JsonMap = serde_json::Map<String, Value>;

/// Parses a ticket or feed response body.
///
/// Never fails: an empty body yields an empty map, a JSON object is returned
/// as-is, any other JSON value is wrapped under `"data"`, and text that is not
/// JSON at all is kept under `"raw"`.
pub fn parse_response_body(body: &str) -> JsonMap {
    if body.trim().is_empty() {
        return JsonMap::new();
    }

    let mut map = JsonMap::new();
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => return object,
        Ok(other) => {
            map.insert("data".to_string(), other);
        }
        Err(_) => {
            map.insert("raw".to_string(), Value::String(body.to_string()));
        }
    }
    map
}

/// Parses an OAuth token response, treating anything but a JSON object as empty
pub fn parse_object_or_empty(body: &str) -> JsonMap {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => object,
        _ => JsonMap::new(),
    }
}

/// Non-null value found by walking `path` through nested objects
pub fn lookup_path<'a>(map: &'a JsonMap, path: &[&str]) -> Option<&'a Value> {
    let (head, rest) = path.split_first()?;
    rest.iter()
        .try_fold(map.get(*head)?, |current, key| current.get(*key))
        .filter(|value| !value.is_null())
}
