//! `/`-separated property paths, e.g. `attrs/line/sourceMarker`.

use crate::attrs::PropMap;
use serde_json::Value;

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Value at `path`.
pub fn get_path<'a>(props: &'a PropMap, path: &str) -> Option<&'a Value> {
    let mut segments = segments(path);
    let mut current = props.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, creating (or replacing non-object) intermediate
/// values with objects.
pub fn set_path(props: &mut PropMap, path: &str, value: Value) {
    let segments: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = props;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(PropMap::new()));
        if !entry.is_object() {
            *entry = Value::Object(PropMap::new());
        }
        let Some(next) = entry.as_object_mut() else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

/// Remove the value at `path` and return it.
pub fn remove_path(props: &mut PropMap, path: &str) -> Option<Value> {
    let segments: Vec<&str> = segments(path).collect();
    let (last, parents) = segments.split_last()?;
    let mut current = props;
    for segment in parents {
        current = current.get_mut(*segment)?.as_object_mut()?;
    }
    current.remove(*last)
}
