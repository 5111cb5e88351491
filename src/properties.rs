/// A custom property value attached to a map, layer, tileset, tile or object.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `bool`
    Bool(bool),
    /// `int` and `object` references
    I64(i64),
    /// `float`
    F32(f32),
    /// `string`, also `file`, `color` and `class`
    String(String),
}

impl PropertyValue {
    /// Tiled type name used when writing the property back out.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::I64(_) => "int",
            PropertyValue::F32(_) => "float",
            PropertyValue::String(_) => "string",
        }
    }
}

/// Custom properties in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, PropertyValue)>,
}

impl Properties {
    /// No properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Value of `name`, any type.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// `name` if it is a bool.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// `name` if it is an int.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropertyValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// `name` if it is an int that fits in `i32`.
    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|v| i32::try_from(v).ok())
    }

    /// `name` if it is a float.
    pub fn get_f32(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            PropertyValue::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// `name` if it is a string.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropertyValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Name and value pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut props = Properties::new();
        props.insert("a", PropertyValue::I64(1));
        props.insert("b", PropertyValue::Bool(true));
        props.insert("a", PropertyValue::I64(5_000_000_000));

        let names: Vec<_> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(props.get_i64("a"), Some(5_000_000_000));
        assert_eq!(props.get_i32("a"), None);
        assert_eq!(props.get_string("b"), None);
    }
}
