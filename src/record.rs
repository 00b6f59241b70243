use std::collections::HashMap;

use serde::Serialize;

/// The decoded status record: a flat scalar mapping plus named groups of
/// repeated sub-records (applicants, classifications, prosecution events).
/// Group members keep the order they appeared in the key/value text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusRecord {
    pub scalars: HashMap<String, String>,
    pub groups: HashMap<String, Vec<HashMap<String, String>>>,
}

impl StatusRecord {
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(String::as_str)
    }

    pub fn group(&self, name: &str) -> Option<&[HashMap<String, String>]> {
        self.groups.get(name).map(Vec::as_slice)
    }
}
