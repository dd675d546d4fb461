//! Response header storage for [`Response`](crate::http::response::Response).
//!
//! Header names are compared case-insensitively but the spelling used by the
//! first writer is kept for the commit. Every name maps to an ordered sequence
//! of values; single-value reads join them with `,`.
//!
//! Like the rest of the header layer, no HTTP semantics are enforced here.
//! Callers such as the cookie codec build their own rules on top of it.

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    headers: IndexMap<String, HeaderEntry>,
}

impl HeaderBag {
    pub fn new() -> Self {
        Self {
            headers: IndexMap::new(),
        }
    }

    /// Replaces every value of `name` with `value`.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set_values(name, vec![value.to_string()]);
    }

    pub fn set_values(&mut self, name: &str, values: Vec<String>) {
        let key = name.to_ascii_lowercase();
        match self.headers.get_mut(&key) {
            Some(entry) => entry.values = values,
            None => {
                self.headers.insert(
                    key,
                    HeaderEntry {
                        name: name.to_string(),
                        values,
                    },
                );
            }
        }
    }

    pub fn append(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        self.headers
            .entry(key)
            .or_insert_with(|| HeaderEntry {
                name: name.to_string(),
                values: Vec::new(),
            })
            .values
            .push(value.to_string());
    }

    /// Single-value view: `None` when absent, `""` for an empty sequence,
    /// otherwise all values joined with `,`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.get_all(name).map(|values| values.join(","))
    }

    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.values.as_slice())
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.headers
            .shift_remove(&name.to_ascii_lowercase())
            .map(|entry| entry.values)
    }

    /// Keeps only the values of `name` for which `keep` returns true. The name
    /// itself stays present, possibly with no values.
    pub fn retain_values<F>(&mut self, name: &str, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        if let Some(entry) = self.headers.get_mut(&name.to_ascii_lowercase()) {
            entry.values.retain(|v| keep(v));
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.headers
            .values()
            .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }
}
