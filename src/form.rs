use crate::models::EndpointDescriptor;
use crate::template::SplitPath;
use std::collections::BTreeMap;

/// A single user edit against the parameter form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEdit {
    Set { key: String, value: String },
    Clear { key: String },
    Reset,
}

/// Current values of the parameters a descriptor declares as editable.
///
/// Every declared key always has an entry. Undeclared keys are never stored;
/// they stay as literal values in the request path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormState {
    values: BTreeMap<String, String>,
    seed: BTreeMap<String, String>,
}

impl FormState {
    /// Seeds one entry per declared key from the path's current query value,
    /// or an empty string when the path does not carry that key.
    pub fn seed(descriptor: &EndpointDescriptor, split: &SplitPath) -> Self {
        let seed: BTreeMap<String, String> = descriptor
            .params
            .iter()
            .flat_map(|schema| schema.keys())
            .map(|key| (key.clone(), split.get(key).unwrap_or_default().to_string()))
            .collect();

        FormState {
            values: seed.clone(),
            seed,
        }
    }

    /// Pure reducer: returns the state after `edit`. Edits to undeclared keys
    /// are ignored.
    pub fn apply(mut self, edit: FormEdit) -> Self {
        match edit {
            FormEdit::Set { key, value } => {
                if let Some(slot) = self.values.get_mut(&key) {
                    *slot = value;
                } else {
                    tracing::debug!("ignoring edit to undeclared parameter '{}'", key);
                }
            }
            FormEdit::Clear { key } => {
                if let Some(slot) = self.values.get_mut(&key) {
                    slot.clear();
                }
            }
            FormEdit::Reset => self.values = self.seed.clone(),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::split;

    fn descriptor(path: &str, keys: &[&str]) -> EndpointDescriptor {
        EndpointDescriptor {
            name: "Search".to_string(),
            path: path.to_string(),
            method: Default::default(),
            params: Some(keys.iter().map(|k| (k.to_string(), String::new())).collect()),
            desc: String::new(),
        }
    }

    #[test]
    fn seed_covers_every_declared_key() {
        let d = descriptor("/api/search?q=cats&limit=5", &["q", "page"]);
        let state = FormState::seed(&d, &split(&d.path));
        assert_eq!(state.get("q"), Some("cats"));
        assert_eq!(state.get("page"), Some(""));
        assert!(!state.contains("limit"));
    }

    #[test]
    fn edits_to_undeclared_keys_are_dropped() {
        let d = descriptor("/api/search?q=cats&limit=5", &["q"]);
        let state = FormState::seed(&d, &split(&d.path)).apply(FormEdit::Set {
            key: "limit".to_string(),
            value: "99".to_string(),
        });
        assert!(!state.contains("limit"));
    }

    #[test]
    fn reset_restores_seed() {
        let d = descriptor("/api/search?q=cats", &["q"]);
        let seeded = FormState::seed(&d, &split(&d.path));
        let edited = seeded
            .clone()
            .apply(FormEdit::Set {
                key: "q".to_string(),
                value: "dogs".to_string(),
            })
            .apply(FormEdit::Clear { key: "q".to_string() });
        assert_eq!(edited.get("q"), Some(""));
        assert_eq!(edited.apply(FormEdit::Reset), seeded);
    }

    #[test]
    fn descriptor_without_schema_has_empty_form() {
        let mut d = descriptor("/api/ping?x=1", &[]);
        d.params = None;
        assert!(FormState::seed(&d, &split(&d.path)).is_empty());
    }
}
