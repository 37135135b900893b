use crate::store::{value_i64, value_text, QueryExecutor, StoreError};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub id: i64,
    pub name: String,
}

/// Case-insensitive display name → id lookup over one snapshot of a reference table.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    by_name: HashMap<String, i64>,
}

impl ReferenceResolver {
    /// Later entries overwrite earlier ones that normalize to the same key.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ReferenceEntry>,
    {
        let mut by_name = HashMap::new();
        for entry in entries {
            by_name.insert(normalize(&entry.name), entry.id);
        }
        Self { by_name }
    }

    pub fn load_schools(exec: &impl QueryExecutor) -> Result<Self, StoreError> {
        let rows = exec.fetch("SELECT id, name FROM schools ORDER BY id", &[])?;
        let entries = rows.iter().filter_map(|r| {
            Some(ReferenceEntry {
                id: value_i64(r.first())?,
                name: value_text(r.get(1))?,
            })
        });
        Ok(Self::from_entries(entries))
    }

    pub fn resolve(&self, raw_name: &str) -> Option<i64> {
        self.by_name.get(&normalize(raw_name)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
