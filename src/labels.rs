use crate::error::{Result, SmlError};
use std::collections::HashMap;
use std::fmt;

/// Label name to instruction address table.
///
/// Names are unique: binding a name twice is an error, never an overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    labels: HashMap<String, usize>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `label` to `address`.
    ///
    /// Returns [`SmlError::DuplicateLabel`] if the name is already bound.
    pub fn add_label(&mut self, label: &str, address: usize) -> Result<()> {
        if let Some(&existing) = self.labels.get(label) {
            return Err(SmlError::DuplicateLabel {
                label: label.to_string(),
                existing,
            });
        }
        self.labels.insert(label.to_string(), address);
        Ok(())
    }

    /// Returns the address bound to `label`.
    ///
    /// Returns [`SmlError::UnknownLabel`] if the name was never added.
    pub fn get_address(&self, label: &str) -> Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| SmlError::UnknownLabel {
                label: label.to_string(),
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Removes all labels.
    pub fn reset(&mut self) {
        self.labels.clear();
    }

    /// Entries sorted by address, then name.
    fn sorted(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .labels
            .iter()
            .map(|(name, &address)| (name.as_str(), address))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (name, address)) in self.sorted().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} -> {}", name, address)?;
        }
        f.write_str("]")
    }
}
