use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Entity ids picked for a bulk action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    ids: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was not already selected.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    /// Flip one id. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Header checkbox: select every id in `visible` unless all of them are
    /// already selected, in which case deselect them. Ids outside `visible`
    /// are left alone.
    pub fn toggle_all<I, S>(&mut self, visible: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let visible: Vec<String> = visible.into_iter().map(|s| s.as_ref().to_string()).collect();
        if self.is_all_selected(&visible) {
            for id in &visible {
                self.ids.remove(id);
            }
        } else {
            self.ids.extend(visible);
        }
    }

    /// True when `visible` is non-empty and every id in it is selected.
    pub fn is_all_selected<S: AsRef<str>>(&self, visible: &[S]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.ids.contains(id.as_ref()))
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
