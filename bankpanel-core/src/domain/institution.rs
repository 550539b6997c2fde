//! Institution — a bank holding company as listed in the provider directory.

use serde::{Deserialize, Serialize};

/// A bank holding company identified by its parent name and zip code.
///
/// Ordering is (parent_name, zip), which gives the directory a stable
/// iteration order independent of the provider's response order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Institution {
    pub parent_name: String,
    pub zip: String,
}

impl Institution {
    /// Build an institution from directory values.
    ///
    /// Returns `None` when the parent name is blank: those rows carry no
    /// holding-company identity and cannot be queried.
    pub fn new(parent_name: impl Into<String>, zip: impl Into<String>) -> Option<Self> {
        let parent_name = parent_name.into();
        if parent_name.trim().is_empty() {
            return None;
        }
        Some(Self {
            parent_name,
            zip: normalize_zip(&zip.into()),
        })
    }
}

/// Canonical zip text: trimmed, and zero-padded to five digits when numeric.
///
/// The provider sometimes serves zips as numbers, which drops leading zeros
/// (`2110` for Boston's `02110`).
pub fn normalize_zip(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.len() < 5 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        format!("{trimmed:0>5}")
    } else {
        trimmed.to_string()
    }
}
