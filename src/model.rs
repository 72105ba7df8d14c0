//! Record payloads served by the upstream services and the composite passport.

use serde::{Deserialize, Serialize};

/// A saved link belonging to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    #[serde(default)]
    pub id: Option<i64>,
    pub href: String,
    pub user_id: String,
    #[serde(default)]
    pub description: String,
}

/// An address book entry belonging to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub id: Option<i64>,
    pub user_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// Which branches of a passport were produced by a fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DegradedBranches {
    pub bookmarks: bool,
    pub contacts: bool,
}

impl DegradedBranches {
    pub fn any(&self) -> bool {
        self.bookmarks || self.contacts
    }

    /// Comma-separated branch names, e.g. `bookmarks,contacts`.
    pub fn header_value(&self) -> Option<String> {
        let names: Vec<&str> = [(self.bookmarks, "bookmarks"), (self.contacts, "contacts")]
            .into_iter()
            .filter_map(|(degraded, name)| degraded.then_some(name))
            .collect();
        (!names.is_empty()).then(|| names.join(","))
    }
}

/// Everything known about one user, merged from both record services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passport {
    pub user_id: String,
    pub bookmarks: Vec<Bookmark>,
    pub contacts: Vec<Contact>,
    /// Reported out of band; the body keeps exactly three fields.
    #[serde(skip)]
    pub degraded: DegradedBranches,
}
