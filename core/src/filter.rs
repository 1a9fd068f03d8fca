//! Case-insensitive substring filters for list views.

use crate::types::{Admin, Book, Collection, Student};

/// An entity that list views can filter by a user-entered query.
pub trait Searchable {
    /// Text the query is matched against.
    fn haystack(&self) -> String;

    fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty() || self.haystack().to_lowercase().contains(&query)
    }
}

impl Searchable for Student {
    fn haystack(&self) -> String {
        self.full_name()
    }
}

impl Searchable for Admin {
    fn haystack(&self) -> String {
        self.full_name()
    }
}

impl Searchable for Collection {
    fn haystack(&self) -> String {
        self.name.clone()
    }
}

impl Searchable for Book {
    fn haystack(&self) -> String {
        self.name.clone()
    }
}

/// Items matching `query`, in their original order.
pub fn filter<'a, T: Searchable>(items: &'a [T], query: &str) -> Vec<&'a T> {
    items.iter().filter(|item| item.matches(query)).collect()
}
