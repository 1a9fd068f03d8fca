//! Composite keys for the collection → book → level → unit hierarchy.
//!
//! # Design
//! Reads are addressed by human-readable names because that is how the
//! backend routes them (`collection/:collectionName/:bookName`). Each key
//! knows its read path, its owning key, and how to derive itself from a
//! loaded entity or from a dashboard route. Names are trimmed the way the
//! backend trims them on create. Mutations address entities by
//! id; the key is only used to pick what to invalidate afterwards.

use std::fmt;

use crate::types::{Book, Collection, LevelLabel};

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn decode(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(|s| s.into_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionKey {
    pub collection: String,
}

impl CollectionKey {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.trim().to_string(),
        }
    }

    pub fn of(collection: &Collection) -> Self {
        Self::new(&collection.name)
    }

    pub fn path(&self) -> String {
        format!("collection/{}", encode(&self.collection))
    }

    pub fn book(&self, book: &str) -> BookKey {
        BookKey::new(&self.collection, book)
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookKey {
    pub collection: String,
    pub book: String,
}

impl BookKey {
    pub fn new(collection: &str, book: &str) -> Self {
        Self {
            collection: collection.trim().to_string(),
            book: book.trim().to_string(),
        }
    }

    pub fn of(collection: &Collection, book: &Book) -> Self {
        Self::new(&collection.name, &book.name)
    }

    pub fn path(&self) -> String {
        format!(
            "collection/{}/{}",
            encode(&self.collection),
            encode(&self.book)
        )
    }

    pub fn owner(&self) -> CollectionKey {
        CollectionKey::new(&self.collection)
    }

    pub fn unit(&self, level: LevelLabel, unit_id: &str) -> UnitKey {
        UnitKey {
            collection: self.collection.clone(),
            book: self.book.clone(),
            level,
            unit_id: unit_id.trim().to_string(),
        }
    }
}

impl fmt::Display for BookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.book)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub collection: String,
    pub book: String,
    pub level: LevelLabel,
    pub unit_id: String,
}

impl UnitKey {
    pub fn path(&self) -> String {
        format!(
            "collection/{}/{}/{}/{}",
            encode(&self.collection),
            encode(&self.book),
            self.level,
            encode(&self.unit_id)
        )
    }

    pub fn owner(&self) -> BookKey {
        BookKey::new(&self.collection, &self.book)
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.collection, self.book, self.level, self.unit_id
        )
    }
}

/// Student roster search. The empty query lists everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StudentQuery {
    pub first_name: String,
}

impl StudentQuery {
    pub fn new(first_name: &str) -> Self {
        Self {
            first_name: first_name.trim().to_string(),
        }
    }

    pub fn path(&self) -> String {
        format!("student?firstName={}", encode(&self.first_name))
    }
}

/// A dashboard screen, parsed from its route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Students,
    Admins,
    Collections,
    Collection(CollectionKey),
    Book(BookKey),
    Unit(UnitKey),
}

impl Route {
    /// Parse `/collections/:collectionName/:bookName` and friends.
    /// Returns `None` for unknown routes or a level outside A1..C2.
    pub fn parse(route: &str) -> Option<Route> {
        let route = route.split(['?', '#']).next().unwrap_or_default();
        let segments = route
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(decode)
            .collect::<Option<Vec<_>>>()?;
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match segments.as_slice() {
            [] => Some(Route::Students),
            ["admins"] => Some(Route::Admins),
            ["collections"] => Some(Route::Collections),
            ["collections", collection] => Some(Route::Collection(CollectionKey::new(collection))),
            ["collections", collection, book] => Some(Route::Book(BookKey::new(collection, book))),
            ["units", collection, book, level, unit_id] => {
                let level = level.parse().ok()?;
                Some(Route::Unit(BookKey::new(collection, book).unit(level, unit_id)))
            }
            _ => None,
        }
    }

    /// Render the route path; inverse of `parse`.
    pub fn path(&self) -> String {
        match self {
            Route::Students => "/".to_string(),
            Route::Admins => "/admins".to_string(),
            Route::Collections => "/collections".to_string(),
            Route::Collection(key) => format!("/collections/{}", encode(&key.collection)),
            Route::Book(key) => format!(
                "/collections/{}/{}",
                encode(&key.collection),
                encode(&key.book)
            ),
            Route::Unit(key) => format!(
                "/units/{}/{}/{}/{}",
                encode(&key.collection),
                encode(&key.book),
                key.level,
                encode(&key.unit_id)
            ),
        }
    }
}
