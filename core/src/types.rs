//! Domain DTOs for the content-platform API.
//!
//! # Design
//! Field names follow the backend's JSON (`_id`, `collectionName`, camelCase
//! roster fields). Read DTOs default their child lists so a freshly created
//! parent without children still parses. Write payloads carry their own
//! presence checks; `validate` runs before any request is built.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Top-level grouping of books, with a display image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collection {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "collectionName")]
    pub name: String,
    #[serde(rename = "collectionImage", default)]
    pub image: String,
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Collection {
    pub fn book_named(&self, name: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub levels: Vec<Level>,
}

impl Book {
    pub fn level(&self, label: LevelLabel) -> Option<&Level> {
        self.levels.iter().find(|level| level.label == label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Level {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "level")]
    pub label: LevelLabel,
    #[serde(default)]
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub audios: Vec<Audio>,
}

/// An audio track. `file` is the backend's reference to the stored upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Audio {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    pub file: String,
}

/// CEFR proficiency tier. Only these six labels exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LevelLabel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl LevelLabel {
    pub const ALL: [LevelLabel; 6] = [
        LevelLabel::A1,
        LevelLabel::A2,
        LevelLabel::B1,
        LevelLabel::B2,
        LevelLabel::C1,
        LevelLabel::C2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LevelLabel::A1 => "A1",
            LevelLabel::A2 => "A2",
            LevelLabel::B1 => "B1",
            LevelLabel::B2 => "B2",
            LevelLabel::C1 => "C1",
            LevelLabel::C2 => "C2",
        }
    }
}

impl fmt::Display for LevelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelLabel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LevelLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ApiError::Validation(format!("unknown level '{s}', expected A1..C2")))
    }
}

/// A super admin or admin roster record. `super-admin/me` returns the same shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Admin {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The signed-in user.
pub type CurrentUser = Admin;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub payment: Payment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_paid_date: Option<String>,
    #[serde(default)]
    pub payment_history: Vec<String>,
}

/// `{"data": ...}` wrapper used by the collection endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Error or acknowledgement body: `{"message": "..."}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    /// Read a file from disk, guessing the content type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let content_type = match extension.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            Some("mp3") => "audio/mpeg",
            Some("wav") => "audio/wav",
            Some("ogg") => "audio/ogg",
            Some("m4a") => "audio/mp4",
            _ => "application/octet-stream",
        };
        Ok(Self {
            file_name,
            content_type: content_type.to_string(),
            bytes,
        })
    }
}

/// Form state for creating a collection.
#[derive(Debug, Clone)]
pub struct NewCollection {
    pub name: String,
    pub photo: Option<Upload>,
}

impl NewCollection {
    pub fn validate(&self) -> Result<(), ApiError> {
        require(&self.name, "collection name is required")?;
        if self.photo.is_none() {
            return Err(ApiError::Validation("collection photo is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub name: String,
    pub collection_id: String,
}

impl NewBook {
    pub fn validate(&self) -> Result<(), ApiError> {
        require(&self.name, "book name is required")?;
        require(&self.collection_id, "collection id is required")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameBook {
    pub collection_id: String,
    pub book_id: String,
    pub edited_book_name: String,
}

impl RenameBook {
    pub fn validate(&self) -> Result<(), ApiError> {
        require(&self.edited_book_name, "new book name is required")?;
        require(&self.book_id, "book id is required")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLevel {
    pub level: LevelLabel,
    pub collection_name: String,
    pub book_id: String,
}

impl NewLevel {
    pub fn validate(&self) -> Result<(), ApiError> {
        require(&self.collection_name, "collection name is required")?;
        require(&self.book_id, "book id is required")
    }
}

/// Form state for an audio track, either inside a new unit or added later.
#[derive(Debug, Clone)]
pub struct NewAudio {
    pub label: String,
    pub file: Option<Upload>,
}

impl NewAudio {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.file.is_none() {
            return Err(ApiError::Validation("audio file is required".to_string()));
        }
        require(&self.label, "audio label is required")
    }
}

#[derive(Debug, Clone)]
pub struct NewUnit {
    pub title: String,
    pub audios: Vec<NewAudio>,
}

impl NewUnit {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            audios: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require(&self.title, "unit title is required")?;
        self.audios.iter().try_for_each(NewAudio::validate)
    }
}

fn require(value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_parses_backend_field_names() {
        let json = r#"{
            "_id": "c1",
            "collectionName": "Grammar101",
            "collectionImage": "/uploads/cover.png",
            "books": [{"_id": "b1", "name": "Essentials", "levels": [
                {"_id": "l1", "level": "A1", "units": [
                    {"_id": "u1", "title": "Unit 1", "audios": [{"label": "Intro", "file": "/uploads/a.mp3"}]}
                ]}
            ]}],
            "__v": 0
        }"#;
        let collection: Collection = serde_json::from_str(json).unwrap();
        assert_eq!(collection.name, "Grammar101");
        let book = collection.book_named("Essentials").unwrap();
        let level = book.level(LevelLabel::A1).unwrap();
        assert_eq!(level.units[0].audios[0].label, "Intro");
    }

    #[test]
    fn collection_without_books_defaults_to_empty() {
        let collection: Collection =
            serde_json::from_str(r#"{"_id":"c1","collectionName":"Empty"}"#).unwrap();
        assert!(collection.books.is_empty());
        assert_eq!(collection.image, "");
    }

    #[test]
    fn level_label_rejects_unknown_values() {
        let result: Result<Level, _> =
            serde_json::from_str(r#"{"_id":"l1","level":"D1","units":[]}"#);
        assert!(result.is_err());
        assert!(matches!("d1".parse::<LevelLabel>(), Err(ApiError::Validation(_))));
        assert_eq!("b2".parse::<LevelLabel>().unwrap(), LevelLabel::B2);
    }

    #[test]
    fn student_parses_payment_record() {
        let json = r#"{
            "_id": "s1", "firstName": "Ada", "lastName": "Lovelace",
            "phoneNumber": "+1", "role": "student",
            "payment": {"status": true, "lastPaidDate": "2024-01-01", "paymentHistory": ["2023-12-01"]}
        }"#;
        let student: Student = serde_json::from_str(json).unwrap();
        assert_eq!(student.full_name(), "Ada Lovelace");
        assert!(student.payment.status);
        assert_eq!(student.payment.payment_history.len(), 1);
    }

    #[test]
    fn new_book_serializes_camel_case() {
        let input = NewBook {
            name: "Essentials".to_string(),
            collection_id: "c1".to_string(),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["collectionId"], "c1");
    }

    #[test]
    fn presence_checks() {
        let missing_photo = NewCollection {
            name: "Grammar101".to_string(),
            photo: None,
        };
        assert!(matches!(missing_photo.validate(), Err(ApiError::Validation(_))));

        let blank_title = NewUnit::titled("   ");
        assert!(blank_title.validate().is_err());

        let audio_without_file = NewUnit {
            title: "Unit 1".to_string(),
            audios: vec![NewAudio {
                label: "Intro".to_string(),
                file: None,
            }],
        };
        assert!(audio_without_file.validate().is_err());
        assert!(NewUnit::titled("Unit 1").validate().is_ok());
    }
}
