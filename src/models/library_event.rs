//! Library event data models
//!
//! This module defines the event record carried on the `library-events` topic
//! and persisted by the event store, together with the book it owns.

use serde::{Deserialize, Serialize};

/// Event types carried by a library event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LibraryEventType {
    /// A book is added to the library
    #[serde(rename = "NEW")]
    New,
    /// An existing library event gets a replacement book
    #[serde(rename = "UPDATE")]
    Update,
    /// Any type this consumer does not know about yet
    #[serde(other, rename = "UNKNOWN")]
    Unknown,
}

impl LibraryEventType {
    /// Parse event type from its stored representation
    pub fn from_db(s: &str) -> Self {
        match s {
            "NEW" => LibraryEventType::New,
            "UPDATE" => LibraryEventType::Update,
            _ => LibraryEventType::Unknown,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryEventType::New => "NEW",
            LibraryEventType::Update => "UPDATE",
            LibraryEventType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for LibraryEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Book value owned by a library event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Natural key of the book, unique across stored events
    pub book_id: i32,

    /// Title of the book
    pub book_name: String,

    /// Author of the book
    pub book_author: String,
}

impl Book {
    /// Create a new book value
    pub fn new(book_id: i32, book_name: impl Into<String>, book_author: impl Into<String>) -> Self {
        Self {
            book_id,
            book_name: book_name.into(),
            book_author: book_author.into(),
        }
    }
}

/// Library event as published to Kafka and persisted by the store
///
/// `id` is absent on creation and assigned by the store on first insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEvent {
    /// Store-assigned identifier
    #[serde(rename = "libraryEventId", alias = "id", default)]
    pub id: Option<i32>,

    /// Type of change this event describes
    #[serde(rename = "libraryEventType", alias = "eventType")]
    pub event_type: LibraryEventType,

    /// The book this event owns
    pub book: Book,
}

impl LibraryEvent {
    /// Create a NEW event without an identifier
    pub fn new_event(book: Book) -> Self {
        Self {
            id: None,
            event_type: LibraryEventType::New,
            book,
        }
    }

    /// Create an UPDATE event for an existing identifier
    pub fn update_event(id: i32, book: Book) -> Self {
        Self {
            id: Some(id),
            event_type: LibraryEventType::Update,
            book,
        }
    }

    /// Return a copy of this event carrying the given identifier
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    /// Merge an inbound UPDATE into this persisted event
    ///
    /// The stored identity wins; the inbound event only contributes its book.
    pub fn merged_with(&self, inbound: &LibraryEvent) -> LibraryEvent {
        LibraryEvent {
            id: self.id,
            event_type: LibraryEventType::Update,
            book: inbound.book.clone(),
        }
    }
}

/// Builder for creating test events
#[cfg(test)]
pub struct LibraryEventBuilder {
    id: Option<i32>,
    event_type: LibraryEventType,
    book: Book,
}

#[cfg(test)]
impl LibraryEventBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            event_type: LibraryEventType::New,
            book: Book::new(456, "Kafka Using Rust", "Dilip"),
        }
    }

    pub fn id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: LibraryEventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn book(mut self, book: Book) -> Self {
        self.book = book;
        self
    }

    pub fn build(self) -> LibraryEvent {
        LibraryEvent {
            id: self.id,
            event_type: self.event_type,
            book: self.book,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(LibraryEventType::New.to_string(), "NEW");
        assert_eq!(LibraryEventType::Update.to_string(), "UPDATE");
    }

    #[test]
    fn test_event_type_from_db() {
        assert_eq!(LibraryEventType::from_db("NEW"), LibraryEventType::New);
        assert_eq!(LibraryEventType::from_db("UPDATE"), LibraryEventType::Update);
        assert_eq!(LibraryEventType::from_db("DELETE"), LibraryEventType::Unknown);
    }

    #[test]
    fn test_merge_keeps_stored_identity() {
        let stored = LibraryEventBuilder::new().id(1).build();
        let inbound = LibraryEventBuilder::new()
            .id(1)
            .event_type(LibraryEventType::Update)
            .book(Book::new(789, "Kafka Spring Cloud", "Dilip"))
            .build();

        let merged = stored.merged_with(&inbound);

        assert_eq!(merged.id, Some(1));
        assert_eq!(merged.event_type, LibraryEventType::Update);
        assert_eq!(merged.book.book_id, 789);
        // stored value is untouched
        assert_eq!(stored.book.book_id, 456);
        assert_eq!(stored.event_type, LibraryEventType::New);
    }

    #[test]
    fn test_json_field_names() {
        let event = LibraryEventBuilder::new().build();

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"libraryEventId\":null"));
        assert!(json.contains("\"libraryEventType\":\"NEW\""));
        assert!(json.contains("\"bookId\":456"));
        assert!(json.contains("\"bookAuthor\":\"Dilip\""));
    }

    #[test]
    fn test_short_field_aliases() {
        let json = r#"{"id":7,"eventType":"UPDATE","book":{"bookId":1,"bookName":"a","bookAuthor":"b"}}"#;
        let event: LibraryEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, Some(7));
        assert_eq!(event.event_type, LibraryEventType::Update);
    }

    #[test]
    fn test_unknown_event_type_decodes() {
        let json = r#"{"libraryEventId":3,"libraryEventType":"DELETE","book":{"bookId":1,"bookName":"a","bookAuthor":"b"}}"#;
        let event: LibraryEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.event_type, LibraryEventType::Unknown);
    }
}
