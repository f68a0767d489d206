//! HTTP ingress for library events
//!
//! Handlers validate the request, stamp the event type and hand the event to
//! the producer; the send completes in the background and its outcome is
//! logged.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{Error, Result};
use crate::kafka::LibraryEventProducer;
use crate::models::{Book, LibraryEvent, LibraryEventType};

/// Body of the answer to an update without an identifier
pub const MISSING_ID_MESSAGE: &str = "Please, provide libraryEventId.";

/// Library event as accepted by the ingress
///
/// Unlike [`LibraryEvent`], the type may be null or absent since the handler
/// decides it, and the book fields are checked by [`Validate`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LibraryEventRequest {
    #[serde(rename = "libraryEventId", default)]
    pub id: Option<i32>,

    #[serde(rename = "libraryEventType", default)]
    pub event_type: Option<LibraryEventType>,

    #[serde(default)]
    #[validate(required(message = "must not be null"), nested)]
    pub book: Option<BookRequest>,
}

/// Book as accepted by the ingress
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BookRequest {
    #[serde(rename = "bookId", default)]
    #[validate(required(message = "must not be null"))]
    pub book_id: Option<i32>,

    #[serde(rename = "bookName", default)]
    #[validate(required(message = "must not be blank"), custom(function = "not_blank"))]
    pub book_name: Option<String>,

    #[serde(rename = "bookAuthor", default)]
    #[validate(required(message = "must not be blank"), custom(function = "not_blank"))]
    pub book_author: Option<String>,
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

impl LibraryEventRequest {
    /// Validate the request and build the event with the given type
    pub fn into_event(self, event_type: LibraryEventType) -> Result<LibraryEvent> {
        self.validate()
            .map_err(|errors| Error::validation(validation_message(&errors)))?;

        if let Some(requested) = self.event_type.filter(|t| *t != event_type) {
            tracing::debug!(requested = %requested, stamped = %event_type, "Overriding event type");
        }

        let book = self
            .book
            .and_then(BookRequest::into_book)
            .ok_or_else(|| Error::validation("book - must not be null"))?;

        Ok(LibraryEvent {
            id: self.id,
            event_type,
            book,
        })
    }
}

impl BookRequest {
    fn into_book(self) -> Option<Book> {
        Some(Book::new(self.book_id?, self.book_name?, self.book_author?))
    }
}

/// Flatten validation errors into `path - message` entries sorted by path
fn validation_message(errors: &ValidationErrors) -> String {
    let mut entries = Vec::new();
    collect_errors("", errors, &mut entries);
    entries.sort();
    entries.join(", ")
}

fn collect_errors(prefix: &str, errors: &ValidationErrors, entries: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = format!("{}{}", prefix, field);
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    entries.push(format!("{} - {}", path, message));
                }
            },
            ValidationErrorsKind::Struct(nested) => {
                collect_errors(&format!("{}.", path), nested, entries);
            },
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_errors(&format!("{}[{}].", path, index), nested, entries);
                }
            },
        }
    }
}

/// Create a library event
///
/// ```text
/// POST /api/v1/libraryevent
/// ```
pub async fn post_library_event(
    State(producer): State<Arc<LibraryEventProducer>>,
    Json(request): Json<LibraryEventRequest>,
) -> Result<Response> {
    let event = request.into_event(LibraryEventType::New)?;

    tracing::info!(book_id = event.book.book_id, "Before sending library event");
    producer.send_library_event(&event)?;

    Ok((StatusCode::CREATED, Json(event)).into_response())
}

/// Update an existing library event
///
/// ```text
/// PUT /api/v1/libraryevent
/// ```
pub async fn put_library_event(
    State(producer): State<Arc<LibraryEventProducer>>,
    Json(request): Json<LibraryEventRequest>,
) -> Result<Response> {
    let event = request.into_event(LibraryEventType::Update)?;
    if event.id.is_none() {
        return Ok((StatusCode::BAD_REQUEST, MISSING_ID_MESSAGE).into_response());
    }

    producer.send_library_event(&event)?;

    Ok((StatusCode::OK, Json(event)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> LibraryEventRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_null_event_type_is_stamped() {
        let event = request(
            r#"{"libraryEventId":null,"libraryEventType":null,"book":{"bookId":456,"bookName":"Kafka Using Spring Boot","bookAuthor":"Dilip"}}"#,
        )
        .into_event(LibraryEventType::New)
        .unwrap();

        assert_eq!(event.event_type, LibraryEventType::New);
        assert_eq!(event.book, Book::new(456, "Kafka Using Spring Boot", "Dilip"));
        assert_eq!(event.id, None);
    }

    #[test]
    fn test_missing_event_type_is_stamped() {
        let event = request(r#"{"libraryEventId":7,"book":{"bookId":1,"bookName":"a","bookAuthor":"b"}}"#)
            .into_event(LibraryEventType::Update)
            .unwrap();

        assert_eq!(event.event_type, LibraryEventType::Update);
        assert_eq!(event.id, Some(7));
    }

    #[test]
    fn test_null_book_fields_are_reported() {
        let err = request(
            r#"{"libraryEventId":null,"book":{"bookId":null,"bookName":null,"bookAuthor":null}}"#,
        )
        .into_event(LibraryEventType::New)
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Validation error: book.bookAuthor - must not be blank, book.bookId - must not be null, book.bookName - must not be blank"
        );
    }

    #[test]
    fn test_blank_names_are_rejected() {
        let err = request(r#"{"book":{"bookId":456,"bookName":"","bookAuthor":"  "}}"#)
            .into_event(LibraryEventType::New)
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Validation error: book.bookAuthor - must not be blank, book.bookName - must not be blank"
        );
    }

    #[test]
    fn test_missing_book_is_rejected() {
        let err = request(r#"{"libraryEventId":null}"#)
            .into_event(LibraryEventType::New)
            .unwrap_err();

        assert!(matches!(err, Error::Validation(ref msg) if msg == "book - must not be null"));
    }
}
