//! Data models for the library events pipeline
//!
//! This module contains the domain models shared by the producer, the
//! consumer pipeline and the event store.

pub mod library_event;

// Re-export commonly used types
pub use library_event::{Book, LibraryEvent, LibraryEventType};
