//! # RAG Chat Core
//!
//! Shared, WASM-safe logic for RAG Chat: conversation models, the history
//! eviction policy, slash-command parsing, the retrieval client, and the
//! provenance estimator.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! native-only dependencies. Every external collaborator (completion model,
//! retrieval backend, text extraction, blob persistence) is reached through
//! a trait so the host application decides how it is implemented.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `ConversationEntry`, `RetrievedChunk`, collection ids |
//! | [`command`] | Slash-command parser and help text |
//! | [`history`] | Bounded history eviction policy |
//! | [`retrieval`] | Collection resolution and thresholded search |
//! | [`provenance`] | Chunk → approximate line estimation |
//! | [`completion`] | Chat completion collaborator trait |
//! | [`store`] | JSON blob persistence trait + in-memory store |
//! | [`error`] | Error taxonomy shared by every component |

pub mod command;
pub mod completion;
pub mod error;
pub mod history;
pub mod models;
pub mod provenance;
pub mod retrieval;
pub mod store;

pub use command::Command;
pub use error::{ChatError, Result};
pub use models::{
    CollectionId, CollectionSummary, ConversationEntry, DocumentFile, HistoryLog, RetrievedChunk,
    Role,
};
