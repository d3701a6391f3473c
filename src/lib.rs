//! # RAG Chat
//!
//! A retrieval-augmented chat front-end over a course document collection.
//!
//! Each user prompt may start with a slash-command (`/source`, `/find`,
//! `/explain`, `/reset`, `/help`). Plain prompts and most commands retrieve
//! the closest chunks from a remote collection, hand them to a chat model
//! together with the bounded session history, and return the answer;
//! `/source` and `/find` also estimate where in each document the chunks
//! come from.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────┐   ┌──────────┐    ┌────────────────────┐    ┌──────────────┐
//!  │   HTTP   │──▶│          │───▶│ RetrievalClient    │───▶│ Albert /     │
//!  │  (axum)  │   │ Session  │    │ (rag-chat-core)    │    │ OpenAI-style │
//!  └──────────┘   │ Orches-  │───▶│ ChatCompletion     │───▶│ REST APIs    │
//!  ┌──────────┐   │ trator   │    └────────────────────┘    └──────────────┘
//!  │   CLI    │──▶│          │───▶ HistoryStore ──▶ FileBlobStore (JSON files)
//!  │(ragchat) │   │          │───▶ provenance  ──▶ FileExtractor (PDF, OOXML)
//!  └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragchat collection refresh        # upload ./data/documents
//! ragchat ask "/source what is a gaussian?"
//! ragchat serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`session`] | Turn orchestration |
//! | [`history`] | Per-session history persistence |
//! | [`blob_store`] | JSON file blob store |
//! | [`completion`] | OpenAI-compatible chat client |
//! | [`retrieval`] | Albert REST retrieval backend |
//! | [`extract`] | Page-wise document text extraction |
//! | [`documents`] | Document directory scanning |
//! | [`commands`] | CLI command implementations |
//! | [`server`] | HTTP server |

pub mod blob_store;
pub mod commands;
pub mod completion;
pub mod config;
pub mod documents;
pub mod extract;
pub mod history;
pub mod retrieval;
pub mod server;
pub mod session;
