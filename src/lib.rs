//! Keipes is the backend of a desktop chat and image-generation client.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns configuration, the provider catalog, encrypted credential
//!   storage, chat history, and the [`core::proxy::ProviderProxy`] that picks
//!   an adapter for the active provider.
//! - [`adapters`] implements the chat and image contracts over the OpenAI,
//!   Anthropic, and Gemini HTTP APIs, plus an offline dummy provider.
//! - [`api`] defines the vendor request/response payloads.
//! - [`mcp`] provides Model Context Protocol integration: a supervised tool
//!   server session over HTTP or WebSocket, and the context-provider service.
//! - [`ipc`] is the typed request boundary a UI process drives, with a
//!   JSON-lines stdio server.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod adapters;
pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod mcp;
pub mod utils;
