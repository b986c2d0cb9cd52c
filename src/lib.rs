//! Dawbrei lets you define character personas, keep each one as a JSON file,
//! and chat with them through an OpenAI-compatible completion API while a
//! local speech program reads the replies aloud.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`character`] holds the persona type, the JSON file store, and the
//!   in-memory registry with its current selection.
//! - [`core`] owns the session controller plus the completion and speech
//!   collaborators it drives, and the TOML configuration.
//! - [`auth`] resolves the API key from the environment, the system keyring,
//!   or a prompt.
//! - [`api`] defines the chat-completion payloads.
//! - [`utils`] has the optional chat transcript writer.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which
//! parses arguments and runs the line-based chat loop in [`cli::chat`].

pub mod api;
pub mod auth;
pub mod character;
pub mod cli;
pub mod core;
pub mod utils;
