//! Nimbus - cloud-backed task list and generative-AI client core
//!
//! The library half of the crate: a reactive client that keeps a todo
//! collection synchronized with a remote store (live snapshots plus
//! optimistic local overlays) and drives two generative-AI surfaces, a
//! streaming multi-turn conversation and a single-shot structured recipe
//! generation. Transport is abstracted behind the service traits in
//! [`services`]; the bundled [`sandbox`] backend implements them in-process.

pub mod ai;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod records;
pub mod repl;
pub mod sandbox;
pub mod services;

pub use client::Client;
pub use error::RemoteError;
