//! Naskah: a self-hosted curriculum administration assistant.
//!
//! Staff converse with a hosted language model through a browser
//! interface; replies are rendered line by line into structured,
//! letterheaded administrative documents that can be downloaded as
//! Word-compatible files or printed directly.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
