//! TTS server: text in, audio file out.
//!
//! A small HTTP service that renders text with either a local espeak-ng
//! engine or Google Translate TTS, keeps the result in a temp directory
//! under a random identifier, and serves or deletes it by that identifier.

pub mod config;
pub mod logger;
pub mod server;
pub mod service;
pub mod store;
pub mod tts;
