//! Core of a reading and listening app: a local library of processed
//! documents, resumable page ingestion from a remote processing service, and
//! a playback state machine that reads pages aloud with word highlighting.

pub mod cancellation;
pub mod config;
pub mod geometry;
pub mod ingestion;
pub mod library;
pub mod playback;
pub mod service;
pub mod speech;
pub mod store;
pub mod text_utils;
