//! # Knowledge Retrieval Service
//!
//! An enterprise knowledge retrieval service: employees ask questions in a
//! chat platform, the service answers by retrieving passages ingested from a
//! wiki source, and learns from explicit and implicit feedback over time.
//!
//! ## Core loop
//!
//! - [`chunker`] (C2) converts page markup into ordered chunks.
//! - [`ingestion`] (C3) syncs wiki spaces into the [`ports::GraphStore`] (C4).
//! - [`retriever`] (C5) runs hybrid search with quality-boosted ranking.
//! - [`quality`] (C6) folds feedback and behavioral signals into per-chunk
//!   quality scores.
//! - [`lifecycle`] (C7) archives stale chunks and detects content conflicts.
//! - [`orchestrator`] (C8) binds a chat surface to retrieval and generation.
//! - [`escalation`] (C9) routes negative feedback to content owners.
//!
//! Provider seams ([`ports`]) are resolved at startup; [`stores`] ships
//! in-process reference implementations of the two storage ports for tests
//! and local development.

pub mod chunker;
pub mod config;
pub mod domain;
pub mod error;
pub mod escalation;
pub mod ingestion;
pub mod lifecycle;
pub mod orchestrator;
pub mod ports;
pub mod quality;
pub mod retriever;
pub mod stores;
pub mod telemetry;

pub use config::ServiceConfig;
pub use error::KnowledgeError;
