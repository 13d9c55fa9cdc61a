//! Pairs sequenced libraries across runs into analysis units and emits
//! idempotent draft workflow-launch events.

pub mod config;
pub mod dedup;
pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod fastq;
pub mod metadata;
pub mod output;
pub mod pairing;
pub mod sequence;
pub mod workflow;
