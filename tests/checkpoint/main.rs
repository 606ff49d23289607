//! Integration tests for partition checkpointing.
//!
//! These exercise the coordinator end to end: local store, ownership map,
//! codec, and a real `object_store` backend (in-memory or local
//! filesystem), including restarts simulated by a second node sharing the
//! same storage.
//!
//! Unit tests in crates/*/src cover the codec, channels, signature parsing
//! and retry loop in isolation.

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod retry;
mod roundtrip;
mod signatures;
