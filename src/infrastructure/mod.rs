//! Concrete adapters for everything the domain layer only describes as a
//! trait or a shape: durable storage (C7), the paper exchange used by
//! every tenant that isn't wired to a live account (C9), tenant/global
//! config loading, and a tracing-backed notification sink.

pub mod config;
pub mod metrics;
pub mod notify;
pub mod null_exchange;
pub mod paper_exchange;
pub mod persistence;
pub mod sentiment_client;
