//! `kimchi-engine`: the core of a multi-tenant automated trading engine
//! for a single KRW-denominated spot exchange.
//!
//! Layout follows the teacher's `domain / application / infrastructure /
//! interfaces` split:
//! - [`domain`] — pure indicator math, the signal compositor, the
//!   position/risk state machines and the ledger shapes. No I/O.
//! - [`application`] — the per-tenant trading loop, order executor,
//!   learning pass and the supervisor that owns one of each per tenant.
//! - [`infrastructure`] — concrete adapters: a paper exchange, JSON/JSONL
//!   persistence, a `tracing`-backed notification sink, env-file config.
//! - [`interfaces`] — the HTTP+WS dashboard façade.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
