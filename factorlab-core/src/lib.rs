//! FactorLab Core — domain types, data supply, factor chains, the order
//! state machine, and the capital ledger.
//!
//! This crate contains the heart of the simulation engine:
//! - Domain types (symbols, bars, price series, orders, actions)
//! - Parquet series store and the supplier that merges remote fetches
//! - Buy/sell factor traits with a string-id factory
//! - Per-symbol order state machine emitting candidate transitions
//! - Single shared capital ledger with commission accounting
//!
//! Orchestration (parallel fan-out, serialized ledger replay) lives in
//! `factorlab-runner`.

pub mod data;
pub mod domain;
pub mod engine;
pub mod factors;
