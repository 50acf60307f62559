// src/core/mod.rs — Prompt optimization engine

pub mod executor;
pub mod judge;
pub mod ledger;
pub mod optimizer;
pub mod orchestrator;
pub mod parser;
pub mod types;
