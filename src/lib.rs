// src/lib.rs — Library root for promptloop

pub mod cli;
pub mod core;
pub mod infra;
pub mod provider;
pub mod template;
