// src/core/mod.rs — Build pipeline core

pub mod budget;
pub mod orchestrator;
pub mod types;
