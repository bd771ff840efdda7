// src/lib.rs — KitForge library root
//
// Query + budget in, a justified set of in-budget product picks out:
// AI-planned needs, parallel marketplace searches, per-need selection with
// a deterministic fallback, and hard budget enforcement behind an HTTP API.

pub mod api;
pub mod cache;
pub mod cli;
pub mod core;
pub mod infra;
pub mod planner;
pub mod provider;
pub mod search;
pub mod selector;
pub mod util;
