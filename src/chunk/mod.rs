pub mod audit;
pub mod config;
pub mod conflict;
pub mod eclipse;
pub mod evaluator;
pub mod failure;
pub mod fsops;
pub mod naming;
pub mod paths;
pub mod reconcile;
pub mod reconcile_registry;
pub mod registry;
pub mod rewrite;
pub mod tables;
pub mod uri;
pub mod util;

#[cfg(test)]
mod testing;
