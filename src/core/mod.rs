//! Core模块 - 包含所有核心业务逻辑

pub mod aggregator;
pub mod collision;
pub mod error;
pub mod models;
pub mod profile;
pub mod report;
pub mod rule_engine;
pub mod sector;

#[cfg(test)]
pub(crate) mod fixtures;
#[cfg(test)]
mod review_scenarios;
