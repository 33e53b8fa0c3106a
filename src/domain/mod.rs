//! Core domain types and logic.

pub mod error;
pub mod price;
pub mod universe;
pub mod signals;
pub mod regime;
pub mod factors;
pub mod ranking;
pub mod portfolio;
pub mod construction;
pub mod rebalance;
pub mod performance;
pub mod settings;
