//! Workshop service-order server library.
//!
//! Records vehicle inspections with photo evidence, generates a PDF report for
//! each one and stores both alongside a database record.

pub mod api;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;

// Test helpers (only available in test mode)
#[cfg(test)]
pub mod test_helpers;
