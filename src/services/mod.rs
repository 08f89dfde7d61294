// src/services/mod.rs

pub mod analytics;
pub mod attempt;
pub mod eligibility;
pub mod quiz;
pub mod rbac;
pub mod scoring;
