// src/handlers/mod.rs

pub mod admin;
pub mod analytics;
pub mod attempt;
pub mod auth;
pub mod profile;
pub mod quiz;
pub mod rbac;
