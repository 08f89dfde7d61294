// src/models/mod.rs

pub mod analytics;
pub mod attempt;
pub mod profile;
pub mod question;
pub mod quiz;
pub mod rbac;
pub mod user;
