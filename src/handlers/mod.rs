// src/handlers/mod.rs

pub mod admin;
pub mod attempts;
pub mod auth;
pub mod fee_settings;
pub mod messages;
pub mod payments;
pub mod profile;
pub mod students;
pub mod subjects;
