// src/services/mod.rs

pub mod access;
pub mod attempts;
pub mod engine;
pub mod grading;
pub mod payments;
