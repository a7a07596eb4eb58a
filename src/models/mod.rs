// src/models/mod.rs

pub mod access;
pub mod attempt;
pub mod fee_settings;
pub mod message;
pub mod payment;
pub mod question;
pub mod quiz;
pub mod subject;
pub mod user;
pub mod video;
