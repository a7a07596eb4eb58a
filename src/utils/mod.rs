// src/utils/mod.rs

pub mod file_magic;
pub mod hash;
pub mod html;
pub mod jwt;
