// src/utils/mod.rs
pub mod precision;
