// src/core/mod.rs
pub mod catalog;
pub mod engine;
pub mod gate;
pub mod logsink;
pub mod poller;
pub mod service;
pub mod withdraw;
