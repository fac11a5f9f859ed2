// src/core/mod.rs

pub mod chain;
pub mod parameters;
pub mod paths;
pub mod settings;
pub mod store;
pub mod template;
pub mod variables;
