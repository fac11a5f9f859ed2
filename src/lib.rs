//! runbox stores reusable script actions and runs them with parameters,
//! secrets, workspace context and output chaining.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
