//! # System Interaction Layer
//!
//! The boundary between the action logic and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: prepares and launches one action run, and cleans up after it.
//! - **`runtime`**: picks the interpreter for a language on a platform, including
//!   Python virtual environment discovery and Windows bash detection.
//! - **`terminal`**: runs a process inside a pseudo-terminal that can be disposed.
//! - **`secrets`**: the secret store used for secret-backed environment values.
//! - **`output`**: the sink that captured output is forwarded to.

pub mod executor;
pub mod output;
pub mod runtime;
pub mod secrets;
pub mod terminal;
