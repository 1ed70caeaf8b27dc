//! Command handlers for the Manifold CLI.

pub mod compile;
pub mod demo;

// Re-export command types for convenience
pub use compile::CompileCommand;
pub use demo::DemoRunCommand;
