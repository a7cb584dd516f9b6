//! Domain logic for ComfyUI batch runs.
//!
//! Loads batch files and workflow templates, resolves parameter
//! bindings, and patches job graphs. Nothing in this crate touches the
//! network.

pub mod batch;
pub mod binding;
pub mod error;
pub mod naming;
pub mod workflow;
