//! Labeling of captured SAE J1939 traffic.
//!
//! The dataset collection groups its candump captures by the layer an
//! attack targets (application, network, data-link/transport, wireless)
//! plus a normal-drive baseline. This crate parses those captures, decodes
//! the J1939 identifiers and labels each message with YAML-defined rules.

// Layer modules
pub mod data_link; // candump capture parsing
pub mod labeling; // rule engine and CSV output
pub mod network; // J1939 identifier decoding

// Re-exports for convenience
pub use data_link::candump;
pub use labeling::{Labeler, LabelerConfig, Record, Summary};
pub use network::j1939;

// Common types and traits
pub mod dataset;
pub mod error;
pub mod types;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
