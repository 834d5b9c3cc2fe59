//! Wire and option types for the pw-agent engine seam.
//!
//! This crate contains the serde-serializable types exchanged between the
//! snapshot/tab core and whichever browser engine drives the pages. These
//! types represent the "protocol layer": the shapes of data as they cross
//! the engine boundary or appear in configuration files.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and display
//! * Engine-neutral: Nothing here names a concrete automation driver
//! * Stable: Changes only when the engine seam changes
//!
//! Behavior is built on top of these types in `pw-agent`.

pub mod options;
pub mod types;

pub use options::*;
pub use types::*;
