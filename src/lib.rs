//! # Stackalign
//!
//! Aligns a stack of serial section images into a coherent volume by
//! driving external registration tools through an asynchronous, staged
//! pipeline.
//!
//! ## Usage
//!
//! ```bash
//! stackalign --slice-range 50 70 60 -i slices/ -d work/
//! ```
//!
//! ## Modules
//!
//! - `range` - The slice interval under alignment and its reference slice
//! - `chain` - Neighbor pairing and transform chain resolution
//! - `command` - Argument templates for the external registration tools
//! - `layout` - Work directory and filename conventions
//! - `config` - Run options, YAML loading and validation
//! - `executor` - Asynchronous command execution with bounded concurrency
//! - `pipeline` - Staged orchestration of an alignment run
//! - `report` - JSON execution report
//! - `cli` - Flag parsing and option merging
pub mod chain;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod layout;
pub mod pipeline;
pub mod range;
pub mod report;
