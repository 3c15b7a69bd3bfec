//! # scpi-proto
//!
//! Protocol-level building blocks for SCPI/IEEE-488.2 style instruments:
//! the error taxonomy, the command-line tokenizer, declared-pattern
//! expansion and typed parameter conversion.
//!
//! This crate is deliberately free of async machinery and I/O — it only
//! turns strings into structure. The instrument engine that consumes it
//! lives in the `scpid` crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use scpi_proto::{expand_optional, line::ParsedCommand, types::FloatSpec};
//!
//! // A declared pattern expands over its optional segments.
//! let variants = expand_optional("SYSTem:ERRor[:NEXT]?");
//! assert_eq!(variants.len(), 2);
//!
//! // A received sub-command splits into a path and raw parameters.
//! let cmd = ParsedCommand::parse("sour:lev 0.5, \"a,b\"").unwrap();
//! assert_eq!(cmd.path, "SOUR:LEV");
//! assert_eq!(cmd.params, vec!["0.5".to_string(), "a,b".to_string()]);
//!
//! // Converters coerce raw parameters, honouring symbolic keywords.
//! let conv = FloatSpec::new().min(0.0).max(100.0).build();
//! assert_eq!(conv.convert("MIN").unwrap(), scpi_proto::Value::Float(0.0));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod line;
pub mod pattern;
pub mod types;

pub use self::error::ScpiError;
pub use self::line::{split_statements, ParsedCommand};
pub use self::pattern::{expand_optional, stem_forms};
pub use self::types::{Args, Converter, EnumSpec, FloatSpec, IntSpec, Value};
