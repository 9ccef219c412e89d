#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::return_self_not_must_use)]

//! Source-to-source rewriting of CommonJS modules.
//!
//! Free `exports` and `module` references are renamed to private bindings
//! declared near their first use, and free `require("<literal>")` calls are
//! hoisted into one `const` per specifier. The real `module.exports` is
//! re-synchronised once at the end of the file.

pub mod buffer;
pub mod driver;
pub mod error;
pub mod exports;
pub mod imports;
pub mod options;
pub mod parse;
pub mod scope;
mod sourcemap;
pub mod top_level;

pub use driver::{transform, transform_source, TransformOutput};
pub use error::{codes, BoxedParseError, ParseError, TransformError};
pub use options::TransformOptions;
pub use parse::{parse_program, SyntaxTree};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
