//! Domain logic: which units a formatter applies to, which runtime it runs under, and the
//! process that would run it.
//!
//! This crate owns *what* gets formatted and *how the invocation looks*. It never executes
//! anything; that's the `fmtchain-core` crate.

mod field_set;
mod formatters;
mod options;
mod process;
mod runtime;
mod selector;

pub use field_set::{FieldSet, SelectionError};
pub use formatters::{
    ExitCodePolicy, Formatter, FormatterArgs, FormatterMeta, FormatterRegistry,
    builtin_formatter_metas, builtin_formatters,
};
pub use options::{FormatterOptions, FormatterOptionsInput, ToolConstraints};
pub use process::{build_process, pluralize};
pub use runtime::{UnitDefaults, resolve_runtime, unit_constraints};
pub use selector::select;
