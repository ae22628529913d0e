//! Process-level assembly and edge error reporting.

pub mod error;
pub mod site;
