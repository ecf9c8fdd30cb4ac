#![allow(clippy::too_many_arguments, clippy::collapsible_if, clippy::collapsible_else_if,
         clippy::needless_range_loop, clippy::comparison_chain, clippy::manual_range_contains)]

pub mod m_fixed;
pub mod tables;
pub mod common;
pub mod cvar;
