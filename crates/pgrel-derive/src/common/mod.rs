//! Helpers shared by the derive macros.

pub mod case;
pub mod syn_types;
