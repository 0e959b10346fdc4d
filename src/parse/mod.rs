//! Text parsing — ambiguous numbers, alias tables, unit grammar.

pub mod alias;
pub mod number;
pub mod text;
