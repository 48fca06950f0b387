#![deny(unused, nonstandard_style, rust_2018_idioms)]

//! The front end of a compiler for Tiger, a small statically-typed,
//! expression-oriented language: a tokenizer and parser producing an
//! abstract syntax tree, and a semantic analyzer translating that tree
//! into a type under scoped value and type environments.

pub mod compiler;
pub mod semantic;
pub mod symbol;
pub mod syntax;
