pub mod analysis;
pub mod diag;
pub mod facts;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod sema;

#[cfg(test)]
mod lexer_tests;

#[cfg(test)]
mod parser_tests;

#[cfg(test)]
mod analysis_tests;

#[cfg(test)]
pub mod test_utils;
