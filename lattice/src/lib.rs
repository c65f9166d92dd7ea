//! Building blocks for a whole-program property analysis based on
//! [abstract interpretation](https://en.wikipedia.org/wiki/Abstract_interpretation).
//! This crate defines the ordered value spaces for the derived properties
//! (nullability, modification, immutability grades, independence grades,
//! field finality) and the delayed value wrapper that lets facts flow
//! through the analysis before they are fully resolved.
//!
//! The two core ideas:
//! * Every property value lives in a small totally ordered
//!   [lattice](https://en.wikipedia.org/wiki/Lattice_(order)) where the
//!   bottom element is the most precise guarantee and the top element is
//!   the weakest. Merging control flow branches takes the join (weakest
//!   common guarantee), narrowing on conditions takes the meet.
//! * A fact that depends on a not-yet-analysed program element is not an
//!   error: it is a [`dv::Dv::Delayed`] value carrying the set of causes
//!   blocking it. Delayed values combine with resolved values and stay
//!   delayed until every operand resolves, except when an absorbing
//!   operand short-circuits the combination.

/// Lattice traits and the graded value enums for each property dimension.
pub mod props;

/// Delayed values: resolved-or-pending facts with blocking cause sets.
pub mod dv;

#[cfg(test)]
mod props_tests;

#[cfg(test)]
mod dv_tests;
