//! Entity shapes and their static storage mapping.
//!
//! # Responsibility
//! - Define the `Entity` contract consumed by the query engine.
//! - Hold immutable descriptors mapping fields and relations to columns.
//! - Provide the sample `Branch` / `Employee` shapes.
//!
//! # Invariants
//! - Every persisted entity has exactly one positive primary key.
//! - Descriptors are built once as statics and never mutated.

pub mod branch;
pub mod descriptor;
pub mod employee;
pub mod entity;
pub mod value;
