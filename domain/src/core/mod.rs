//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`]: the provider model and its context budget
//! - [`tokenizer::Tokenizer`]: token counting against a model
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod model;
pub mod tokenizer;
