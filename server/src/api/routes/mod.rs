//! API route handlers

pub mod health;
pub mod operators;
pub mod schemas;
