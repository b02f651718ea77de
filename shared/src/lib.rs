//! Shared utilities for the object gateway workspace

pub mod observability;
