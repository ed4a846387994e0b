//! Integration tests for templink-sync
//!
//! Exercises the Change Driver and propagation engine end to end against
//! an in-memory repository with snapshot transactions.

mod common;

mod test_chain;
mod test_atomicity;
