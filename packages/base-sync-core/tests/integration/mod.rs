//! Integration test suite for the synchronization engine.
//!
//! 1. Delivery properties (idempotence, ordering, presence semantics)
//! 2. End-to-end snapshot + notification scenario

pub mod end_to_end_tests;
pub mod helpers;
pub mod property_tests;
