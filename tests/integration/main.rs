//! Integration tests for Shelf-Harvest
//!
//! These tests use wiremock servers as storefronts and tempfile databases,
//! and run whole harvests through the orchestrator.

mod harvest_tests;
