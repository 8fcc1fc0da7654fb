//! Integration tests for Consult-Harvest

mod crawl_tests;
