//! Transport integration tests

mod rest_test;
