//! Test helpers module
//!
//! This module provides utilities and helpers for testing the i18n engine.
//! It includes a mock OneSky server, sample catalogs and cache doubles.

#![allow(dead_code)]

pub mod onesky_mock;
pub mod simple_test;
pub mod test_data;

pub use onesky_mock::*;
pub use simple_test::*;
pub use test_data::*;
