//! Integration tests for askdb.

pub mod common;
pub mod config_test;
pub mod mysql_test;
pub mod session_test;
pub mod sqlite_test;
