// src/lib.rs

pub mod db;
pub mod eventbus;
pub mod gateway;
pub mod http;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use db::Database;
pub use gradlink_common::error::Error;
