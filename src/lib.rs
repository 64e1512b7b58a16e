//! gainz - Personal workout tracker
//!
//! Workouts, exercises and personal records in a local SQLite file, with a
//! terminal dashboard and a command-line front end.

pub mod catalog;
pub mod config;
pub mod db;
pub mod form;
pub mod live;
pub mod seed;
pub mod stats;
pub mod tui;

pub use db::Database;
