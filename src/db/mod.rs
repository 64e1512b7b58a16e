//! Database module - SQLite storage for workouts, catalog and records

pub mod models;
mod queries;
pub(crate) mod tables;

pub use models::{
    Exercise, ExercisePatch, NewExercise, NewPredefinedExercise, NewPredefinedWorkout, NewWorkout,
    Order, Patch, PersonalRecord, PredefinedExercise, PredefinedWorkout, Workout, WorkoutPatch,
    WorkoutSummary,
};
pub use queries::SaveOutcome;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::live::{Change, ChangeHub};

/// Bumped whenever the table layout below changes
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS workouts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_workouts_name ON workouts(name);
CREATE INDEX IF NOT EXISTS idx_workouts_date ON workouts(date);

CREATE TABLE IF NOT EXISTS exercises (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workout_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    sets INTEGER,
    reps INTEGER,
    weight REAL,
    duration INTEGER,
    is_pr INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_exercises_workout_id ON exercises(workout_id);
CREATE INDEX IF NOT EXISTS idx_exercises_name ON exercises(name);

CREATE TABLE IF NOT EXISTS predefined_exercises (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    muscle_group TEXT NOT NULL,
    default_sets INTEGER,
    default_reps INTEGER
);
CREATE INDEX IF NOT EXISTS idx_predefined_exercises_name ON predefined_exercises(name);
CREATE INDEX IF NOT EXISTS idx_predefined_exercises_muscle_group ON predefined_exercises(muscle_group);

CREATE TABLE IF NOT EXISTS predefined_workouts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    exercises TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_predefined_workouts_name ON predefined_workouts(name);

CREATE TABLE IF NOT EXISTS app_state (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS personal_records (
    exercise_name TEXT PRIMARY KEY NOT NULL,
    weight REAL NOT NULL,
    reps INTEGER NOT NULL,
    date TEXT NOT NULL
);
";

/// Store failures surfaced to callers
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),
    #[error("storage unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("constraint violated: {0}")]
    ConstraintViolation(String),
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("failed to encode stored value: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store handle closed")]
    Closed,
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
                StoreError::ConstraintViolation(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => StoreError::Unavailable(err),
        }
    }
}

/// Database handle; owns the connection and the change hub
pub struct Database {
    conn: Connection,
    hub: ChangeHub,
}

impl Database {
    /// Open or create database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        debug!(path = %path.display(), "opening database");
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self { conn, hub: ChangeHub::new() };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), StoreError> {
        let version = self.schema_version()?;
        self.conn.execute_batch(SCHEMA)?;

        if version < SCHEMA_VERSION {
            self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            info!(from = version, to = SCHEMA_VERSION, "database schema upgraded");
        }
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i32, StoreError> {
        let version = self.conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    /// Close the connection, reporting any error SQLite raises on shutdown
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, err)| StoreError::from(err))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.hub.subscribe()
    }

    pub(crate) fn publish(&self, change: Change) {
        self.hub.publish(change);
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Fixed-width UTC timestamp so text order matches time order
pub(crate) fn encode_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn decode_date(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
