//! Seed runner - brings the catalog tables up to the built-in catalog
//!
//! The applied seed version lives in `app_state` under `seedVersion`. Each
//! pending step runs in its own transaction and is safe to re-run. The
//! version marker is only written once every pending step has committed, so
//! a failed run is retried from the stored version on the next start.

use rusqlite::Connection;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::{self, TEMPLATES};
use crate::db::tables::{
    clear_predefined_exercises, clear_predefined_workouts, insert_predefined_exercises,
    insert_predefined_workouts, set_default_reps_by_name, write_state,
};
use crate::db::{Database, NewPredefinedExercise, NewPredefinedWorkout, StoreError};
use crate::live::{Change, Table};

pub const LATEST_SEED_VERSION: i64 = 4;
pub const SEED_VERSION_KEY: &str = "seedVersion";

type StepFn = fn(&Connection) -> Result<(), StoreError>;

struct SeedStep {
    version: i64,
    description: &'static str,
    apply: StepFn,
}

const STEPS: &[SeedStep] = &[
    SeedStep {
        version: 3,
        description: "restore catalog and templates",
        apply: restore_catalog,
    },
    SeedStep {
        version: 4,
        description: "single default rep count",
        apply: refresh_default_reps,
    },
];

/// Outcome of a seed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub from: i64,
    pub to: i64,
    pub applied: Vec<i64>,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.from == self.to
    }
}

/// Stored seed version, 0 when never seeded
pub fn stored_version(db: &Database) -> Result<i64, StoreError> {
    match db.get_state(SEED_VERSION_KEY)? {
        None => Ok(0),
        Some(value) => match value.as_i64() {
            Some(version) => Ok(version),
            None => {
                warn!(%value, "seed version is not an integer, treating as 0");
                Ok(0)
            }
        },
    }
}

/// Apply pending seed steps
pub fn run(db: &Database) -> Result<SeedReport, StoreError> {
    run_steps(db, STEPS, LATEST_SEED_VERSION)
}

fn run_steps(db: &Database, steps: &[SeedStep], latest: i64) -> Result<SeedReport, StoreError> {
    let from = stored_version(db)?;
    if from >= latest {
        debug!(version = from, "catalog up to date");
        return Ok(SeedReport { from, to: from, applied: Vec::new() });
    }

    let mut applied = Vec::new();
    for step in steps.iter().filter(|s| s.version > from && s.version <= latest) {
        info!(version = step.version, step = step.description, "applying seed step");
        let tx = db.conn().unchecked_transaction()?;
        (step.apply)(&tx)?;
        tx.commit()?;
        applied.push(step.version);

        db.publish(Change::table(Table::PredefinedExercises));
        db.publish(Change::table(Table::PredefinedWorkouts));
    }

    write_state(db.conn(), SEED_VERSION_KEY, &json!(latest))?;
    db.publish(Change::table(Table::AppState));
    info!(from, to = latest, "catalog seeded");

    Ok(SeedReport { from, to: latest, applied })
}

/// Clear both catalog tables and repopulate them
fn restore_catalog(conn: &Connection) -> Result<(), StoreError> {
    clear_predefined_exercises(conn)?;
    clear_predefined_workouts(conn)?;

    let exercises: Vec<NewPredefinedExercise> =
        catalog::all_exercises().iter().map(|e| e.to_row()).collect();
    insert_predefined_exercises(conn, &exercises)?;

    let templates: Vec<NewPredefinedWorkout> = TEMPLATES.iter().map(|t| t.to_row()).collect();
    insert_predefined_workouts(conn, &templates)?;
    Ok(())
}

/// Rewrite default reps on existing rows, matched by name
fn refresh_default_reps(conn: &Connection) -> Result<(), StoreError> {
    for exercise in catalog::all_exercises() {
        set_default_reps_by_name(conn, exercise.name, Some(exercise.default_reps))?;
    }
    Ok(())
}
