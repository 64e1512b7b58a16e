//! Entity records stored in the local database

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logged training session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: i64,
    pub name: String,
    pub date: DateTime<Utc>,
}

/// Workout row before the store assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkout {
    pub name: String,
    pub date: DateTime<Utc>,
}

/// One movement performed inside a workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub workout_id: i64,
    pub name: String,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub weight: Option<f64>, // kg
    pub duration: Option<i64>, // minutes
    pub is_pr: bool,
}

impl Exercise {
    /// weight x reps x sets, missing values count as zero
    pub fn volume(&self) -> f64 {
        let reps = self.reps.unwrap_or(0) as f64;
        let sets = self.sets.unwrap_or(0) as f64;
        self.weight.unwrap_or(0.0) * reps * sets
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExercise {
    pub workout_id: i64,
    pub name: String,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub weight: Option<f64>,
    pub duration: Option<i64>,
}

impl NewExercise {
    /// Blank exercise carrying only catalog targets
    pub fn from_catalog(workout_id: i64, entry: &PredefinedExercise) -> Self {
        Self {
            workout_id,
            name: entry.name.clone(),
            sets: entry.default_sets,
            reps: entry.default_reps,
            weight: None,
            duration: None,
        }
    }
}

/// Catalog entry describing a movement and its default targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredefinedExercise {
    pub id: i64,
    pub name: String,
    pub muscle_group: String,
    pub default_sets: Option<i64>,
    pub default_reps: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPredefinedExercise {
    pub name: String,
    pub muscle_group: String,
    pub default_sets: Option<i64>,
    pub default_reps: Option<i64>,
}

/// Workout template; exercises are referenced by catalog name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredefinedWorkout {
    pub id: i64,
    pub name: String,
    pub exercises: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPredefinedWorkout {
    pub name: String,
    pub exercises: Vec<String>,
}

/// Best known (weight, reps) for an exercise name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub exercise_name: String,
    pub weight: f64,
    pub reps: i64,
    pub date: DateTime<Utc>,
}

/// Field update used by partial patches
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

impl<T> From<Option<T>> for Patch<T> {
    /// `Some` sets the value, `None` clears it
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Clear,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkoutPatch {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Numeric fields of an exercise that the workout screen edits
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExercisePatch {
    pub sets: Patch<i64>,
    pub reps: Patch<i64>,
    pub weight: Patch<f64>,
    pub duration: Patch<i64>,
    pub is_pr: Option<bool>,
}

impl ExercisePatch {
    pub fn is_empty(&self) -> bool {
        self.sets.is_keep()
            && self.reps.is_keep()
            && self.weight.is_keep()
            && self.duration.is_keep()
            && self.is_pr.is_none()
    }
}

/// Scan direction for ordered full-table reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Row shown on the dashboard list
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSummary {
    pub workout: Workout,
    pub exercise_count: usize,
    pub duration_minutes: i64,
}
