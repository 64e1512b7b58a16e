//! Workout screen form state - one typed draft per exercise id

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::{Database, Exercise, ExercisePatch, Patch, SaveOutcome, StoreError};

/// Editable numeric field of an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Sets,
    Reps,
    Weight,
    Duration,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::Sets => "sets",
            Field::Reps => "reps",
            Field::Weight => "weight",
            Field::Duration => "duration",
        }
    }

    pub fn all() -> &'static [Field] {
        &[Field::Sets, Field::Reps, Field::Weight, Field::Duration]
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("exercise {0} is not part of this workout")]
    UnknownExercise(i64),
    #[error("invalid {field} value: {input:?}")]
    InvalidNumber { field: &'static str, input: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Unsaved values for one exercise
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExerciseDraft {
    pub name: String,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    pub weight: Option<f64>,
    pub duration: Option<i64>,
    pub is_pr: bool,
}

impl ExerciseDraft {
    pub fn from_exercise(exercise: &Exercise) -> Self {
        Self {
            name: exercise.name.clone(),
            sets: exercise.sets,
            reps: exercise.reps,
            weight: exercise.weight,
            duration: exercise.duration,
            is_pr: exercise.is_pr,
        }
    }

    /// Text shown in an input box; empty when unset
    pub fn display(&self, field: Field) -> String {
        match field {
            Field::Sets => self.sets.map(|v| v.to_string()),
            Field::Reps => self.reps.map(|v| v.to_string()),
            Field::Weight => self.weight.map(|v| v.to_string()),
            Field::Duration => self.duration.map(|v| v.to_string()),
        }
        .unwrap_or_default()
    }

    /// Parse user input into the field; empty input clears it
    pub fn set(&mut self, field: Field, input: &str) -> Result<(), FormError> {
        match field {
            Field::Sets => self.sets = parse_count(field, input)?,
            Field::Reps => self.reps = parse_count(field, input)?,
            Field::Duration => self.duration = parse_count(field, input)?,
            Field::Weight => self.weight = parse_weight(input)?,
        }
        Ok(())
    }

    /// Patch writing every numeric field as drafted
    pub fn to_patch(&self) -> ExercisePatch {
        ExercisePatch {
            sets: Patch::from(self.sets),
            reps: Patch::from(self.reps),
            weight: Patch::from(self.weight),
            duration: Patch::from(self.duration),
            is_pr: None,
        }
    }
}

fn invalid(field: Field, input: &str) -> FormError {
    FormError::InvalidNumber {
        field: field.label(),
        input: input.to_string(),
    }
}

fn parse_count(field: Field, input: &str) -> Result<Option<i64>, FormError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    match input.parse::<i64>() {
        Ok(value) if value >= 0 => Ok(Some(value)),
        _ => Err(invalid(field, input)),
    }
}

/// Accepts a decimal comma as well as a point
pub fn parse_weight(input: &str) -> Result<Option<f64>, FormError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    match input.replace(',', ".").parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(Some(value)),
        _ => Err(invalid(Field::Weight, input)),
    }
}

/// Drafts for every exercise of one workout
#[derive(Debug, Clone)]
pub struct WorkoutForm {
    workout_id: i64,
    drafts: BTreeMap<i64, ExerciseDraft>,
}

impl WorkoutForm {
    pub fn new(workout_id: i64, exercises: &[Exercise]) -> Self {
        let mut form = Self { workout_id, drafts: BTreeMap::new() };
        form.sync(exercises);
        form
    }

    pub fn workout_id(&self) -> i64 {
        self.workout_id
    }

    /// Replace drafts with the stored rows
    pub fn sync(&mut self, exercises: &[Exercise]) {
        self.drafts = exercises
            .iter()
            .filter(|e| e.workout_id == self.workout_id)
            .map(|e| (e.id, ExerciseDraft::from_exercise(e)))
            .collect();
    }

    pub fn draft(&self, exercise_id: i64) -> Option<&ExerciseDraft> {
        self.drafts.get(&exercise_id)
    }

    pub fn set_field(&mut self, exercise_id: i64, field: Field, input: &str) -> Result<(), FormError> {
        self.drafts
            .get_mut(&exercise_id)
            .ok_or(FormError::UnknownExercise(exercise_id))?
            .set(field, input)
    }

    /// Persist the draft and run the personal record check
    pub fn save(&mut self, db: &Database, exercise_id: i64, now: DateTime<Utc>) -> Result<SaveOutcome, FormError> {
        let draft = self
            .drafts
            .get(&exercise_id)
            .ok_or(FormError::UnknownExercise(exercise_id))?;
        let outcome = db.save_exercise(exercise_id, &draft.to_patch(), now)?;

        self.drafts
            .insert(exercise_id, ExerciseDraft::from_exercise(&outcome.exercise));
        Ok(outcome)
    }
}
