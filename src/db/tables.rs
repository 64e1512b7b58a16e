//! Table primitives: add, get by id, partial update, delete, bulk add and
//! indexed reads. No business rules live here.

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::models::*;
use super::{Database, StoreError, decode_date, encode_date};
use crate::live::{Change, Table};

const WORKOUT_COLUMNS: &str = "id, name, date";
const EXERCISE_COLUMNS: &str = "id, workout_id, name, sets, reps, weight, duration, is_pr";
const PREDEFINED_EXERCISE_COLUMNS: &str = "id, name, muscle_group, default_sets, default_reps";
const PREDEFINED_WORKOUT_COLUMNS: &str = "id, name, exercises";
const RECORD_COLUMNS: &str = "exercise_name, weight, reps, date";

pub(super) fn workout_from_row(row: &Row) -> rusqlite::Result<Workout> {
    let date: String = row.get(2)?;
    Ok(Workout {
        id: row.get(0)?,
        name: row.get(1)?,
        date: decode_date(2, &date)?,
    })
}

fn exercise_from_row(row: &Row) -> rusqlite::Result<Exercise> {
    Ok(Exercise {
        id: row.get(0)?,
        workout_id: row.get(1)?,
        name: row.get(2)?,
        sets: row.get(3)?,
        reps: row.get(4)?,
        weight: row.get(5)?,
        duration: row.get(6)?,
        is_pr: row.get(7)?,
    })
}

fn predefined_exercise_from_row(row: &Row) -> rusqlite::Result<PredefinedExercise> {
    Ok(PredefinedExercise {
        id: row.get(0)?,
        name: row.get(1)?,
        muscle_group: row.get(2)?,
        default_sets: row.get(3)?,
        default_reps: row.get(4)?,
    })
}

fn predefined_workout_from_row(row: &Row) -> rusqlite::Result<PredefinedWorkout> {
    let raw: String = row.get(2)?;
    let exercises = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(PredefinedWorkout {
        id: row.get(0)?,
        name: row.get(1)?,
        exercises,
    })
}

fn record_from_row(row: &Row) -> rusqlite::Result<PersonalRecord> {
    let date: String = row.get(3)?;
    Ok(PersonalRecord {
        exercise_name: row.get(0)?,
        weight: row.get(1)?,
        reps: row.get(2)?,
        date: decode_date(3, &date)?,
    })
}

/// `?, ?, ?` for an any-of clause
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn patch_value<T: Into<Value>>(patch: Patch<T>) -> Option<Value> {
    match patch {
        Patch::Keep => None,
        Patch::Set(v) => Some(v.into()),
        Patch::Clear => Some(Value::Null),
    }
}

// Connection-level writers, shared by single-table methods and by callers
// that batch several writes in one transaction.

pub(crate) fn insert_workout(conn: &Connection, workout: &NewWorkout) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO workouts (name, date) VALUES (?1, ?2)",
        params![workout.name, encode_date(&workout.date)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_exercises(conn: &Connection, rows: &[NewExercise]) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "INSERT INTO exercises (workout_id, name, sets, reps, weight, duration) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut ids = Vec::with_capacity(rows.len());
    for row in rows {
        stmt.execute(params![row.workout_id, row.name, row.sets, row.reps, row.weight, row.duration])?;
        ids.push(conn.last_insert_rowid());
    }
    Ok(ids)
}

pub(crate) fn insert_predefined_exercises(
    conn: &Connection,
    rows: &[NewPredefinedExercise],
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO predefined_exercises (name, muscle_group, default_sets, default_reps) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for row in rows {
        stmt.execute(params![row.name, row.muscle_group, row.default_sets, row.default_reps])?;
    }
    Ok(rows.len())
}

pub(crate) fn insert_predefined_workouts(
    conn: &Connection,
    rows: &[NewPredefinedWorkout],
) -> Result<usize, StoreError> {
    let mut stmt = conn.prepare("INSERT INTO predefined_workouts (name, exercises) VALUES (?1, ?2)")?;
    for row in rows {
        let exercises = serde_json::to_string(&row.exercises)?;
        stmt.execute(params![row.name, exercises])?;
    }
    Ok(rows.len())
}

pub(crate) fn clear_predefined_exercises(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM predefined_exercises", [])
}

pub(crate) fn clear_predefined_workouts(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM predefined_workouts", [])
}

/// Patch `default_reps` on every catalog row with this name
pub(crate) fn set_default_reps_by_name(conn: &Connection, name: &str, reps: Option<i64>) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE predefined_exercises SET default_reps = ?1 WHERE name = ?2",
        params![reps, name],
    )
}

pub(crate) fn write_state(conn: &Connection, key: &str, value: &JsonValue) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO app_state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, encoded],
    )?;
    Ok(())
}

pub(crate) fn remove_exercises_of_workout(conn: &Connection, workout_id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM exercises WHERE workout_id = ?1", [workout_id])
}

impl Database {
    // ---- workouts ----

    pub fn add_workout(&self, workout: &NewWorkout) -> Result<i64, StoreError> {
        let id = insert_workout(self.conn(), workout)?;
        self.publish(Change::workout(Table::Workouts, id));
        Ok(id)
    }

    pub fn get_workout(&self, id: i64) -> Result<Option<Workout>, StoreError> {
        let sql = format!("SELECT {WORKOUT_COLUMNS} FROM workouts WHERE id = ?1");
        let workout = self.conn().query_row(&sql, [id], workout_from_row).optional()?;
        Ok(workout)
    }

    pub fn update_workout(&self, id: i64, patch: &WorkoutPatch) -> Result<(), StoreError> {
        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(name) = &patch.name {
            columns.push("name = ?");
            values.push(Value::Text(name.clone()));
        }
        if let Some(date) = &patch.date {
            columns.push("date = ?");
            values.push(Value::Text(encode_date(date)));
        }

        if columns.is_empty() {
            return match self.get_workout(id)? {
                Some(_) => Ok(()),
                None => Err(StoreError::not_found("workout", id)),
            };
        }

        values.push(Value::Integer(id));
        let sql = format!("UPDATE workouts SET {} WHERE id = ?", columns.join(", "));
        let changed = self.conn().execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(StoreError::not_found("workout", id));
        }
        self.publish(Change::workout(Table::Workouts, id));
        Ok(())
    }

    /// Delete the workout row only; exercises are left alone
    pub fn remove_workout(&self, id: i64) -> Result<bool, StoreError> {
        let removed = self.conn().execute("DELETE FROM workouts WHERE id = ?1", [id])? > 0;
        if removed {
            self.publish(Change::workout(Table::Workouts, id));
        }
        Ok(removed)
    }

    /// Full scan ordered by date
    pub fn workouts_by_date(&self, order: Order) -> Result<Vec<Workout>, StoreError> {
        let sql = format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts ORDER BY date {0}, id {0}",
            order.sql()
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([], workout_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn workouts_named(&self, name: &str) -> Result<Vec<Workout>, StoreError> {
        let sql = format!("SELECT {WORKOUT_COLUMNS} FROM workouts WHERE name = ?1 ORDER BY id");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([name], workout_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ---- exercises ----

    pub fn add_exercise(&self, exercise: &NewExercise) -> Result<i64, StoreError> {
        let ids = self.add_exercises(std::slice::from_ref(exercise))?;
        Ok(ids[0])
    }

    /// Bulk insert in one transaction; returns ids in input order
    pub fn add_exercises(&self, rows: &[NewExercise]) -> Result<Vec<i64>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn().unchecked_transaction()?;
        let ids = insert_exercises(&tx, rows)?;
        tx.commit()?;
        debug!(count = ids.len(), "exercises added");

        let mut workouts: Vec<i64> = rows.iter().map(|r| r.workout_id).collect();
        workouts.sort_unstable();
        workouts.dedup();
        for workout_id in workouts {
            self.publish(Change::workout(Table::Exercises, workout_id));
        }
        Ok(ids)
    }

    pub fn get_exercise(&self, id: i64) -> Result<Option<Exercise>, StoreError> {
        let sql = format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?1");
        let exercise = self.conn().query_row(&sql, [id], exercise_from_row).optional()?;
        Ok(exercise)
    }

    pub fn update_exercise(&self, id: i64, patch: &ExercisePatch) -> Result<(), StoreError> {
        // SQLite stores NaN as NULL and keeps infinities as REAL
        if let Patch::Set(weight) = patch.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(StoreError::InvalidValue { field: "weight", value: weight.to_string() });
            }
        }
        let exercise = self
            .get_exercise(id)?
            .ok_or_else(|| StoreError::not_found("exercise", id))?;

        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        let fields = [
            ("sets = ?", patch_value(patch.sets)),
            ("reps = ?", patch_value(patch.reps)),
            ("weight = ?", patch_value(patch.weight)),
            ("duration = ?", patch_value(patch.duration)),
            ("is_pr = ?", patch.is_pr.map(Value::from)),
        ];
        for (column, value) in fields {
            if let Some(value) = value {
                columns.push(column);
                values.push(value);
            }
        }
        if columns.is_empty() {
            return Ok(());
        }

        values.push(Value::Integer(id));
        let sql = format!("UPDATE exercises SET {} WHERE id = ?", columns.join(", "));
        self.conn().execute(&sql, params_from_iter(values))?;
        self.publish(Change::workout(Table::Exercises, exercise.workout_id));
        Ok(())
    }

    pub fn remove_exercise(&self, id: i64) -> Result<bool, StoreError> {
        let Some(exercise) = self.get_exercise(id)? else {
            return Ok(false);
        };
        self.conn().execute("DELETE FROM exercises WHERE id = ?1", [id])?;
        self.publish(Change::workout(Table::Exercises, exercise.workout_id));
        Ok(true)
    }

    pub fn exercises_of_workout(&self, workout_id: i64) -> Result<Vec<Exercise>, StoreError> {
        let sql = format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE workout_id = ?1 ORDER BY id");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([workout_id], exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn exercises(&self, order: Order) -> Result<Vec<Exercise>, StoreError> {
        let sql = format!("SELECT {EXERCISE_COLUMNS} FROM exercises ORDER BY id {}", order.sql());
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([], exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn remove_exercises_of_workout(&self, workout_id: i64) -> Result<usize, StoreError> {
        let removed = remove_exercises_of_workout(self.conn(), workout_id)?;
        if removed > 0 {
            self.publish(Change::workout(Table::Exercises, workout_id));
        }
        Ok(removed)
    }

    // ---- catalog ----

    pub fn add_predefined_exercises(&self, rows: &[NewPredefinedExercise]) -> Result<usize, StoreError> {
        let tx = self.conn().unchecked_transaction()?;
        let added = insert_predefined_exercises(&tx, rows)?;
        tx.commit()?;
        self.publish(Change::table(Table::PredefinedExercises));
        Ok(added)
    }

    pub fn predefined_exercises(&self) -> Result<Vec<PredefinedExercise>, StoreError> {
        let sql = format!("SELECT {PREDEFINED_EXERCISE_COLUMNS} FROM predefined_exercises ORDER BY id");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([], predefined_exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn predefined_exercises_by_ids(&self, ids: &[i64]) -> Result<Vec<PredefinedExercise>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {PREDEFINED_EXERCISE_COLUMNS} FROM predefined_exercises WHERE id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(ids), predefined_exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn predefined_exercises_by_names<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<PredefinedExercise>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {PREDEFINED_EXERCISE_COLUMNS} FROM predefined_exercises WHERE name IN ({}) ORDER BY id",
            placeholders(names.len())
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(names.iter().map(|n| n.as_ref())), predefined_exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn predefined_exercises_in_group(&self, muscle_group: &str) -> Result<Vec<PredefinedExercise>, StoreError> {
        let sql = format!(
            "SELECT {PREDEFINED_EXERCISE_COLUMNS} FROM predefined_exercises WHERE muscle_group = ?1 ORDER BY id"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([muscle_group], predefined_exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn add_predefined_workouts(&self, rows: &[NewPredefinedWorkout]) -> Result<usize, StoreError> {
        let tx = self.conn().unchecked_transaction()?;
        let added = insert_predefined_workouts(&tx, rows)?;
        tx.commit()?;
        self.publish(Change::table(Table::PredefinedWorkouts));
        Ok(added)
    }

    pub fn predefined_workouts(&self) -> Result<Vec<PredefinedWorkout>, StoreError> {
        let sql = format!("SELECT {PREDEFINED_WORKOUT_COLUMNS} FROM predefined_workouts ORDER BY id");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([], predefined_workout_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_predefined_workout(&self, id: i64) -> Result<Option<PredefinedWorkout>, StoreError> {
        let sql = format!("SELECT {PREDEFINED_WORKOUT_COLUMNS} FROM predefined_workouts WHERE id = ?1");
        let template = self
            .conn()
            .query_row(&sql, [id], predefined_workout_from_row)
            .optional()?;
        Ok(template)
    }

    // ---- app state ----

    pub fn get_state(&self, key: &str) -> Result<Option<JsonValue>, StoreError> {
        let raw: Option<String> = self
            .conn()
            .query_row("SELECT value FROM app_state WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_state(&self, key: &str, value: &JsonValue) -> Result<(), StoreError> {
        write_state(self.conn(), key, value)?;
        self.publish(Change::table(Table::AppState));
        Ok(())
    }

    // ---- personal records ----

    pub fn get_record(&self, exercise_name: &str) -> Result<Option<PersonalRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM personal_records WHERE exercise_name = ?1");
        let record = self
            .conn()
            .query_row(&sql, [exercise_name], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// Plain insert; a second record for the same name is a constraint violation
    pub fn insert_record(&self, record: &PersonalRecord) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO personal_records (exercise_name, weight, reps, date) VALUES (?1, ?2, ?3, ?4)",
            params![record.exercise_name, record.weight, record.reps, encode_date(&record.date)],
        )?;
        self.publish(Change::table(Table::PersonalRecords));
        Ok(())
    }

    /// Insert or replace the record for its exercise name
    pub fn put_record(&self, record: &PersonalRecord) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO personal_records (exercise_name, weight, reps, date) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(exercise_name) DO UPDATE SET
                weight = excluded.weight, reps = excluded.reps, date = excluded.date",
            params![record.exercise_name, record.weight, record.reps, encode_date(&record.date)],
        )?;
        self.publish(Change::table(Table::PersonalRecords));
        Ok(())
    }

    pub fn personal_records(&self) -> Result<Vec<PersonalRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM personal_records ORDER BY exercise_name");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
