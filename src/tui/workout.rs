//! Workout detail: per-exercise inputs, date, catalog picker

use std::collections::BTreeSet;

use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone, Utc};
use crossterm::event::KeyCode;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};
use tracing::info;

use super::{Action, Route};
use crate::db::{Database, Exercise, PredefinedExercise, Workout};
use crate::form::{Field, WorkoutForm};
use crate::live::{LiveQuery, QueryKey, Table as DbTable};

enum Mode {
    Browse,
    Edit { field: Field, buffer: String },
    Date { buffer: String },
    Picker(Picker),
}

/// Multi-select over the catalog, grouped by muscle group
struct Picker {
    entries: Vec<PredefinedExercise>,
    cursor: usize,
    chosen: BTreeSet<i64>,
}

impl Picker {
    fn load(db: &Database) -> Result<Self> {
        let entries = db
            .catalog_by_muscle_group()?
            .into_iter()
            .flat_map(|(_, entries)| entries)
            .collect();
        Ok(Self { entries, cursor: 0, chosen: BTreeSet::new() })
    }

    fn toggle(&mut self) {
        if let Some(entry) = self.entries.get(self.cursor)
            && !self.chosen.remove(&entry.id)
        {
            self.chosen.insert(entry.id);
        }
    }
}

pub struct WorkoutScreen {
    workout_id: i64,
    workout_query: LiveQuery<Option<Workout>>,
    exercises_query: LiveQuery<Vec<Exercise>>,
    workout: Option<Workout>,
    exercises: Vec<Exercise>,
    form: WorkoutForm,
    selected: usize,
    mode: Mode,
    notice: Option<String>,
}

impl WorkoutScreen {
    /// `None` when the workout does not exist
    pub fn open(db: &Database, workout_id: i64) -> Result<Option<Self>> {
        let Some(workout) = db.get_workout(workout_id)? else {
            return Ok(None);
        };

        let workout_query = LiveQuery::new(
            db,
            QueryKey::tables(&[DbTable::Workouts]).for_workout(workout_id),
            move |db: &Database| db.get_workout(workout_id),
        );
        let exercises_query = LiveQuery::new(
            db,
            QueryKey::tables(&[DbTable::Exercises]).for_workout(workout_id),
            move |db: &Database| db.workout_exercises(workout_id),
        );
        let exercises = exercises_query.fetch(db)?;

        Ok(Some(Self {
            workout_id,
            workout_query,
            exercises_query,
            workout: Some(workout),
            form: WorkoutForm::new(workout_id, &exercises),
            exercises,
            selected: 0,
            mode: Mode::Browse,
            notice: None,
        }))
    }

    pub fn workout_id(&self) -> i64 {
        self.workout_id
    }

    pub fn workout(&self) -> Option<&Workout> {
        self.workout.as_ref()
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn form(&self) -> &WorkoutForm {
        &self.form
    }

    pub fn is_browsing(&self) -> bool {
        matches!(self.mode, Mode::Browse)
    }

    /// One-shot message for the status line
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn refresh(&mut self, db: &Database) -> Result<()> {
        if let Some(workout) = self.workout_query.poll(db)? {
            self.workout = workout;
        }
        if let Some(exercises) = self.exercises_query.poll(db)? {
            self.form.sync(&exercises);
            self.exercises = exercises;
            self.selected = self.selected.min(self.exercises.len().saturating_sub(1));
        }
        Ok(())
    }

    fn selected_id(&self) -> Option<i64> {
        self.exercises.get(self.selected).map(|e| e.id)
    }

    pub fn handle_key(&mut self, db: &Database, code: KeyCode) -> Result<Action> {
        match std::mem::replace(&mut self.mode, Mode::Browse) {
            Mode::Browse => self.browse_key(db, code),
            Mode::Edit { field, mut buffer } => {
                match code {
                    KeyCode::Enter => self.save_field(db, field, &buffer)?,
                    KeyCode::Esc => {}
                    KeyCode::Backspace => {
                        buffer.pop();
                        self.mode = Mode::Edit { field, buffer };
                    }
                    KeyCode::Char(c) => {
                        buffer.push(c);
                        self.mode = Mode::Edit { field, buffer };
                    }
                    _ => self.mode = Mode::Edit { field, buffer },
                }
                Ok(Action::None)
            }
            Mode::Date { mut buffer } => {
                match code {
                    KeyCode::Enter => self.save_date(db, &buffer)?,
                    KeyCode::Esc => {}
                    KeyCode::Backspace => {
                        buffer.pop();
                        self.mode = Mode::Date { buffer };
                    }
                    KeyCode::Char(c) => {
                        buffer.push(c);
                        self.mode = Mode::Date { buffer };
                    }
                    _ => self.mode = Mode::Date { buffer },
                }
                Ok(Action::None)
            }
            Mode::Picker(mut picker) => {
                match code {
                    KeyCode::Enter => {
                        let ids: Vec<i64> = picker.chosen.iter().copied().collect();
                        if !ids.is_empty() {
                            db.add_catalog_exercises(self.workout_id, &ids)?;
                        }
                    }
                    KeyCode::Esc => {}
                    KeyCode::Char(' ') => {
                        picker.toggle();
                        self.mode = Mode::Picker(picker);
                    }
                    KeyCode::Char('j') | KeyCode::Down => {
                        if picker.cursor + 1 < picker.entries.len() {
                            picker.cursor += 1;
                        }
                        self.mode = Mode::Picker(picker);
                    }
                    KeyCode::Char('k') | KeyCode::Up => {
                        picker.cursor = picker.cursor.saturating_sub(1);
                        self.mode = Mode::Picker(picker);
                    }
                    _ => self.mode = Mode::Picker(picker),
                }
                Ok(Action::None)
            }
        }
    }

    fn browse_key(&mut self, db: &Database, code: KeyCode) -> Result<Action> {
        let field = match code {
            KeyCode::Char('s') => Some(Field::Sets),
            KeyCode::Char('r') => Some(Field::Reps),
            KeyCode::Char('w') => Some(Field::Weight),
            KeyCode::Char('m') => Some(Field::Duration),
            _ => None,
        };
        if let Some(field) = field {
            if let Some(draft) = self.selected_id().and_then(|id| self.form.draft(id)) {
                self.mode = Mode::Edit { field, buffer: draft.display(field) };
            }
            return Ok(Action::None);
        }

        match code {
            KeyCode::Char('q') | KeyCode::Char('f') | KeyCode::Esc => {
                return Ok(Action::Navigate(Route::Dashboard));
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected + 1 < self.exercises.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Char('t') => {
                let buffer = self
                    .workout
                    .as_ref()
                    .map(|w| w.date.with_timezone(&Local).format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                self.mode = Mode::Date { buffer };
            }
            KeyCode::Char('a') => self.mode = Mode::Picker(Picker::load(db)?),
            KeyCode::Char('x') => {
                if let Some(id) = self.selected_id() {
                    db.delete_exercise(id)?;
                }
            }
            _ => {}
        }
        Ok(Action::None)
    }

    fn save_field(&mut self, db: &Database, field: Field, input: &str) -> Result<()> {
        let Some(id) = self.selected_id() else {
            return Ok(());
        };
        self.form.set_field(id, field, input)?;
        let outcome = self.form.save(db, id, Utc::now())?;
        if let Some(record) = outcome.new_record {
            info!(exercise = %record.exercise_name, weight = record.weight, reps = record.reps, "new personal record");
            self.notice = Some(format!(
                "Nouveau record: {} {} kg x {}",
                record.exercise_name, record.weight, record.reps
            ));
        }
        Ok(())
    }

    fn save_date(&mut self, db: &Database, input: &str) -> Result<()> {
        let day = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .with_context(|| format!("date invalide: {input:?}"))?;
        let date = Local
            .from_local_datetime(&day.and_time(NaiveTime::MIN))
            .earliest()
            .ok_or_else(|| anyhow!("date inexistante: {day}"))?;
        db.set_workout_date(self.workout_id, date.with_timezone(&Utc))?;
        Ok(())
    }

    pub fn help(&self) -> &'static str {
        match self.mode {
            Mode::Browse => {
                "q: back | j/k: move | s/r/w/m: sets/reps/weight/minutes | t: date | a: add | x: remove"
            }
            Mode::Edit { .. } | Mode::Date { .. } => "enter: save | esc: cancel",
            Mode::Picker(_) => "space: select | enter: add | esc: cancel",
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(5)])
            .split(area);

        let title = match &self.workout {
            Some(workout) => {
                let date = match &self.mode {
                    Mode::Date { buffer } => format!("{buffer}_"),
                    _ => workout.date.with_timezone(&Local).format("%Y-%m-%d").to_string(),
                };
                format!("{} | {}", workout.name, date)
            }
            None => "Séance supprimée".to_string(),
        };
        let header = Paragraph::new(title)
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        match &self.mode {
            Mode::Picker(picker) => render_picker(frame, chunks[1], picker),
            _ => self.render_exercises(frame, chunks[1]),
        }
    }

    fn render_exercises(&self, frame: &mut Frame, area: Rect) {
        let editing = match &self.mode {
            Mode::Edit { field, buffer } => Some((*field, buffer.as_str())),
            _ => None,
        };

        let rows: Vec<Row> = self
            .exercises
            .iter()
            .enumerate()
            .map(|(i, exercise)| {
                let draft = self.form.draft(exercise.id);
                let value = |field: Field| -> String {
                    match editing {
                        Some((edited, buffer)) if i == self.selected && edited == field => format!("{buffer}_"),
                        _ => draft.map(|d| d.display(field)).unwrap_or_default(),
                    }
                };
                let is_pr = draft.is_some_and(|d| d.is_pr);

                let mut cells = vec![Cell::from(exercise.name.clone())];
                cells.extend(Field::all().iter().map(|f| Cell::from(value(*f))));
                cells.push(Cell::from(if is_pr { "PR" } else { "" }).style(Style::default().fg(Color::Yellow)));

                let row = Row::new(cells);
                if i == self.selected {
                    row.style(Style::default().bg(Color::DarkGray))
                } else {
                    row
                }
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Min(24),
                Constraint::Length(8),
                Constraint::Length(8),
                Constraint::Length(12),
                Constraint::Length(12),
                Constraint::Length(4),
            ],
        )
        .header(
            Row::new(vec!["Exercice", "Séries", "Reps", "Poids (kg)", "Durée (min)", ""])
                .style(Style::default().bold()),
        )
        .block(Block::default().borders(Borders::ALL).title("Exercices"));
        frame.render_widget(table, area);
    }
}

fn render_picker(frame: &mut Frame, area: Rect, picker: &Picker) {
    let mut group = "";
    let mut lines = Vec::new();
    for (i, entry) in picker.entries.iter().enumerate() {
        if entry.muscle_group != group {
            group = &entry.muscle_group;
            lines.push(Line::from(group.to_string()).style(Style::default().bold()));
        }
        let mark = if picker.chosen.contains(&entry.id) { "[x]" } else { "[ ]" };
        let line = Line::from(format!("  {mark} {}", entry.name));
        lines.push(if i == picker.cursor {
            line.style(Style::default().bg(Color::DarkGray))
        } else {
            line
        });
    }

    let list = Paragraph::new(lines)
        .scroll(((picker.cursor as u16).saturating_sub(area.height / 2), 0))
        .block(Block::default().borders(Borders::ALL).title("Ajouter des exercices"));
    frame.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    fn setup() -> (Database, WorkoutScreen) {
        let db = Database::open_in_memory().unwrap();
        seed::run(&db).unwrap();
        let template = db.templates().unwrap().remove(0);
        let id = db.create_workout_from_template(template.id, Utc::now()).unwrap();
        let screen = WorkoutScreen::open(&db, id).unwrap().unwrap();
        (db, screen)
    }

    fn type_keys(screen: &mut WorkoutScreen, db: &Database, input: &str) {
        for c in input.chars() {
            screen.handle_key(db, KeyCode::Char(c)).unwrap();
        }
    }

    #[test]
    fn test_missing_workout() {
        let db = Database::open_in_memory().unwrap();
        assert!(WorkoutScreen::open(&db, 42).unwrap().is_none());
    }

    #[test]
    fn test_edit_then_save_sets_record() {
        let (db, mut screen) = setup();
        let first = screen.exercises()[0].clone();

        screen.handle_key(&db, KeyCode::Char('w')).unwrap();
        type_keys(&mut screen, &db, "80");
        screen.handle_key(&db, KeyCode::Enter).unwrap();
        screen.refresh(&db).unwrap();

        assert!(screen.is_browsing());
        let stored = db.get_exercise(first.id).unwrap().unwrap();
        assert_eq!(stored.weight, Some(80.0));
        assert!(stored.is_pr);
        assert!(screen.take_notice().is_some_and(|n| n.contains(&first.name)));
        assert!(screen.form().draft(first.id).unwrap().is_pr);
    }

    #[test]
    fn test_escape_discards_edit() {
        let (db, mut screen) = setup();
        let first = screen.exercises()[0].clone();

        screen.handle_key(&db, KeyCode::Char('s')).unwrap();
        screen.handle_key(&db, KeyCode::Backspace).unwrap();
        type_keys(&mut screen, &db, "9");
        screen.handle_key(&db, KeyCode::Esc).unwrap();

        assert!(screen.is_browsing());
        assert_eq!(db.get_exercise(first.id).unwrap().unwrap().sets, first.sets);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let (db, mut screen) = setup();
        screen.handle_key(&db, KeyCode::Char('r')).unwrap();
        type_keys(&mut screen, &db, "x");
        assert!(screen.handle_key(&db, KeyCode::Enter).is_err());
        assert!(screen.is_browsing());
    }

    #[test]
    fn test_remove_selected_exercise() {
        let (db, mut screen) = setup();
        let before = screen.exercises().len();
        let first = screen.exercises()[0].id;

        screen.handle_key(&db, KeyCode::Char('x')).unwrap();
        screen.refresh(&db).unwrap();

        assert_eq!(screen.exercises().len(), before - 1);
        assert!(screen.form().draft(first).is_none());
    }

    #[test]
    fn test_picker_adds_chosen_entries() {
        let (db, mut screen) = setup();
        let before = screen.exercises().len();

        screen.handle_key(&db, KeyCode::Char('a')).unwrap();
        screen.handle_key(&db, KeyCode::Char(' ')).unwrap();
        screen.handle_key(&db, KeyCode::Down).unwrap();
        screen.handle_key(&db, KeyCode::Char(' ')).unwrap();
        screen.handle_key(&db, KeyCode::Down).unwrap();
        screen.handle_key(&db, KeyCode::Char(' ')).unwrap();
        screen.handle_key(&db, KeyCode::Char(' ')).unwrap();
        screen.handle_key(&db, KeyCode::Enter).unwrap();
        screen.refresh(&db).unwrap();

        assert!(screen.is_browsing());
        assert_eq!(screen.exercises().len(), before + 2);
    }

    #[test]
    fn test_change_date() {
        let (db, mut screen) = setup();
        screen.handle_key(&db, KeyCode::Char('t')).unwrap();
        for _ in 0..10 {
            screen.handle_key(&db, KeyCode::Backspace).unwrap();
        }
        type_keys(&mut screen, &db, "2024-02-29");
        screen.handle_key(&db, KeyCode::Enter).unwrap();
        screen.refresh(&db).unwrap();

        let date = screen.workout().unwrap().date.with_timezone(&Local).date_naive();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_other_workout_changes_do_not_touch_screen() {
        let (db, mut screen) = setup();
        let other = db.create_blank_workout("Autre", Utc::now()).unwrap();
        let catalog = db.predefined_exercises().unwrap();
        db.add_catalog_exercises(other, &[catalog[0].id]).unwrap();

        let before = screen.exercises().to_vec();
        screen.refresh(&db).unwrap();
        assert_eq!(screen.exercises(), before.as_slice());
    }
}
