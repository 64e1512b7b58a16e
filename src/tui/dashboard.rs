//! Dashboard: stats, recent workouts, templates

use anyhow::Result;
use chrono::{Local, Utc};
use crossterm::event::KeyCode;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

use super::{Action, Route, Settings};
use crate::db::{Database, Order, PredefinedWorkout, WorkoutSummary};
use crate::live::{LiveQuery, QueryKey, Table as DbTable};
use crate::stats::Analytics;

pub struct DashboardScreen {
    summaries_query: LiveQuery<Vec<WorkoutSummary>>,
    analytics_query: LiveQuery<Analytics>,
    templates_query: LiveQuery<Vec<PredefinedWorkout>>,
    summaries: Vec<WorkoutSummary>,
    analytics: Analytics,
    templates: Vec<PredefinedWorkout>,
    selected: usize,
    /// Workout waiting for a `y` to be deleted
    pending_delete: Option<i64>,
}

impl DashboardScreen {
    pub fn open(db: &Database) -> Result<Self> {
        let summaries_query = LiveQuery::new(
            db,
            QueryKey::tables(&[DbTable::Workouts, DbTable::Exercises]),
            |db: &Database| db.workout_summaries(),
        );
        let analytics_query = LiveQuery::new(
            db,
            QueryKey::tables(&[DbTable::Workouts, DbTable::Exercises, DbTable::PersonalRecords]),
            |db: &Database| {
                Ok(Analytics::new(
                    db.list_workouts()?,
                    db.exercises(Order::Asc)?,
                    db.personal_records()?,
                ))
            },
        );
        let templates_query = LiveQuery::new(
            db,
            QueryKey::tables(&[DbTable::PredefinedWorkouts]),
            |db: &Database| db.templates(),
        );

        Ok(Self {
            summaries: summaries_query.fetch(db)?,
            analytics: analytics_query.fetch(db)?,
            templates: templates_query.fetch(db)?,
            summaries_query,
            analytics_query,
            templates_query,
            selected: 0,
            pending_delete: None,
        })
    }

    pub fn summaries(&self) -> &[WorkoutSummary] {
        &self.summaries
    }

    pub fn pending_delete(&self) -> Option<i64> {
        self.pending_delete
    }

    pub fn refresh(&mut self, db: &Database) -> Result<()> {
        if let Some(summaries) = self.summaries_query.poll(db)? {
            self.summaries = summaries;
            self.selected = self.selected.min(self.summaries.len().saturating_sub(1));
        }
        if let Some(analytics) = self.analytics_query.poll(db)? {
            self.analytics = analytics;
        }
        if let Some(templates) = self.templates_query.poll(db)? {
            self.templates = templates;
        }
        Ok(())
    }

    fn selected_id(&self) -> Option<i64> {
        self.summaries.get(self.selected).map(|s| s.workout.id)
    }

    pub fn handle_key(&mut self, db: &Database, settings: &Settings, code: KeyCode) -> Result<Action> {
        if let Some(id) = self.pending_delete.take() {
            if code == KeyCode::Char('y') {
                db.delete_workout(id)?;
            }
            return Ok(Action::None);
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected + 1 < self.summaries.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    return Ok(Action::Navigate(Route::Workout(id)));
                }
            }
            KeyCode::Char('d') => self.pending_delete = self.selected_id(),
            KeyCode::Char('n') => {
                let id = db.create_blank_workout(&settings.blank_workout_name, Utc::now())?;
                return Ok(Action::Navigate(Route::Workout(id)));
            }
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if let Some(template) = self.templates.get(index) {
                    let id = db.create_workout_from_template(template.id, Utc::now())?;
                    return Ok(Action::Navigate(Route::Workout(id)));
                }
            }
            _ => {}
        }
        Ok(Action::None)
    }

    pub fn help(&self) -> &'static str {
        if self.pending_delete.is_some() {
            "Supprimer la séance ? y: oui | any key: non"
        } else {
            "q: quit | j/k: move | enter: open | n: new | 1-9: template | d: delete"
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, weekly_target: u32) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(self.templates.len().min(9) as u16 + 2),
            ])
            .split(area);

        let stats = self.analytics.summary(&Local::now(), weekly_target);
        let line = format!(
            "Streak: {} jours | Cette semaine: {}/{} | Records: {} | Volume: {} t",
            stats.streak,
            stats.workouts_this_week,
            stats.weekly_target,
            stats.records_this_week,
            stats.volume_label(),
        );
        let header = Paragraph::new(line)
            .style(Style::default().fg(Color::Green))
            .block(Block::default().borders(Borders::ALL).title("Stats"));
        frame.render_widget(header, chunks[0]);

        let rows: Vec<Row> = self
            .summaries
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let row = Row::new(vec![
                    Cell::from(s.workout.date.with_timezone(&Local).format("%Y-%m-%d").to_string()),
                    Cell::from(s.workout.name.clone()),
                    Cell::from(format!("{} exercices", s.exercise_count)),
                    Cell::from(format!("{} min", s.duration_minutes)),
                ]);
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
                Constraint::Length(12),
                Constraint::Min(24),
                Constraint::Length(14),
                Constraint::Length(10),
            ],
        )
        .header(Row::new(vec!["Date", "Séance", "Exercices", "Durée"]).style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title("Dernières séances"));
        frame.render_widget(table, chunks[1]);

        let templates: Vec<Line> = self
            .templates
            .iter()
            .take(9)
            .enumerate()
            .map(|(i, t)| Line::from(format!("{}: {} ({} exercices)", i + 1, t.name, t.exercises.len())))
            .collect();
        let templates = Paragraph::new(templates)
            .block(Block::default().borders(Borders::ALL).title("Nouvelle séance"));
        frame.render_widget(templates, chunks[2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::seed;

    fn setup() -> (Database, DashboardScreen, Settings) {
        let db = Database::open_in_memory().unwrap();
        seed::run(&db).unwrap();
        let screen = DashboardScreen::open(&db).unwrap();
        (db, screen, Settings::from(&AppConfig::default()))
    }

    #[test]
    fn test_sees_writes_after_refresh() {
        let (db, mut screen, _) = setup();
        assert!(screen.summaries().is_empty());

        db.create_blank_workout("Cardio", Utc::now()).unwrap();
        screen.refresh(&db).unwrap();
        assert_eq!(screen.summaries().len(), 1);
        assert_eq!(screen.summaries()[0].workout.name, "Cardio");
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let (db, mut screen, settings) = setup();
        db.create_blank_workout("A", Utc::now()).unwrap();
        screen.refresh(&db).unwrap();

        screen.handle_key(&db, &settings, KeyCode::Char('d')).unwrap();
        assert!(screen.pending_delete().is_some());
        screen.handle_key(&db, &settings, KeyCode::Char('n')).unwrap();
        screen.refresh(&db).unwrap();
        assert_eq!(screen.summaries().len(), 1);

        screen.handle_key(&db, &settings, KeyCode::Char('d')).unwrap();
        screen.handle_key(&db, &settings, KeyCode::Char('y')).unwrap();
        screen.refresh(&db).unwrap();
        assert!(screen.summaries().is_empty());
    }

    #[test]
    fn test_selection_is_clamped() {
        let (db, mut screen, settings) = setup();
        db.create_blank_workout("A", Utc::now()).unwrap();
        screen.refresh(&db).unwrap();

        for _ in 0..3 {
            screen.handle_key(&db, &settings, KeyCode::Down).unwrap();
        }
        let id = screen.summaries()[0].workout.id;
        let action = screen.handle_key(&db, &settings, KeyCode::Enter).unwrap();
        assert_eq!(action, Action::Navigate(Route::Workout(id)));
    }

    #[test]
    fn test_unknown_template_slot_does_nothing() {
        let (db, mut screen, settings) = setup();
        let action = screen.handle_key(&db, &settings, KeyCode::Char('9')).unwrap();
        assert_eq!(action, Action::None);
        assert!(db.list_workouts().unwrap().is_empty());
    }
}
