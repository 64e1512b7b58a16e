//! TUI module - Terminal dashboard with ratatui
//!
//! Screens own live queries and re-read them on every tick, so writes made
//! through this process's store handle show up without a manual refresh.
//! Writes from another process are not seen until the screen is reopened.

mod dashboard;
mod workout;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use std::io::{stdout, Stdout};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::db::Database;

pub use dashboard::DashboardScreen;
pub use workout::WorkoutScreen;

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Screen addresses, written as paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Workout(i64),
    NotFound(String),
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let path = path.trim();
        if path.is_empty() || path == "/" {
            return Route::Dashboard;
        }
        match path.strip_prefix("/workout/").map(str::parse::<i64>) {
            Some(Ok(id)) => Route::Workout(id),
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Dashboard => "/".to_string(),
            Route::Workout(id) => format!("/workout/{id}"),
            Route::NotFound(path) => path.clone(),
        }
    }
}

/// What a key press asks the app to do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Navigate(Route),
    Quit,
}

/// Settings the screens read from the config
#[derive(Debug, Clone)]
pub struct Settings {
    pub weekly_target: u32,
    pub blank_workout_name: String,
}

impl From<&AppConfig> for Settings {
    fn from(config: &AppConfig) -> Self {
        Self {
            weekly_target: config.weekly_target,
            blank_workout_name: config.blank_workout_name.clone(),
        }
    }
}

pub enum Screen {
    Dashboard(DashboardScreen),
    Workout(WorkoutScreen),
    NotFound(String),
}

/// App state for TUI
pub struct App {
    db: Database,
    settings: Settings,
    screen: Screen,
    status: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(db: Database, settings: Settings, route: Route) -> Result<Self> {
        let screen = open_screen(&db, &route)?;
        Ok(Self {
            db,
            settings,
            screen,
            status: None,
            should_quit: false,
        })
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;

        let result = self.event_loop(&mut terminal);

        restore_terminal()?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            self.refresh();
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;
        }
        Ok(())
    }

    pub fn navigate(&mut self, route: Route) {
        debug!(route = %route.path(), "navigate");
        match open_screen(&self.db, &route) {
            Ok(screen) => self.screen = screen,
            Err(err) => self.report(err),
        }
    }

    /// Pull pending live query results into the current screen
    pub fn refresh(&mut self) {
        let result = match &mut self.screen {
            Screen::Dashboard(screen) => screen.refresh(&self.db),
            Screen::Workout(screen) => screen.refresh(&self.db),
            Screen::NotFound(_) => Ok(()),
        };
        if let Err(err) = result {
            self.report(err);
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        let result = match &mut self.screen {
            Screen::Dashboard(screen) => screen.handle_key(&self.db, &self.settings, code),
            Screen::Workout(screen) => screen.handle_key(&self.db, code),
            Screen::NotFound(_) => Ok(match code {
                KeyCode::Char('q') => Action::Quit,
                _ => Action::Navigate(Route::Dashboard),
            }),
        };

        match result {
            Ok(Action::None) => {}
            Ok(Action::Navigate(route)) => {
                self.status = None;
                self.navigate(route);
            }
            Ok(Action::Quit) => self.should_quit = true,
            Err(err) => self.report(err),
        }

        if let Screen::Workout(screen) = &mut self.screen
            && let Some(message) = screen.take_notice()
        {
            self.status = Some(message);
        }
        self.refresh();
    }

    fn report(&mut self, err: anyhow::Error) {
        warn!("{err:#}");
        self.status = Some(format!("Erreur: {err:#}"));
    }

    pub fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let header = Paragraph::new("gainz - Training Tracker")
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let help = match &self.screen {
            Screen::Dashboard(screen) => {
                screen.render(frame, chunks[1], self.settings.weekly_target);
                screen.help()
            }
            Screen::Workout(screen) => {
                screen.render(frame, chunks[1]);
                screen.help()
            }
            Screen::NotFound(path) => {
                let body = Paragraph::new(format!("Page introuvable: {path}"))
                    .style(Style::default().fg(Color::Red))
                    .block(Block::default().borders(Borders::ALL).title("404"));
                frame.render_widget(body, chunks[1]);
                "any key: dashboard | q: quit"
            }
        };

        let footer = match &self.status {
            Some(status) => Paragraph::new(status.as_str()).style(Style::default().fg(Color::Yellow)),
            None => Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(footer.block(Block::default().borders(Borders::ALL)), chunks[2]);
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            self.handle_key(key.code);
        }
        Ok(())
    }
}

fn open_screen(db: &Database, route: &Route) -> Result<Screen> {
    Ok(match route {
        Route::Dashboard => Screen::Dashboard(DashboardScreen::open(db)?),
        Route::Workout(id) => match WorkoutScreen::open(db, *id)? {
            Some(screen) => Screen::Workout(screen),
            None => Screen::NotFound(route.path()),
        },
        Route::NotFound(path) => Screen::NotFound(path.clone()),
    })
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
