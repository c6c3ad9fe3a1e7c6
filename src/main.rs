mod ui;

use chrono::{Local, NaiveDate};
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};
use tracing_subscriber::EnvFilter;

use repcoach::{
    app_dirs::AppDirs,
    catalog::{Contraindication, ExerciseCatalog},
    coach::{CoachContext, CoachError, DailyPlan, DayPreview},
    config::{ConfigStore, FileConfigStore},
    generator::ProgramBuilder,
    plan::CompletedSessionRecord,
    profile::{AgeBracket, FitnessLevel, Profile, Sex},
    runtime::{ArmedTimer, CoachEvent, CrosstermEventSource, FixedTicker, Runner, TimerToken},
    schedule::is_deload_week,
    session::{Phase, SessionEngine, SessionTiming},
    store::{Snapshot, SqliteStore, Store},
    streak::current_streak,
};

/// Redraw interval while no countdown is running
const IDLE_REDRAW_MS: u64 = 250;

/// home workout coach for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal workout coach: a weekly schedule, daily bodyweight sessions that progress as exercises get easy, timed sets and rests, and an effort rating after every session."
)]
pub struct Cli {
    /// database file (defaults to the state directory)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file (defaults to the platform config directory)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// create or update your profile
    Init(InitArgs),
    /// today's session (default)
    Today,
    /// preview the next seven days
    Week,
    /// list recent sessions
    History {
        /// number of sessions to show
        #[clap(short = 'n', long)]
        limit: Option<usize>,
        /// write csv to stdout
        #[clap(long)]
        csv: bool,
    },
    /// print the current streak
    Streak,
    /// export everything to a JSON file
    Export { file: PathBuf },
    /// replace all data with a JSON export
    Import { file: PathBuf },
    /// delete all stored data
    Reset {
        /// confirm deletion
        #[clap(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct InitArgs {
    /// female, male or other
    #[clap(long, value_parser = parse_tag::<Sex>)]
    sex: Option<Sex>,

    /// under_35, 35_44 or 45_plus
    #[clap(long, value_parser = parse_tag::<AgeBracket>)]
    age: Option<AgeBracket>,

    /// beginner or intermediate
    #[clap(long, value_parser = parse_tag::<FitnessLevel>)]
    level: Option<FitnessLevel>,

    /// training weekdays, 0=Monday..6=Sunday, comma separated
    #[clap(long, value_delimiter = ',')]
    days: Vec<u8>,

    /// minutes available per session
    #[clap(long)]
    minutes: Option<u8>,

    #[clap(long)]
    postpartum: Option<bool>,

    /// a door anchor or similar is available for rows
    #[clap(long)]
    equipment_anchor: Option<bool>,

    /// injury tags to avoid, comma separated (knee, lower_back, ...)
    #[clap(long, value_delimiter = ',', value_parser = parse_tag::<Contraindication>)]
    injuries: Vec<Contraindication>,

    /// accept the health disclaimer
    #[clap(long)]
    accept_disclaimer: bool,
}

/// Parse a snake_case tag through the type's serde names
fn parse_tag<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.replace('-', "_")))
        .map_err(|_| format!("unknown value `{s}`"))
}

impl InitArgs {
    fn apply(&self, profile: &mut Profile, today: NaiveDate) -> Result<(), CoachError> {
        if let Some(sex) = self.sex {
            profile.sex = sex;
        }
        if let Some(age) = self.age {
            profile.age_bracket = age;
        }
        if let Some(level) = self.level {
            profile.fitness_level = level;
        }
        if !self.days.is_empty() {
            profile.set_workout_days(self.days.iter().copied())?;
        }
        if let Some(minutes) = self.minutes {
            profile.minutes_per_session = minutes;
        }
        if let Some(postpartum) = self.postpartum {
            profile.is_postpartum = postpartum;
        }
        if let Some(anchor) = self.equipment_anchor {
            profile.has_equipment_anchor = anchor;
        }
        if !self.injuries.is_empty() {
            profile.injury_notes = self.injuries.clone();
        }
        if self.accept_disclaimer && profile.disclaimer_accepted_at.is_none() {
            profile.disclaimer_accepted_at = Some(Local::now().to_rfc3339());
        }
        profile.program_start.get_or_insert(today);
        profile.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Home,
    Session,
    Week,
    Summary,
}

pub struct App {
    pub coach: CoachContext<SqliteStore>,
    pub today: NaiveDate,
    pub timing: SessionTiming,
    pub state: AppState,
    pub daily: DailyPlan,
    pub week: Vec<DayPreview>,
    pub streak: u32,
    pub session: Option<SessionEngine>,
    /// Highlighted row in the preview list, or rating on the scale
    pub cursor: usize,
    pub last_record: Option<CompletedSessionRecord>,
    pub status: Option<String>,
}

impl App {
    pub fn new(
        coach: CoachContext<SqliteStore>,
        today: NaiveDate,
        timing: SessionTiming,
    ) -> Result<Self, CoachError> {
        let mut app = Self {
            coach,
            today,
            timing,
            state: AppState::Home,
            daily: DailyPlan::Rest,
            week: Vec::new(),
            streak: 0,
            session: None,
            cursor: 0,
            last_record: None,
            status: None,
        };
        app.refresh()?;
        Ok(app)
    }

    pub fn refresh(&mut self) -> Result<(), CoachError> {
        self.daily = self.coach.resolve_day(self.today)?;
        self.week = self.coach.week_preview(self.today)?;
        self.streak = self.coach.streak(self.today)?;
        Ok(())
    }

    pub fn armed_timer(&self) -> Option<ArmedTimer> {
        self.session.as_ref().and_then(|s| s.armed_timer())
    }

    pub fn on_tick(&mut self, token: TimerToken) -> Result<(), CoachError> {
        if let Some(session) = self.session.as_mut() {
            session.tick(token);
        }
        self.collect_completion()
    }

    /// Handle one key press. Returns true when the app should exit.
    pub fn on_key(&mut self, key: KeyEvent) -> Result<bool, CoachError> {
        if key.kind != KeyEventKind::Press {
            return Ok(false);
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.abort_session();
            return Ok(true);
        }

        match self.state {
            AppState::Home => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return Ok(true),
                KeyCode::Enter | KeyCode::Char(' ') => self.open_session(),
                KeyCode::Char('w') => self.state = AppState::Week,
                _ => {}
            },
            AppState::Week => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('b')) {
                    self.state = AppState::Home;
                }
            }
            AppState::Summary => {
                self.state = AppState::Home;
                self.refresh()?;
            }
            AppState::Session => {
                self.on_session_key(key);
                self.collect_completion()?;
            }
        }
        Ok(false)
    }

    fn open_session(&mut self) {
        if let DailyPlan::Training(plan) = &self.daily {
            self.session = Some(self.coach.start_session(plan.clone(), self.timing));
            self.cursor = 0;
            self.status = None;
            self.state = AppState::Session;
        }
    }

    fn on_session_key(&mut self, key: KeyEvent) {
        let Some(session) = self.session.as_mut() else {
            self.state = AppState::Home;
            return;
        };
        if key.code == KeyCode::Esc && !session.phase().is_terminal() {
            self.abort_session();
            return;
        }

        match session.phase() {
            Phase::Preview => match key.code {
                KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
                KeyCode::Down | KeyCode::Char('j') => {
                    let last = session.plan().exercise_count().saturating_sub(1);
                    self.cursor = (self.cursor + 1).min(last);
                }
                KeyCode::Char(' ') | KeyCode::Char('x') => {
                    session.toggle_skip(self.cursor);
                }
                KeyCode::Enter => {
                    session.start();
                    self.cursor = 5;
                }
                _ => {}
            },
            Phase::Exercising { .. } => match key.code {
                KeyCode::Enter | KeyCode::Char('n') => session.skip_set(),
                KeyCode::Char('s') => {
                    self.status = match session.swap_exercise() {
                        Some(id) => Some(format!("Swapped to {}", session.catalog().name_of(&id))),
                        None => Some("No alternative for this exercise".to_string()),
                    };
                }
                _ => {}
            },
            Phase::Resting { .. } => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Char('n')) {
                    session.skip_rest();
                }
            }
            Phase::Rating { .. } => match key.code {
                KeyCode::Char(c @ '0'..='9') => {
                    let rpe = match c.to_digit(10) {
                        Some(0) => 10,
                        Some(d) => d as u8,
                        None => return,
                    };
                    self.cursor = rpe as usize;
                    session.select_rating(rpe);
                }
                KeyCode::Left => self.cursor = self.cursor.saturating_sub(1).max(1),
                KeyCode::Right => self.cursor = (self.cursor + 1).min(10),
                KeyCode::Enter => {
                    session.select_rating(self.cursor as u8);
                }
                KeyCode::Char('s') | KeyCode::Backspace => session.skip_rating(),
                _ => {}
            },
            Phase::Complete | Phase::Aborted => {}
        }
    }

    fn abort_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if session.abort().is_some() {
                self.status = Some("Session ended early, nothing was saved".to_string());
            }
        }
        self.state = AppState::Home;
    }

    /// Persist a finished session and move to the summary screen. A failed
    /// save keeps the session so the next key press retries it.
    fn collect_completion(&mut self) -> Result<(), CoachError> {
        let Some(completion) = self.session.as_ref().and_then(|s| s.completion()).cloned() else {
            return Ok(());
        };
        let record = match self.coach.record_completion(self.today, &completion) {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(%err, "saving the session failed");
                self.status = Some(format!("Could not save session ({err}), press any key to retry"));
                return Ok(());
            }
        };
        self.session = None;
        self.status = None;
        self.last_record = Some(record);
        self.state = AppState::Summary;
        self.refresh()
    }
}

fn init_logging(to_file: bool) {
    let filter = EnvFilter::try_from_env("REPCOACH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if !to_file {
        builder.with_writer(io::stderr).init();
        return;
    }

    // the TUI owns the terminal, so logs go to a file or nowhere
    let file = AppDirs::log_path().and_then(|path| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    match file {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        None => builder.with_writer(io::sink).init(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Today);
    init_logging(command == Command::Today);

    let config_store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let config = config_store.load();
    let db_path = cli.db.clone().unwrap_or_else(|| config.resolved_db_path());
    let today = Local::now().date_naive();

    let mut store = SqliteStore::open(&db_path)?;

    match command {
        Command::Init(args) => {
            let mut profile = store.get_profile()?.unwrap_or_default();
            args.apply(&mut profile, today)?;
            store.save_profile(&profile)?;
            println!(
                "Profile saved: {} {} {}, {} min, days {:?}",
                profile.fitness_level,
                profile.sex,
                profile.age_bracket,
                profile.minutes_per_session,
                profile.workout_days
            );
            if !profile.disclaimer_accepted() {
                println!("Run again with --accept-disclaimer to start training.");
            }
        }
        Command::Today => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            let coach = CoachContext::load(store, ExerciseCatalog::builtin()?, ProgramBuilder)?;
            if !coach.profile().disclaimer_accepted() {
                return Err("the health disclaimer has not been accepted, run `repcoach init --accept-disclaimer`".into());
            }
            let mut app = App::new(coach, today, config.session_timing())?;

            enable_raw_mode()?;
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen)?;
            let backend = CrosstermBackend::new(stdout);
            let mut terminal = Terminal::new(backend)?;

            let result = start_tui(&mut terminal, &mut app);

            disable_raw_mode()?;
            execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
            terminal.show_cursor()?;
            result?;
        }
        Command::Week => {
            let coach = CoachContext::load(store, ExerciseCatalog::builtin()?, ProgramBuilder)?;
            print_week(&coach, today)?;
        }
        Command::History { limit, csv } => {
            let records = store.recent_sessions(limit.unwrap_or(config.history_limit))?;
            if csv {
                write_history_csv(&records, io::stdout())?;
            } else if records.is_empty() {
                println!("No sessions yet.");
            } else {
                for record in &records {
                    println!("{}", history_line(record, today));
                }
            }
        }
        Command::Streak => {
            let streak = current_streak(&store.all_sessions()?, today);
            println!("{streak} day streak");
        }
        Command::Export { file } => {
            let json = store.export_snapshot()?.to_json()?;
            fs::write(&file, json)?;
            println!("Exported to {}", file.display());
        }
        Command::Import { file } => {
            let snapshot = Snapshot::from_json(&fs::read_to_string(&file)?)?;
            store.import_snapshot(&snapshot)?;
            println!(
                "Imported {} sessions from {}",
                snapshot.sessions.len(),
                file.display()
            );
        }
        Command::Reset { yes } => {
            if !yes {
                println!("This deletes your profile and all history. Re-run with --yes to confirm.");
            } else {
                store.clear_all()?;
                println!("All data deleted.");
            }
        }
    }

    Ok(())
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(IDLE_REDRAW_MS)),
    );

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step(app.armed_timer()) {
            CoachEvent::Tick(token) => app.on_tick(token)?,
            CoachEvent::Key(key) => {
                if app.on_key(key)? {
                    break;
                }
            }
            CoachEvent::Resize | CoachEvent::Idle => {}
        }
    }
    Ok(())
}

fn print_week(coach: &CoachContext<SqliteStore>, today: NaiveDate) -> Result<(), CoachError> {
    for day in coach.week_preview(today)? {
        let label = day.date.format("%a %Y-%m-%d");
        match &day.plan {
            Some(plan) => {
                let deload = if is_deload_week(coach.profile(), day.date) {
                    " (deload)"
                } else {
                    ""
                };
                println!(
                    "{label}  workout{deload}  {} exercises, ~{} min",
                    plan.exercise_count(),
                    plan.total_duration_s().div_ceil(60)
                );
                for entry in &plan.exercises {
                    println!("    {}", coach.catalog().name_of(&entry.exercise_id));
                }
            }
            None => println!("{label}  rest"),
        }
    }
    Ok(())
}

pub fn relative_age(date: NaiveDate, today: NaiveDate) -> String {
    match (today - date).num_days() {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        n if n > 1 => format!("{n} days ago"),
        _ => "upcoming".to_string(),
    }
}

fn history_line(record: &CompletedSessionRecord, today: NaiveDate) -> String {
    let rpe = record
        .rpe
        .map(|r| format!("rpe {r}"))
        .unwrap_or_else(|| "unrated".to_string());
    format!(
        "{} ({})  {}/{} exercises  {}  {} min",
        record.date,
        relative_age(record.date, today),
        record.completed_exercise_ids.len(),
        record.plan.exercise_count(),
        rpe,
        record.duration_actual_s / 60
    )
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    date: NaiveDate,
    planned: usize,
    completed: usize,
    rpe: Option<u8>,
    duration_s: u32,
    exercises: &'a str,
}

fn write_history_csv<W: io::Write>(records: &[CompletedSessionRecord], out: W) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        let exercises = record.completed_exercise_ids.join(" ");
        writer.serialize(HistoryRow {
            date: record.date,
            planned: record.plan.exercise_count(),
            completed: record.completed_exercise_ids.len(),
            rpe: record.rpe,
            duration_s: record.duration_actual_s,
            exercises: &exercises,
        })?;
    }
    writer.flush()?;
    Ok(())
}
