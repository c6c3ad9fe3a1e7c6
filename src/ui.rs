use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};

use unicode_width::UnicodeWidthStr;

use repcoach::{
    coach::DailyPlan,
    plan::{Load, PlanExercise},
    session::{Phase, RestKind, SessionEngine},
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    let title = Paragraph::new(format!(
        "repcoach  ·  {}  ·  streak {}",
        app.today.format("%A %d %b"),
        app.streak
    ))
    .block(Block::default().borders(Borders::ALL))
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let help = match app.state {
        AppState::Home => "(enter) start  (w)eek  (q)uit",
        AppState::Week => "(b)ack",
        AppState::Summary => "any key to continue",
        AppState::Session => session_help(app.session.as_ref()),
    };

    match app.state {
        AppState::Home => render_home(app, f, chunks[1]),
        AppState::Week => render_week(app, f, chunks[1]),
        AppState::Summary => render_summary(app, f, chunks[1]),
        AppState::Session => {
            if let Some(session) = &app.session {
                render_session(app, session, f, chunks[1]);
            }
        }
    }

    let footer_text = match &app.status {
        Some(status) => format!("{status}  |  {help}"),
        None => help.to_string(),
    };
    let footer = Paragraph::new(footer_text)
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
        .alignment(Alignment::Center);
    f.render_widget(footer, chunks[2]);
}

fn session_help(session: Option<&SessionEngine>) -> &'static str {
    match session.map(|s| s.phase()) {
        Some(Phase::Preview) => "↑/↓ select  (space) skip/unskip  (enter) start  (esc) leave",
        Some(Phase::Exercising { .. }) => "(n)ext set  (s)wap exercise  (esc) end session",
        Some(Phase::Resting { .. }) => "(n) skip rest  (esc) end session",
        Some(Phase::Rating { .. }) => "1-9, 0=10 or ←/→ + enter  (s)kip rating",
        _ => "",
    }
}

/// Left-align `text` in `width` terminal columns
fn padded(text: &str, width: usize) -> String {
    format!("{text}{}", " ".repeat(width.saturating_sub(text.width())))
}

fn load_text(entry: &PlanExercise) -> String {
    match entry.load {
        Load::Reps(reps) => format!("{} × {} reps", entry.sets, reps),
        Load::Timed(secs) => format!("{} × {}s", entry.sets, secs),
    }
}

fn render_home(app: &App, f: &mut Frame, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = Vec::new();

    match &app.daily {
        DailyPlan::Done(record) => {
            lines.push(Line::from(Span::styled("Today's session is done.", bold.fg(Color::Green))));
            lines.push(Line::from(format!(
                "{} exercises in {} min{}",
                record.completed_exercise_ids.len(),
                record.duration_actual_s / 60,
                record.rpe.map(|r| format!(", effort {r}/10")).unwrap_or_default()
            )));
        }
        DailyPlan::Rest => {
            lines.push(Line::from(Span::styled("Rest day.", bold.fg(Color::Yellow))));
            lines.push(Line::from("Recovery is part of the program."));
        }
        DailyPlan::Training(plan) => {
            lines.push(Line::from(Span::styled(
                format!(
                    "Today: {} exercises, about {} min",
                    plan.exercise_count(),
                    plan.total_duration_s().div_ceil(60)
                ),
                bold,
            )));
            lines.push(Line::from(""));
            for entry in &plan.exercises {
                lines.push(Line::from(format!(
                    "  {} {}",
                    padded(app.coach.catalog().name_of(&entry.exercise_id), 28),
                    load_text(entry)
                )));
            }
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Today"))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn render_week(app: &App, f: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = app
        .week
        .iter()
        .map(|day| {
            let label = day.date.format("%a %d %b").to_string();
            match &day.plan {
                Some(plan) => ListItem::new(format!(
                    "{label}   workout  {} exercises, ~{} min",
                    plan.exercise_count(),
                    plan.total_duration_s().div_ceil(60)
                ))
                .style(Style::default().fg(Color::Green)),
                None => ListItem::new(format!("{label}   rest"))
                    .style(Style::default().add_modifier(Modifier::DIM)),
            }
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("This week"));
    f.render_widget(list, area);
}

fn render_summary(app: &App, f: &mut Frame, area: Rect) {
    let Some(record) = &app.last_record else {
        return;
    };
    let lines = vec![
        Line::from(Span::styled(
            "Session complete",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("Exercises: {}", record.completed_exercise_ids.len())),
        Line::from(format!(
            "Time: {}:{:02}",
            record.duration_actual_s / 60,
            record.duration_actual_s % 60
        )),
        Line::from(format!(
            "Effort: {}",
            record
                .rpe
                .map(|r| format!("{r}/10"))
                .unwrap_or_else(|| "not rated".to_string())
        )),
        Line::from(format!("Streak: {} days", app.streak)),
    ];
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}

fn render_session(app: &App, session: &SessionEngine, f: &mut Frame, area: Rect) {
    match session.phase() {
        Phase::Preview => render_preview(app, session, f, area),
        Phase::Exercising { exercise, set, remaining_s } => {
            let Some(entry) = session.active().get(exercise) else {
                return;
            };
            let title = format!(
                "Exercise {}/{}  ·  set {}/{}",
                exercise + 1,
                session.active().len(),
                set + 1,
                entry.sets
            );
            let name = session.catalog().name_of(&entry.exercise_id).to_string();
            let detail = match entry.load {
                Load::Reps(reps) => format!("{reps} reps"),
                Load::Timed(secs) => format!("hold {secs}s"),
            };
            let instructions = session
                .catalog()
                .get(&entry.exercise_id)
                .map(|e| e.instructions.clone())
                .unwrap_or_default();
            render_countdown(
                f,
                area,
                &title,
                &format!("{name}  ·  {detail}"),
                &instructions,
                remaining_s,
                session.set_duration_s(entry),
                Color::Green,
            );
        }
        Phase::Resting { exercise, set, remaining_s, kind } => {
            let Some(entry) = session.active().get(exercise) else {
                return;
            };
            let (title, total) = match kind {
                RestKind::BetweenSets => ("Rest".to_string(), entry.rest_s),
                RestKind::BeforeNextExercise => {
                    ("Get ready".to_string(), app.timing.rest_before_next_exercise_s)
                }
            };
            let next = format!(
                "Next: {}  ·  set {}/{}",
                session.catalog().name_of(&entry.exercise_id),
                set + 1,
                entry.sets
            );
            render_countdown(f, area, &title, &next, "", remaining_s, total.max(remaining_s), Color::Blue);
        }
        Phase::Rating { selected } => render_rating(app, selected, f, area),
        Phase::Complete | Phase::Aborted => {}
    }
}

fn render_preview(app: &App, session: &SessionEngine, f: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = session
        .plan()
        .exercises
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let skipped = session.is_skipped(idx);
            let marker = if skipped { "[ ]" } else { "[x]" };
            let mut style = Style::default();
            if skipped {
                style = style.add_modifier(Modifier::DIM | Modifier::CROSSED_OUT);
            }
            if idx == app.cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            ListItem::new(format!(
                "{marker} {} {}",
                padded(session.catalog().name_of(&entry.exercise_id), 28),
                load_text(entry)
            ))
            .style(style)
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Session preview"));
    f.render_widget(list, area);
}

#[allow(clippy::too_many_arguments)]
fn render_countdown(
    f: &mut Frame,
    area: Rect,
    title: &str,
    headline: &str,
    body: &str,
    remaining_s: u32,
    total_s: u32,
    color: Color,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let headline = Paragraph::new(headline.to_string())
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    f.render_widget(headline, chunks[0]);

    let ratio = if total_s == 0 {
        0.0
    } else {
        (remaining_s as f64 / total_s as f64).clamp(0.0, 1.0)
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(format!("{}:{:02}", remaining_s / 60, remaining_s % 60));
    f.render_widget(gauge, chunks[1]);

    let body = Paragraph::new(body.to_string())
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Gray));
    f.render_widget(body, chunks[2]);
}

fn render_rating(app: &App, selected: Option<u8>, f: &mut Frame, area: Rect) {
    let highlighted = selected.map(usize::from).unwrap_or(app.cursor);
    let spans: Vec<Span> = (1..=10usize)
        .map(|n| {
            let style = if n == highlighted {
                Style::default()
                    .fg(Color::Black)
                    .bg(if selected.is_some() { Color::Green } else { Color::Yellow })
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Span::styled(format!(" {n} "), style)
        })
        .collect();

    let lines = vec![
        Line::from("How hard was that session?"),
        Line::from(""),
        Line::from(spans),
        Line::from(""),
        Line::from(Span::styled(
            "1 = very easy   10 = maximal effort",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Effort"))
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}
