use anyhow::Result;
use cookie_vote::{Category, Competitor, ControllerState, Toggle, VoteController, SELECTION_LIMIT};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

const THANK_YOU: &str = "You have already submitted your votes. Thank you!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Ballot,
    Standings,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Ballot => Page::Standings,
            Page::Standings => Page::Ballot,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Ballot => "Ballot",
            Page::Standings => "Standings",
        }
    }
}

/// What a key press asks the controller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Toggle(Category),
    Submit,
    Clear,
    ResetFlag,
    Refresh,
}

pub struct App {
    pub controller: VoteController,
    pub state: TableState,
    pub current_page: Page,
    pub message: Option<String>,
    pub title: String,
}

impl App {
    pub fn new(controller: VoteController, title: impl Into<String>) -> Self {
        let mut app = Self {
            controller,
            state: TableState::default(),
            current_page: Page::Ballot,
            message: None,
            title: title.into(),
        };
        app.clamp_selection();
        app
    }

    pub fn selected_competitor(&self) -> Option<&Competitor> {
        self.state
            .selected()
            .and_then(|i| self.controller.competitors().get(i))
    }

    /// Run one intent and remember its notice for the status line
    pub async fn apply(&mut self, intent: Intent) {
        let gated = matches!(intent, Intent::Toggle(_) | Intent::Submit | Intent::Clear);
        if gated && self.controller.is_submitted() {
            self.message = Some(THANK_YOU.to_string());
            return;
        }

        let message = match intent {
            Intent::Toggle(category) => {
                let Some(competitor) = self.selected_competitor() else {
                    return;
                };
                let (id, name) = (competitor.id.clone(), competitor.name.clone());

                match self.controller.toggle_selection(&id, category) {
                    Ok(Toggle::Selected) => format!("{} vote: {}", category, name),
                    Ok(Toggle::Deselected) => format!("Removed {} vote: {}", category, name),
                    Err(e) => e.to_string(),
                }
            }
            Intent::Submit => match self.controller.submit_votes().await {
                Ok(_) => "Votes submitted successfully!".to_string(),
                Err(e) => e.to_string(),
            },
            Intent::Clear => {
                self.controller.clear_selections();
                "Selections cleared".to_string()
            }
            Intent::ResetFlag => match self.controller.reset_submission_flag() {
                Ok(()) => "Submission flag removed. You can now vote again.".to_string(),
                Err(e) => e.to_string(),
            },
            Intent::Refresh => match self.controller.refresh_competitors().await {
                Ok(competitors) => format!("Loaded {} competitors", competitors.len()),
                Err(e) => e.to_string(),
            },
        };

        self.message = Some(message);
        self.clamp_selection();
    }

    /// Keep the cursor on a row after the snapshot changed size
    fn clamp_selection(&mut self) {
        let len = self.controller.competitors().len();
        let selected = match self.state.selected() {
            _ if len == 0 => None,
            Some(i) if i >= len => Some(len - 1),
            Some(i) => Some(i),
            None => Some(0),
        };
        self.state.select(selected);
    }

    pub fn next(&mut self) {
        let len = self.controller.competitors().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.controller.competitors().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    /// Competitors ordered by votes in `category`, highest first
    pub fn standings(&self, category: Category) -> Vec<&Competitor> {
        let counter = category.counter();
        let mut ranked: Vec<&Competitor> = self.controller.competitors().iter().collect();
        ranked.sort_by(|a, b| {
            b.votes(counter)
                .cmp(&a.votes(counter))
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked
    }
}

pub async fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(())
                }
                KeyCode::Tab => app.current_page = app.current_page.next(),
                KeyCode::Char('f') => app.apply(Intent::Toggle(Category::Flavor)).await,
                KeyCode::Char('l') => app.apply(Intent::Toggle(Category::Looks)).await,
                KeyCode::Char('s') => app.apply(Intent::Submit).await,
                KeyCode::Char('c') => app.apply(Intent::Clear).await,
                KeyCode::Char('R') => app.apply(Intent::ResetFlag).await,
                KeyCode::Char('r') => app.apply(Intent::Refresh).await,
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    let len = app.controller.competitors().len();
                    if len > 0 {
                        app.state.select(Some(len - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Notice line
            Constraint::Length(3), // Key hints
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Ballot => render_ballot(f, chunks[1], app),
        Page::Standings => render_standings(f, chunks[1], app),
    }

    render_notice(f, chunks[2], app);
    render_status_bar(f, chunks[3]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        app.title.clone(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )];

    for page in [Page::Ballot, Page::Standings] {
        spans.push(Span::raw(" │ "));
        let style = if page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    let selections = app.controller.selections();
    for category in Category::ALL {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!(
                "{} {}/{}",
                category,
                selections.get(category).len(),
                SELECTION_LIMIT
            ),
            Style::default().fg(category_color(category)),
        ));
    }

    let (state_label, state_color) = match app.controller.state() {
        ControllerState::Loading => ("LOADING", Color::DarkGray),
        ControllerState::Voting => ("VOTING", Color::Green),
        ControllerState::Submitted => ("SUBMITTED", Color::Red),
    };
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(state_label, Style::default().fg(state_color)));

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn category_color(category: Category) -> Color {
    match category {
        Category::Flavor => Color::Magenta,
        Category::Looks => Color::Cyan,
    }
}

fn render_ballot(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Competitor", "Flavor", "Looks", "Image"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let selections = app.controller.selections();
    let rows: Vec<Row> = app
        .controller
        .competitors()
        .iter()
        .map(|competitor| {
            let marker = |category: Category| {
                if selections.is_selected(&competitor.id, category) {
                    Cell::from("●").style(
                        Style::default()
                            .fg(category_color(category))
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Cell::from("○").style(Style::default().fg(Color::DarkGray))
                }
            };

            let cells = vec![
                Cell::from(truncate(&competitor.name, 30)),
                marker(Category::Flavor),
                marker(Category::Looks),
                Cell::from(truncate(&competitor.image_url, 40)),
            ];

            // Picked in either category
            let style = if selections.is_selected_any(&competitor.id) {
                Style::default().fg(Color::Black).bg(Color::Rgb(224, 255, 224))
            } else {
                Style::default()
            };

            Row::new(cells).style(style).height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Competitors "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_standings(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    for (category, column) in Category::ALL.into_iter().zip(columns.iter()) {
        let counter = category.counter();
        let rows: Vec<Row> = app
            .standings(category)
            .into_iter()
            .enumerate()
            .map(|(rank, competitor)| {
                Row::new(vec![
                    Cell::from(format!("{}.", rank + 1)),
                    Cell::from(truncate(&competitor.name, 28)),
                    Cell::from(competitor.votes(counter).to_string())
                        .style(Style::default().fg(category_color(category))),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Min(10),
                Constraint::Length(6),
            ],
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(category_color(category)))
                .title(format!(" {} ", category)),
        );

        f.render_widget(table, *column);
    }
}

fn render_notice(f: &mut Frame, area: Rect, app: &App) {
    let (text, color) = if app.controller.is_submitted() {
        (THANK_YOU.to_string(), Color::Red)
    } else {
        (app.message.clone().unwrap_or_default(), Color::Green)
    };

    let notice = Paragraph::new(Line::from(Span::styled(
        format!(" {}", text),
        Style::default().fg(color),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(notice, area);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let hints = [
        ("f", " Flavor | "),
        ("l", " Looks | "),
        ("s", " Submit | "),
        ("c", " Clear | "),
        ("r", " Refresh | "),
        ("R", " Remove Flag | "),
        ("Tab", " Page | "),
        ("↑/↓", " Nav | "),
    ];

    let mut status_spans = vec![Span::raw(" ")];
    for (key, label) in hints {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookie_vote::{LocalSessionService, MemoryFlagStore, SqliteCounterStore, SubmissionGuard};
    use std::sync::Arc;

    async fn create_test_app() -> App {
        let store = SqliteCounterStore::open_in_memory().unwrap();
        store
            .seed(&[
                Competitor::new("a", "Chocolate Chip", "https://img/a.png").with_votes(3, 1),
                Competitor::new("b", "Oatmeal Raisin", "https://img/b.png"),
                Competitor::new("c", "Snickerdoodle", "https://img/c.png").with_votes(5, 2),
            ])
            .unwrap();

        let mut controller = VoteController::new(
            Arc::new(store),
            Arc::new(LocalSessionService),
            SubmissionGuard::new(MemoryFlagStore::default()),
        );
        controller.initialize().await.unwrap();
        App::new(controller, "Cookie Competition 2024")
    }

    /// Move the cursor to `row` and toggle it in `category`
    async fn pick(app: &mut App, row: usize, category: Category) {
        app.state.select(Some(row));
        app.apply(Intent::Toggle(category)).await;
    }

    #[tokio::test]
    async fn test_toggle_reports_notice() {
        let mut app = create_test_app().await;

        pick(&mut app, 0, Category::Flavor).await;
        assert_eq!(app.message.as_deref(), Some("Flavor vote: Chocolate Chip"));

        pick(&mut app, 1, Category::Flavor).await;
        pick(&mut app, 2, Category::Flavor).await;
        assert_eq!(app.message.as_deref(), Some("You can only select 2 Flavor votes!"));

        pick(&mut app, 0, Category::Flavor).await;
        assert_eq!(app.message.as_deref(), Some("Removed Flavor vote: Chocolate Chip"));
    }

    #[tokio::test]
    async fn test_intents_are_gated_after_submission() {
        let mut app = create_test_app().await;
        for row in [0, 2] {
            pick(&mut app, row, Category::Flavor).await;
        }
        for row in [1, 2] {
            pick(&mut app, row, Category::Looks).await;
        }

        app.apply(Intent::Submit).await;
        assert_eq!(app.message.as_deref(), Some("Votes submitted successfully!"));

        pick(&mut app, 0, Category::Looks).await;
        assert_eq!(app.message.as_deref(), Some(THANK_YOU));
        assert!(app.controller.selections().get(Category::Looks).is_empty());

        app.apply(Intent::ResetFlag).await;
        assert_eq!(app.controller.state(), ControllerState::Voting);
        pick(&mut app, 0, Category::Looks).await;
        assert_eq!(app.controller.selections().get(Category::Looks).len(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_submit_notice() {
        let mut app = create_test_app().await;
        pick(&mut app, 0, Category::Flavor).await;

        app.apply(Intent::Submit).await;

        let message = app.message.clone().unwrap();
        assert!(message.starts_with("You must select exactly 2 Flavor votes and 2 Looks votes"));
    }

    #[tokio::test]
    async fn test_standings_rank_by_votes() {
        let app = create_test_app().await;

        let flavor: Vec<&str> = app
            .standings(Category::Flavor)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        let looks: Vec<&str> = app
            .standings(Category::Looks)
            .iter()
            .map(|c| c.id.as_str())
            .collect();

        assert_eq!(flavor, ["c", "a", "b"]);
        assert_eq!(looks, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_navigation_wraps() {
        let mut app = create_test_app().await;
        assert_eq!(app.state.selected(), Some(0));

        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Snickerdoodle", 20), "Snickerdoodle");
        assert_eq!(truncate("Triple Chocolate Fudge", 10), "Triple ...");
    }
}
