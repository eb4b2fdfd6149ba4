use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use ratatui::Terminal;
use time::{Date, UtcOffset};

use crate::config::AppConfig;
use crate::fetch::Fetcher;
use crate::store;
use crate::ui;

mod actions;
pub mod state;

pub use actions::ActionDispatcher;
pub use state::{AppState, DatePickerOverlay, OverlayState, SearchState};

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    PreviousDay,
    NextDay,
    Today,
    PickDate,
    StartSearch,
    ClearSearch,
    OpenLink,
    Reload,
}

pub struct App {
    fetcher: Fetcher,
    state: AppState,
    table_state: TableState,
    offset: UtcOffset,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        fetcher: Fetcher,
        reference: Option<Date>,
        offset: UtcOffset,
    ) -> Self {
        let reference = reference.unwrap_or_else(|| store::today(offset));
        let state = AppState::new(reference, config.search.debounce());
        let tick_rate = config.display.tick_rate();
        Self {
            fetcher,
            state,
            table_state: TableState::default(),
            offset,
            should_quit: false,
            tick_rate,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        tracing::info!(source = %self.fetcher.describe(), "starting revision list");
        self.request_fetch();
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.is_empty() {
                        self.table_state.select(None);
                    } else {
                        self.table_state.select(Some(self.state.selected));
                    }
                    ui::draw_app(frame, &self.state, self.fetcher.is_busy(), &mut self.table_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        while let Some(event) = self.fetcher.try_recv() {
            self.state.apply_fetch(event);
        }
        self.state.poll_search(Instant::now());
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);

        if self.state.search.active {
            match key.code {
                KeyCode::Esc => self.state.cancel_search(),
                KeyCode::Enter => self.state.finish_search(),
                KeyCode::Backspace => self.state.pop_search_char(Instant::now()),
                KeyCode::Char(ch) if plain => self.state.push_search_char(ch, Instant::now()),
                _ => {}
            }
            return;
        }

        let action = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Reload)
            }
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Char('j') if plain => Some(Action::SelectNext),
            KeyCode::Char('k') if plain => Some(Action::SelectPrevious),
            KeyCode::Char('h') if plain => Some(Action::PreviousDay),
            KeyCode::Char('l') if plain => Some(Action::NextDay),
            KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Left => Some(Action::PreviousDay),
            KeyCode::Right => Some(Action::NextDay),
            KeyCode::Char('t') if plain => Some(Action::Today),
            KeyCode::Char('g') if plain => Some(Action::PickDate),
            KeyCode::Char('/') if plain => Some(Action::StartSearch),
            KeyCode::Char('r') if plain => Some(Action::Reload),
            KeyCode::Char('o') if plain => Some(Action::OpenLink),
            KeyCode::Enter => Some(Action::OpenLink),
            KeyCode::Esc => Some(Action::ClearSearch),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::PreviousDay => {
                if self.state.shift_day(-1) {
                    self.request_fetch();
                }
            }
            Action::NextDay => {
                if self.state.shift_day(1) {
                    self.request_fetch();
                }
            }
            Action::Today => {
                self.state.go_to_today(store::today(self.offset));
                self.request_fetch();
            }
            Action::PickDate => self.state.open_date_picker(),
            Action::StartSearch => self.state.begin_search(),
            Action::ClearSearch => self.state.cancel_search(),
            Action::OpenLink => self.handle_open_link(),
            Action::Reload => self.request_fetch(),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::DatePicker(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Date unchanged"));
                    }
                    KeyCode::Enter => {
                        if let Some(date) = self.state.submit_date_picker() {
                            tracing::debug!(%date, "reference date picked");
                            self.request_fetch();
                        }
                    }
                    KeyCode::Backspace => self.state.date_picker_pop_char(),
                    KeyCode::Char(ch) => self.state.date_picker_push_char(ch),
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn handle_open_link(&mut self) {
        let Some(row) = self.state.selected_row() else {
            return;
        };
        let record = row.due.record.clone();
        if !record.has_link() {
            self.state.set_status_message(Some("No link for this row"));
            return;
        }
        match ActionDispatcher::new(&self.fetcher).open_link(&record) {
            Ok(()) => self
                .state
                .set_status_message(Some(format!("Opened {}", record.name))),
            Err(err) => {
                tracing::error!(?err, "failed to open link");
                self.state
                    .set_status_message(Some(format!("Could not open link: {err}")));
            }
        }
    }

    fn request_fetch(&mut self) {
        if ActionDispatcher::new(&self.fetcher).reload() {
            self.state.mark_loading();
        } else {
            self.state
                .set_status_message(Some("Already fetching, try again shortly"));
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("creating terminal backend")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leaving alternate screen")?;
    terminal.show_cursor().context("showing cursor")?;
    Ok(())
}
