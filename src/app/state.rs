use std::time::{Duration, Instant};

use time::{Date, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;

use crate::fetch::FetchEvent;
use crate::records::parse_date;
use crate::search::{filter, normalize_query, EmptyReason, SearchOutcome, VisibleRow};
use crate::store::{LoadState, RowStore};

const DATE_INPUT_LIMIT: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub active: bool,
    pub query: String,
    applied: String,
    pending_since: Option<Instant>,
}

impl SearchState {
    pub fn applied_query(&self) -> &str {
        &self.applied
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatePickerOverlay {
    pub input: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    DatePicker(DatePickerOverlay),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: RowStore,
    pub outcome: SearchOutcome,
    pub selected: usize,
    pub search: SearchState,
    pub overlay: Option<OverlayState>,
    pub status_message: Option<String>,
    debounce: Duration,
}

impl AppState {
    pub fn new(reference: Date, debounce: Duration) -> Self {
        let store = RowStore::new(reference);
        let outcome = filter(store.due_rows(), "");
        Self {
            store,
            outcome,
            selected: 0,
            search: SearchState::default(),
            overlay: None,
            status_message: None,
            debounce,
        }
    }

    pub fn reference(&self) -> Date {
        self.store.reference()
    }

    pub fn rows(&self) -> &[VisibleRow] {
        &self.outcome.rows
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    pub fn selected_row(&self) -> Option<&VisibleRow> {
        self.outcome.rows.get(self.selected)
    }

    /// Message shown in place of the table, if any.
    pub fn empty_message(&self) -> Option<&'static str> {
        if self.store.is_loading() && self.store.all_rows().is_empty() {
            return Some("Loading revision sheet…");
        }
        self.outcome.empty_reason().map(EmptyReason::message)
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.outcome.rows.is_empty() {
            return;
        }
        let len = self.outcome.rows.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1);
        self.selected = next as usize;
    }

    pub fn mark_loading(&mut self) {
        self.store.mark_loading();
    }

    pub fn apply_fetch(&mut self, event: FetchEvent) {
        match event {
            FetchEvent::Loaded { records } => {
                let total = records.len();
                self.store.replace_rows(records);
                self.set_status_message(Some(format!("Loaded {total} rows")));
            }
            FetchEvent::Failed { message } => {
                self.store.mark_failed(message.clone());
                self.set_status_message(Some(format!("Fetch failed: {message}")));
            }
        }
        self.refresh_outcome();
    }

    pub fn load_error(&self) -> Option<&str> {
        match self.store.load_state() {
            LoadState::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn last_loaded_at(&self) -> Option<OffsetDateTime> {
        match self.store.load_state() {
            LoadState::Loaded { at } => Some(*at),
            _ => None,
        }
    }

    pub fn set_reference(&mut self, reference: Date) {
        self.store.set_reference(reference);
        self.refresh_outcome();
    }

    pub fn go_to_today(&mut self, today: Date) {
        self.store.reset_to_today(today);
        self.refresh_outcome();
    }

    pub fn shift_day(&mut self, delta: i64) -> bool {
        if !self.store.shift_reference(delta) {
            self.set_status_message(Some("Date out of range"));
            return false;
        }
        self.refresh_outcome();
        true
    }

    pub fn begin_search(&mut self) {
        self.search.active = true;
    }

    pub fn push_search_char(&mut self, ch: char, now: Instant) {
        self.search.query.push(ch);
        self.schedule_search(now);
    }

    pub fn pop_search_char(&mut self, now: Instant) {
        let Some((idx, _)) = self.search.query.grapheme_indices(true).next_back() else {
            return;
        };
        self.search.query.truncate(idx);
        self.schedule_search(now);
    }

    /// Leaves input mode and applies the query right away.
    pub fn finish_search(&mut self) {
        self.search.active = false;
        self.flush_search();
    }

    pub fn cancel_search(&mut self) {
        self.search.active = false;
        self.search.query.clear();
        self.flush_search();
    }

    /// Applies a pending query once it has been stable for the debounce
    /// window. Returns whether the visible rows were recomputed.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        match self.search.pending_since {
            Some(since) if now.saturating_duration_since(since) >= self.debounce => {
                self.flush_search();
                true
            }
            _ => false,
        }
    }

    fn schedule_search(&mut self, now: Instant) {
        if self.debounce.is_zero() {
            self.flush_search();
        } else {
            self.search.pending_since = Some(now);
        }
    }

    fn flush_search(&mut self) {
        self.search.pending_since = None;
        let query = normalize_query(&self.search.query);
        if query == self.search.applied {
            return;
        }
        self.search.applied = query;
        self.selected = 0;
        self.refresh_outcome();
    }

    fn refresh_outcome(&mut self) {
        self.outcome = filter(self.store.due_rows(), &self.search.applied);
        self.normalize_selection();
    }

    fn normalize_selection(&mut self) {
        if self.outcome.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.outcome.rows.len() {
            self.selected = self.outcome.rows.len() - 1;
        }
    }

    pub fn open_date_picker(&mut self) {
        self.overlay = Some(OverlayState::DatePicker(DatePickerOverlay {
            input: crate::records::format_date(self.reference()),
            error: None,
        }));
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn date_picker_push_char(&mut self, ch: char) {
        if let Some(OverlayState::DatePicker(picker)) = self.overlay.as_mut() {
            if (ch.is_ascii_digit() || ch == '-') && picker.input.len() < DATE_INPUT_LIMIT {
                picker.input.push(ch);
                picker.error = None;
            }
        }
    }

    pub fn date_picker_pop_char(&mut self) {
        if let Some(OverlayState::DatePicker(picker)) = self.overlay.as_mut() {
            picker.input.pop();
            picker.error = None;
        }
    }

    /// Parses the picker input. On success the overlay closes and the new
    /// reference date is applied; otherwise the overlay shows an error.
    pub fn submit_date_picker(&mut self) -> Option<Date> {
        let Some(OverlayState::DatePicker(picker)) = self.overlay.as_mut() else {
            return None;
        };
        match parse_date(&picker.input) {
            Some(date) => {
                self.overlay = None;
                self.set_reference(date);
                Some(date)
            }
            None => {
                picker.error = Some("Use DD-MM-YYYY".to_string());
                None
            }
        }
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::parse;
    use assert_matches::assert_matches;
    use time::macros::date;

    const SHEET: &str = "Algebra,01-06-2024,3,http://x\nAlchemy,26-05-2024,1,\nBiology,02-06-2024,2,";

    fn loaded(debounce_ms: u64) -> AppState {
        let mut state = AppState::new(date!(2024 - 06 - 02), Duration::from_millis(debounce_ms));
        state.mark_loading();
        state.apply_fetch(FetchEvent::Loaded {
            records: parse(SHEET),
        });
        state
    }

    fn visible_names(state: &AppState) -> Vec<String> {
        state
            .rows()
            .iter()
            .map(|row| row.due.record.name.clone())
            .collect()
    }

    #[test]
    fn search_waits_for_debounce_window() {
        let mut state = loaded(300);
        assert_eq!(visible_names(&state), vec!["Algebra", "Alchemy"]);

        let start = Instant::now();
        state.begin_search();
        for ch in "chem".chars() {
            state.push_search_char(ch, start);
        }
        assert!(state.search.is_pending());
        assert!(!state.poll_search(start + Duration::from_millis(100)));
        assert_eq!(state.rows().len(), 2);

        assert!(state.poll_search(start + Duration::from_millis(300)));
        assert_eq!(visible_names(&state), vec!["Alchemy"]);
        assert_eq!(state.search.applied_query(), "chem");
    }

    #[test]
    fn zero_debounce_applies_immediately() {
        let mut state = loaded(0);
        state.begin_search();
        state.push_search_char('b', Instant::now());
        assert_eq!(visible_names(&state), vec!["Algebra"]);
    }

    #[test]
    fn distinguishes_no_match_from_nothing_due() {
        let mut state = loaded(0);
        for ch in "zzz".chars() {
            state.push_search_char(ch, Instant::now());
        }
        assert_eq!(state.empty_message(), Some(crate::search::NO_MATCH_MESSAGE));

        state.cancel_search();
        assert_eq!(state.rows().len(), 2);
        state.set_reference(date!(2024 - 01 - 01));
        assert_eq!(
            state.empty_message(),
            Some(crate::search::NOTHING_DUE_MESSAGE)
        );
    }

    #[test]
    fn search_survives_date_navigation() {
        let mut state = loaded(0);
        state.push_search_char('y', Instant::now());
        state.finish_search();
        assert_eq!(visible_names(&state), vec!["Alchemy"]);
        assert!(state.shift_day(1));
        assert_eq!(state.reference(), date!(2024 - 06 - 03));
        assert_eq!(visible_names(&state), vec!["Biology"]);
    }

    #[test]
    fn backspace_removes_whole_graphemes() {
        let mut state = loaded(0);
        state.push_search_char('e', Instant::now());
        state.push_search_char('\u{301}', Instant::now());
        state.pop_search_char(Instant::now());
        assert_eq!(state.search.query, "");
    }

    #[test]
    fn failed_fetch_shows_nothing_due_and_keeps_error() {
        let mut state = loaded(0);
        state.apply_fetch(FetchEvent::Failed {
            message: "timed out".into(),
        });
        assert!(state.is_empty());
        assert_eq!(state.load_error(), Some("timed out"));
        assert_eq!(
            state.empty_message(),
            Some(crate::search::NOTHING_DUE_MESSAGE)
        );
    }

    #[test]
    fn date_picker_validates_input() {
        let mut state = loaded(0);
        state.open_date_picker();
        assert_matches!(state.overlay(), Some(OverlayState::DatePicker(p)) if p.input == "02-06-2024");
        for _ in 0..10 {
            state.date_picker_pop_char();
        }
        for ch in "31-02-2024".chars() {
            state.date_picker_push_char(ch);
        }
        assert_eq!(state.submit_date_picker(), None);
        assert_matches!(state.overlay(), Some(OverlayState::DatePicker(p)) if p.error.is_some());

        for _ in 0..10 {
            state.date_picker_pop_char();
        }
        for ch in "08-06-2024x".chars() {
            state.date_picker_push_char(ch);
        }
        assert_eq!(state.submit_date_picker(), Some(date!(2024 - 06 - 08)));
        assert!(state.overlay().is_none());
        assert_eq!(visible_names(&state), vec!["Algebra"]);
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut state = loaded(0);
        state.move_selection(5);
        assert_eq!(state.selected, 1);
        state.move_selection(-9);
        assert_eq!(state.selected, 0);
        state.push_search_char('b', Instant::now());
        assert_eq!(
            state.selected_row().map(|row| row.due.record.name.as_str()),
            Some("Algebra")
        );
    }
}
