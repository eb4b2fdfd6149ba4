use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::records::Record;
use crate::schedule::{compute_due, DueRecord};

/// Local UTC offset, falling back to UTC when the platform cannot tell.
/// Resolve it before spawning threads; some platforms refuse afterwards.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub fn today(offset: UtcOffset) -> Date {
    OffsetDateTime::now_utc().to_offset(offset).date()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded { at: OffsetDateTime },
    Failed { message: String },
}

/// Parsed rows plus the subset due on the current reference date.
///
/// Every mutation recomputes `due_rows` from `all_rows` and `reference`.
#[derive(Debug, Clone)]
pub struct RowStore {
    all_rows: Vec<Record>,
    due_rows: Vec<DueRecord>,
    reference: Date,
    load_state: LoadState,
}

impl RowStore {
    pub fn new(reference: Date) -> Self {
        Self {
            all_rows: Vec::new(),
            due_rows: Vec::new(),
            reference,
            load_state: LoadState::Idle,
        }
    }

    pub fn all_rows(&self) -> &[Record] {
        &self.all_rows
    }

    pub fn due_rows(&self) -> &[DueRecord] {
        &self.due_rows
    }

    pub fn reference(&self) -> Date {
        self.reference
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.load_state, LoadState::Loading)
    }

    pub fn mark_loading(&mut self) {
        self.load_state = LoadState::Loading;
    }

    pub fn replace_rows(&mut self, records: Vec<Record>) {
        self.all_rows = records;
        self.load_state = LoadState::Loaded {
            at: OffsetDateTime::now_utc(),
        };
        self.recompute();
    }

    /// A failed fetch leaves nothing to show rather than stale rows.
    pub fn mark_failed<S: Into<String>>(&mut self, message: S) {
        self.all_rows.clear();
        self.load_state = LoadState::Failed {
            message: message.into(),
        };
        self.recompute();
    }

    pub fn set_reference(&mut self, reference: Date) {
        self.reference = reference;
        self.recompute();
    }

    pub fn reset_to_today(&mut self, today: Date) {
        self.set_reference(today);
    }

    /// Moves the reference date by whole days. Returns false and leaves the
    /// date alone when the shift leaves the representable range.
    pub fn shift_reference(&mut self, days: i64) -> bool {
        match self.reference.checked_add(Duration::days(days)) {
            Some(next) => {
                self.set_reference(next);
                true
            }
            None => false,
        }
    }

    fn recompute(&mut self) {
        self.due_rows = compute_due(&self.all_rows, self.reference);
        tracing::debug!(
            reference = %self.reference,
            total = self.all_rows.len(),
            due = self.due_rows.len(),
            "recomputed due rows"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::parse;
    use assert_matches::assert_matches;
    use time::macros::date;

    const SHEET: &str = "Algebra,01-06-2024,3,http://x\nChemistry,25-05-2024,1,\nBiology,02-06-2024,2,";

    #[test]
    fn due_rows_follow_reference_changes() {
        let mut store = RowStore::new(date!(2024 - 06 - 02));
        store.replace_rows(parse(SHEET));
        assert_eq!(store.all_rows().len(), 3);
        let names: Vec<_> = store
            .due_rows()
            .iter()
            .map(|due| due.record.name.as_str())
            .collect();
        assert_eq!(names, vec!["Algebra"]);

        assert!(store.shift_reference(1));
        assert_eq!(store.reference(), date!(2024 - 06 - 03));
        let names: Vec<_> = store
            .due_rows()
            .iter()
            .map(|due| due.record.name.as_str())
            .collect();
        assert_eq!(names, vec!["Biology"]);

        store.reset_to_today(date!(2024 - 06 - 01));
        let names: Vec<_> = store
            .due_rows()
            .iter()
            .map(|due| due.record.name.as_str())
            .collect();
        assert_eq!(names, vec!["Chemistry"]);
    }

    #[test]
    fn due_rows_are_subset_of_all_rows() {
        let mut store = RowStore::new(date!(2024 - 06 - 02));
        store.replace_rows(parse(SHEET));
        for due in store.due_rows() {
            assert!(store.all_rows().contains(&due.record));
        }
        assert_matches!(store.load_state(), LoadState::Loaded { .. });
    }

    #[test]
    fn failure_clears_rows_and_records_message() {
        let mut store = RowStore::new(date!(2024 - 06 - 02));
        store.replace_rows(parse(SHEET));
        store.mark_loading();
        assert!(store.is_loading());
        store.mark_failed("connection refused");
        assert!(store.all_rows().is_empty());
        assert!(store.due_rows().is_empty());
        assert_matches!(store.load_state(), LoadState::Failed { message } if message == "connection refused");
    }

    #[test]
    fn shift_out_of_range_is_rejected() {
        let mut store = RowStore::new(Date::MAX);
        assert!(!store.shift_reference(1));
        assert_eq!(store.reference(), Date::MAX);
    }
}
