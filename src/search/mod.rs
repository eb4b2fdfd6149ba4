use std::ops::Range;

use regex::Regex;
use serde::Serialize;

use crate::highlight::{apply_markup, build_highlight_regex, match_ranges};
use crate::schedule::DueRecord;

pub const NOTHING_DUE_MESSAGE: &str = "Nothing to revise today. Enjoy your day!";
pub const NO_MATCH_MESSAGE: &str = "No matching records.";

/// A displayed field together with the byte ranges the query matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
    pub text: String,
    pub ranges: Vec<Range<usize>>,
}

impl FieldMatch {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ranges: Vec::new(),
        }
    }

    fn find(text: &str, regex: &Regex) -> Self {
        Self {
            text: text.to_string(),
            ranges: match_ranges(text, regex),
        }
    }

    pub fn is_match(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn markup(&self, open: &str, close: &str) -> String {
        apply_markup(&self.text, &self.ranges, open, close)
    }

    /// Splits the text into `(segment, highlighted)` pieces in order.
    pub fn segments(&self) -> Vec<(&str, bool)> {
        let mut pieces = Vec::with_capacity(self.ranges.len() * 2 + 1);
        let mut last = 0;
        for range in &self.ranges {
            if range.start > last {
                pieces.push((&self.text[last..range.start], false));
            }
            pieces.push((&self.text[range.clone()], true));
            last = range.end;
        }
        if last < self.text.len() || pieces.is_empty() {
            pieces.push((&self.text[last..], false));
        }
        pieces
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleRow {
    pub due: DueRecord,
    pub name: FieldMatch,
    pub date: FieldMatch,
    pub revisions: FieldMatch,
}

impl VisibleRow {
    fn unfiltered(due: &DueRecord) -> Self {
        Self {
            name: FieldMatch::plain(&due.record.name),
            date: FieldMatch::plain(&due.record.date_text),
            revisions: FieldMatch::plain(&due.record.revisions),
            due: due.clone(),
        }
    }

    fn matched(due: &DueRecord, regex: &Regex) -> Option<Self> {
        let row = Self {
            name: FieldMatch::find(&due.record.name, regex),
            date: FieldMatch::find(&due.record.date_text, regex),
            revisions: FieldMatch::find(&due.record.revisions, regex),
            due: due.clone(),
        };
        (row.name.is_match() || row.date.is_match() || row.revisions.is_match()).then_some(row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyReason {
    NothingDue,
    NoMatch,
}

impl EmptyReason {
    pub fn message(self) -> &'static str {
        match self {
            EmptyReason::NothingDue => NOTHING_DUE_MESSAGE,
            EmptyReason::NoMatch => NO_MATCH_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub due_total: usize,
    pub rows: Vec<VisibleRow>,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn empty_reason(&self) -> Option<EmptyReason> {
        if !self.rows.is_empty() {
            None
        } else if self.due_total == 0 {
            Some(EmptyReason::NothingDue)
        } else {
            Some(EmptyReason::NoMatch)
        }
    }
}

pub fn normalize_query(input: &str) -> String {
    input.trim().to_string()
}

/// Narrows the due rows to those containing `query` in their name, date or
/// revision count, case-insensitively, and records every occurrence for
/// highlighting. An empty query keeps every due row without highlights.
pub fn filter(due_rows: &[DueRecord], query: &str) -> SearchOutcome {
    let query = normalize_query(query);
    let rows = match build_highlight_regex(&query) {
        None => due_rows.iter().map(VisibleRow::unfiltered).collect(),
        Some(regex) => due_rows
            .iter()
            .filter_map(|due| VisibleRow::matched(due, &regex))
            .collect(),
    };
    SearchOutcome {
        query,
        due_total: due_rows.len(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::parse;
    use crate::schedule::compute_due;
    use assert_matches::assert_matches;
    use time::macros::date;

    fn due_rows() -> Vec<DueRecord> {
        let records = parse(
            "Algebra,01-06-2024,3,http://x\nLinear algebra,26-05-2024,12,\nChemistry,02-06-2023,1,\nHistory,10-05-2024,2,",
        );
        compute_due(&records, date!(2024 - 06 - 02))
    }

    fn names(outcome: &SearchOutcome) -> Vec<&str> {
        outcome
            .rows
            .iter()
            .map(|row| row.due.record.name.as_str())
            .collect()
    }

    #[test]
    fn empty_query_returns_every_due_row_unhighlighted() {
        let due = due_rows();
        let outcome = filter(&due, "   ");
        assert_eq!(outcome.rows.len(), due.len());
        assert!(outcome.rows.iter().all(|row| {
            !row.name.is_match() && !row.date.is_match() && !row.revisions.is_match()
        }));
        assert_eq!(outcome.rows[0].name.markup("[", "]"), "Algebra");
        assert_eq!(outcome.empty_reason(), None);
    }

    #[test]
    fn query_matches_case_insensitively_across_fields() {
        let due = due_rows();
        let outcome = filter(&due, "ALGEBRA");
        assert_eq!(names(&outcome), vec!["Algebra", "Linear algebra"]);
        assert_eq!(outcome.rows[1].name.markup("[", "]"), "Linear [algebra]");

        let by_date = filter(&due, "05-2024");
        assert_eq!(names(&by_date), vec!["Linear algebra"]);
        assert_eq!(by_date.rows[0].date.markup("[", "]"), "26-[05-2024]");

        let by_count = filter(&due, "12");
        assert_eq!(names(&by_count), vec!["Linear algebra"]);
    }

    #[test]
    fn highlights_every_occurrence() {
        let due = due_rows();
        let outcome = filter(&due, "a");
        let linear = outcome
            .rows
            .iter()
            .find(|row| row.due.record.name == "Linear algebra")
            .expect("row present");
        assert_eq!(linear.name.markup("[", "]"), "Line[a]r [a]lgebr[a]");
    }

    #[test]
    fn link_column_is_not_searched() {
        let due = due_rows();
        let outcome = filter(&due, "http");
        assert_matches!(outcome.empty_reason(), Some(EmptyReason::NoMatch));
    }

    #[test]
    fn empty_states_are_distinguishable() {
        let due = due_rows();
        let no_match = filter(&due, "zoology");
        assert_eq!(no_match.empty_reason(), Some(EmptyReason::NoMatch));
        assert_eq!(
            no_match.empty_reason().map(EmptyReason::message),
            Some(NO_MATCH_MESSAGE)
        );

        let nothing_due = filter(&[], "");
        assert_eq!(nothing_due.empty_reason(), Some(EmptyReason::NothingDue));
        let nothing_due_with_query = filter(&[], "algebra");
        assert_eq!(
            nothing_due_with_query.empty_reason(),
            Some(EmptyReason::NothingDue)
        );
    }

    #[test]
    fn filtering_is_idempotent() {
        let due = due_rows();
        assert_eq!(filter(&due, "al"), filter(&due, "al"));
        assert_eq!(filter(&due, " al "), filter(&due, "al"));
    }

    #[test]
    fn segments_cover_the_whole_text() {
        let due = due_rows();
        let outcome = filter(&due, "gebra");
        let pieces = outcome.rows[0].name.segments();
        assert_eq!(pieces, vec![("Al", false), ("gebra", true)]);
        let plain = filter(&due, "");
        assert_eq!(plain.rows[0].name.segments(), vec![("Algebra", false)]);
    }
}
