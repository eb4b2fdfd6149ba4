use std::ops::Range;

use regex::{Regex, RegexBuilder};

/// Literal, case-insensitive matcher for a search query.
pub fn build_highlight_regex(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

pub fn match_ranges(text: &str, regex: &Regex) -> Vec<Range<usize>> {
    regex.find_iter(text).map(|mat| mat.range()).collect()
}

/// Wraps every range of `text` in `open`/`close`. Ranges must be sorted and
/// non-overlapping, which is what `match_ranges` yields.
pub fn apply_markup(text: &str, ranges: &[Range<usize>], open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len() + ranges.len() * (open.len() + close.len()));
    let mut last = 0;
    for range in ranges {
        out.push_str(&text[last..range.start]);
        out.push_str(open);
        out.push_str(&text[range.clone()]);
        out.push_str(close);
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}
