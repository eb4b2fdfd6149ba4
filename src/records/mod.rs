use serde::Serialize;
use time::macros::format_description;
use time::Date;

/// One row of the revision sheet: `name,DD-MM-YYYY,count,url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub name: String,
    #[serde(rename = "date")]
    pub date_text: String,
    #[serde(skip)]
    pub date: Option<Date>,
    pub revisions: String,
    pub link: Option<String>,
}

impl Record {
    pub fn has_link(&self) -> bool {
        self.link.is_some()
    }
}

/// Splits raw CSV text into records.
///
/// Lines are trimmed and blank lines skipped. A line survives only if it has
/// exactly four comma separated fields and a non-empty date field; anything
/// else is dropped without an error. There is no quoting support.
pub fn parse(csv: &str) -> Vec<Record> {
    let mut records = Vec::new();
    for (index, raw) in csv.split('\n').enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(record) => records.push(record),
            None => tracing::debug!(line = index + 1, "skipping malformed csv row"),
        }
    }
    records
}

fn parse_line(line: &str) -> Option<Record> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [name, date_text, revisions, link] = fields.as_slice() else {
        return None;
    };
    if date_text.is_empty() {
        return None;
    }
    Some(Record {
        name: name.to_string(),
        date_text: date_text.to_string(),
        date: parse_date(date_text),
        revisions: revisions.to_string(),
        link: (!link.is_empty()).then(|| link.to_string()),
    })
}

/// Parses a strict `DD-MM-YYYY` calendar date.
pub fn parse_date(input: &str) -> Option<Date> {
    Date::parse(input.trim(), format_description!("[day]-[month]-[year]")).ok()
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[day]-[month]-[year]"))
        .unwrap_or_else(|_| date.to_string())
}
