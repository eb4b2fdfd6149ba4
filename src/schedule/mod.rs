use serde::Serialize;
use strum::{Display, IntoStaticStr};
use time::{Date, Duration, Month};

use crate::records::Record;

/// Look-back distances at which a studied item comes up for revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Interval {
    #[strum(serialize = "1 day")]
    OneDay,
    #[strum(serialize = "1 week")]
    OneWeek,
    #[strum(serialize = "15 days")]
    FifteenDays,
    #[strum(serialize = "1 month")]
    OneMonth,
    #[strum(serialize = "1 year")]
    OneYear,
}

impl Interval {
    /// Matching order; the first interval that lands on a record's date wins.
    pub const ALL: [Interval; 5] = [
        Interval::OneDay,
        Interval::OneWeek,
        Interval::FifteenDays,
        Interval::OneMonth,
        Interval::OneYear,
    ];

    pub fn label(self) -> &'static str {
        self.into()
    }

    /// The calendar day this interval before `reference`.
    ///
    /// Month and year steps keep the day of month and clamp to the last day
    /// of the target month when it is shorter, so 31-03 minus one month is
    /// the end of February and 29-02 minus one year is 28-02.
    pub fn lookback(self, reference: Date) -> Option<Date> {
        match self {
            Interval::OneDay => reference.checked_sub(Duration::days(1)),
            Interval::OneWeek => reference.checked_sub(Duration::weeks(1)),
            Interval::FifteenDays => reference.checked_sub(Duration::days(15)),
            Interval::OneMonth => sub_months(reference, 1),
            Interval::OneYear => sub_months(reference, 12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueRecord {
    #[serde(flatten)]
    pub record: Record,
    pub interval: Interval,
}

pub fn matching_interval(reference: Date, date: Date) -> Option<Interval> {
    Interval::ALL
        .into_iter()
        .find(|interval| interval.lookback(reference) == Some(date))
}

pub fn is_due(reference: Date, record: &Record) -> bool {
    record
        .date
        .and_then(|date| matching_interval(reference, date))
        .is_some()
}

/// Records due for revision on `reference`, in their original order.
pub fn compute_due(records: &[Record], reference: Date) -> Vec<DueRecord> {
    records
        .iter()
        .filter_map(|record| {
            let interval = matching_interval(reference, record.date?)?;
            Some(DueRecord {
                record: record.clone(),
                interval,
            })
        })
        .collect()
}

fn sub_months(date: Date, months: i32) -> Option<Date> {
    let index = date.year() * 12 + i32::from(u8::from(date.month())) - 1 - months;
    let year = index.div_euclid(12);
    let month = Month::try_from(u8::try_from(index.rem_euclid(12) + 1).ok()?).ok()?;
    let day = date.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).ok()
}
