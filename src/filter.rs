//! Multi-facet filter selection for transaction list views.
//!
//! A [`FilterSelection`] is edited through toggles and handed back to the
//! caller with [`FilterSelection::apply`], which consumes it and yields a
//! [`FilterDescriptor`] carrying the number of active facets. Dropping a
//! selection without applying it discards the edits.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::core::{Invalid, Status};
use crate::store::Criteria;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
    AllTime,
    CustomRange,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::ThisWeek => "This Week",
            Self::ThisMonth => "This Month",
            Self::LastMonth => "Last Month",
            Self::ThisYear => "This Year",
            Self::AllTime => "All Time",
            Self::CustomRange => "Custom Range",
        }
    }

    pub fn all() -> &'static [Period] {
        &[
            Self::Today,
            Self::Yesterday,
            Self::ThisWeek,
            Self::ThisMonth,
            Self::LastMonth,
            Self::ThisYear,
            Self::AllTime,
            Self::CustomRange,
        ]
    }

    /// Unknown labels fall back to [`Period::Today`].
    pub fn parse(s: &str) -> Self {
        let wanted = s.trim().to_lowercase().replace(&['-', '_'][..], " ");
        Self::all()
            .iter()
            .copied()
            .find(|p| p.as_str().to_lowercase() == wanted)
            .unwrap_or_default()
    }

    /// Half-open UTC window `[since, until)` covered by the period, with
    /// calendar days taken in the time zone of `now`.
    pub fn window<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        custom: Option<&DateRange>,
    ) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let tz = now.timezone();
        let today = now.date_naive();
        let start = |day: NaiveDate| Some(start_of_day(&tz, day));

        let (from, to) = match self {
            Self::Today => (today, today + Duration::days(1)),
            Self::Yesterday => (today - Duration::days(1), today),
            Self::ThisWeek => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (monday, today + Duration::days(1))
            }
            Self::ThisMonth => {
                let first = first_of_month(today.year(), today.month());
                (first, next_month(first))
            }
            Self::LastMonth => {
                let this = first_of_month(today.year(), today.month());
                (previous_month(this), this)
            }
            Self::ThisYear => (
                first_of_month(today.year(), 1),
                first_of_month(today.year() + 1, 1),
            ),
            Self::AllTime => return (None, None),
            Self::CustomRange => match custom {
                Some(range) => (range.start, range.end + Duration::days(1)),
                None => return (None, None),
            },
        };

        (start(from), start(to))
    }
}

impl Default for Period {
    fn default() -> Self {
        Self::Today
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn next_month(first: NaiveDate) -> NaiveDate {
    match first.month() {
        12 => first_of_month(first.year() + 1, 1),
        m => first_of_month(first.year(), m + 1),
    }
}

fn previous_month(first: NaiveDate) -> NaiveDate {
    match first.month() {
        1 => first_of_month(first.year() - 1, 12),
        m => first_of_month(first.year(), m - 1),
    }
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::default());
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|d| d.with_timezone(&Utc))
        // Midnight skipped by a DST change.
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    period: Period,
    categories: BTreeSet<String>,
    payments: BTreeSet<String>,
    merchants: BTreeSet<String>,
    custom_range: Option<DateRange>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the selection the caller currently has applied.
    pub fn seeded(current: &FilterDescriptor) -> Self {
        Self {
            period: current.period,
            categories: current.categories.clone(),
            payments: current.payments.clone(),
            merchants: current.merchants.clone(),
            custom_range: current.custom_range,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn toggle_period(&mut self, period: Period) {
        self.period = period;
    }

    /// Returns whether `name` is selected afterwards.
    pub fn toggle_category(&mut self, name: &str) -> bool {
        toggle(&mut self.categories, name)
    }

    pub fn toggle_payment(&mut self, name: &str) -> bool {
        toggle(&mut self.payments, name)
    }

    pub fn toggle_merchant(&mut self, name: &str) -> bool {
        toggle(&mut self.merchants, name)
    }

    pub fn set_custom_range(&mut self, start: NaiveDate, end: NaiveDate) {
        self.custom_range = Some(DateRange { start, end });
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn active_count(&self) -> usize {
        let period = usize::from(self.period != Period::Today);
        self.categories.len() + self.payments.len() + self.merchants.len() + period
    }

    /// Hands the selection to the caller. A custom period needs a range
    /// whose start is not after its end.
    pub fn apply(self) -> Result<FilterDescriptor, Invalid> {
        let count = self.active_count();
        let custom_range = match (self.period, self.custom_range) {
            (Period::CustomRange, Some(range)) if range.start <= range.end => Some(range),
            (Period::CustomRange, _) => return Err(Invalid::CustomRange),
            _ => None,
        };

        Ok(FilterDescriptor {
            period: self.period,
            categories: self.categories,
            payments: self.payments,
            merchants: self.merchants,
            custom_range,
            count,
        })
    }
}

fn toggle(set: &mut BTreeSet<String>, name: &str) -> bool {
    if set.remove(name) {
        false
    } else {
        set.insert(name.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterDescriptor {
    pub period: Period,
    pub categories: BTreeSet<String>,
    pub payments: BTreeSet<String>,
    pub merchants: BTreeSet<String>,
    pub custom_range: Option<DateRange>,
    /// Number of active facets.
    pub count: usize,
}

impl FilterDescriptor {
    pub fn criteria<Tz: TimeZone>(&self, now: &DateTime<Tz>, status: Option<Status>) -> Criteria {
        let (since, until) = self.period.window(now, self.custom_range.as_ref());
        Criteria {
            status,
            since,
            until,
            categories: self.categories.iter().cloned().collect(),
            payments: self.payments.iter().cloned().collect(),
            merchants: self.merchants.iter().cloned().collect(),
        }
    }
}
