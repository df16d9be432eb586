//! Recurrence rules in the iCalendar RRULE style.
//!
//! Supported parts: `FREQ` (`YEARLY` down to `MINUTELY`), `INTERVAL`,
//! `COUNT`, `UNTIL`, `BYDAY` (with ordinals under `MONTHLY`, or `YEARLY`
//! with `BYMONTH`), `BYMONTHDAY` (negative counts from month end), `BYMONTH`,
//! `BYHOUR`, `BYMINUTE`, `BYSECOND` and `WKST`. A `DTSTART:` line may
//! precede the rule; without one the series starts at the instant passed in.
//!
//! All arithmetic is in UTC. Sub-second precision is dropped from the start.

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday,
};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Upper bound on periods examined for one lookup.
const MAX_PERIODS: u32 = 1_000_000;

/// How far past its starting point a lookup searches. The Gregorian calendar
/// repeats every 400 years, so a rule silent that long never fires again.
const SEARCH_SPAN: Months = Months::new(400 * 12);

/// Last year an occurrence may fall in.
const LAST_YEAR: i32 = 9999;

/// A lookup examined its whole period budget without finding the next
/// occurrence or proving the series exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("recurrence lookup gave up after {0} periods")]
pub struct SearchLimitReached(pub u32);

/// Largest accepted `INTERVAL`.
const MAX_INTERVAL: i64 = 10_000;

/// Why a rule string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// Nothing but whitespace.
    #[error("recurrence rule is empty")]
    Empty,

    /// No `FREQ` part.
    #[error("FREQ is required")]
    MissingFrequency,

    /// A part name outside the RRULE vocabulary.
    #[error("unknown rule part '{0}'")]
    UnknownPart(String),

    /// A valid RRULE part this engine does not evaluate.
    #[error("unsupported rule part '{0}'")]
    Unsupported(String),

    /// The same part given twice.
    #[error("rule part '{0}' appears more than once")]
    DuplicatePart(String),

    /// A value that does not parse or is out of range.
    #[error("invalid value '{value}' for {part}")]
    InvalidValue {
        /// The part being parsed.
        part: String,
        /// The offending value.
        value: String,
    },

    /// Both terminators were given.
    #[error("COUNT and UNTIL cannot both be set")]
    CountWithUntil,

    /// `BYDAY` ordinals where no month or year frames them.
    #[error("BYDAY ordinals need FREQ=MONTHLY, or FREQ=YEARLY with BYMONTH")]
    OrdinalOutOfContext,
}

/// Base repetition unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Every year.
    Yearly,
    /// Every month.
    Monthly,
    /// Every week.
    Weekly,
    /// Every day.
    Daily,
    /// Every hour.
    Hourly,
    /// Every minute.
    Minutely,
}

/// One `BYDAY` entry, e.g. `MO` or `-1FR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdaySpec {
    /// The day of the week.
    pub weekday: Weekday,
    /// Which occurrence within the month; negative counts from the end.
    pub ordinal: Option<i32>,
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    /// Explicit series start, from a `DTSTART:` line.
    pub dtstart: Option<DateTime<Utc>>,
    /// Base repetition unit.
    pub frequency: Frequency,
    /// Periods between repetitions.
    pub interval: u32,
    /// Total number of occurrences, counted from the series start.
    pub count: Option<u32>,
    /// Last instant an occurrence may fall on (inclusive).
    pub until: Option<DateTime<Utc>>,
    /// Weekday filter or expansion.
    pub by_day: Vec<WeekdaySpec>,
    /// Days of month; negative values count from the end.
    pub by_month_day: Vec<i32>,
    /// Months, 1-12.
    pub by_month: Vec<u32>,
    /// Hours, 0-23.
    pub by_hour: Vec<u32>,
    /// Minutes, 0-59.
    pub by_minute: Vec<u32>,
    /// Seconds, 0-59.
    pub by_second: Vec<u32>,
    /// First day of the week for `WEEKLY` periods.
    pub week_start: Weekday,
}

/// Whether `rule` parses as a supported recurrence rule.
#[must_use]
pub fn validate(rule: &str) -> bool {
    RecurrenceRule::parse(rule).is_ok()
}

/// The first occurrence of `rule` strictly after `after`.
///
/// Returns `None` when the series is exhausted or the rule does not parse.
/// A lookup that gives up is logged and also reads as `None`; callers that
/// must tell it apart use [`RecurrenceRule::next_after`].
#[must_use]
pub fn next_occurrence(rule: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match RecurrenceRule::parse(rule).map(|parsed| parsed.next_after(after)) {
        Ok(Ok(next)) => next,
        Ok(Err(e)) => {
            warn!(rule, error = %e, "recurrence lookup gave up");
            None
        }
        Err(e) => {
            debug!(rule, error = %e, "unparseable recurrence rule");
            None
        }
    }
}

impl RecurrenceRule {
    /// Parse a rule, optionally preceded by a `DTSTART:` line.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first problem found.
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let mut dtstart = None;
        let mut body: Option<String> = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let upper = line.to_ascii_uppercase();
            if let Some(rest) = upper.strip_prefix("DTSTART") {
                let value = rest
                    .strip_prefix(':')
                    .ok_or_else(|| RuleError::Unsupported("DTSTART parameters".to_string()))?;
                if dtstart.is_some() {
                    return Err(RuleError::DuplicatePart("DTSTART".to_string()));
                }
                dtstart = Some(parse_datetime("DTSTART", value)?);
            } else {
                if body.is_some() {
                    return Err(RuleError::DuplicatePart("RRULE".to_string()));
                }
                body = Some(upper.strip_prefix("RRULE:").unwrap_or(&upper).to_string());
            }
        }

        let Some(body) = body else {
            return Err(if dtstart.is_some() { RuleError::MissingFrequency } else { RuleError::Empty });
        };
        Self::parse_parts(&body, dtstart)
    }

    fn parse_parts(body: &str, dtstart: Option<DateTime<Utc>>) -> Result<Self, RuleError> {
        let mut seen = HashSet::new();
        let mut frequency = None;
        let mut rule = Self {
            dtstart,
            frequency: Frequency::Daily,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            by_second: Vec::new(),
            week_start: Weekday::Mon,
        };

        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| RuleError::InvalidValue {
                part: part.to_string(),
                value: String::new(),
            })?;
            if !seen.insert(key) {
                return Err(RuleError::DuplicatePart(key.to_string()));
            }
            match key {
                "FREQ" => frequency = Some(parse_frequency(value)?),
                "INTERVAL" => rule.interval = to_u32(key, value, parse_int(key, value, 1, MAX_INTERVAL)?)?,
                "COUNT" => rule.count = Some(to_u32(key, value, parse_int(key, value, 1, i64::from(u32::MAX))?)?),
                "UNTIL" => rule.until = Some(parse_datetime(key, value)?),
                "BYDAY" => {
                    rule.by_day = value
                        .split(',')
                        .map(|item| parse_weekday_spec(item.trim()))
                        .collect::<Result<_, _>>()?;
                }
                "BYMONTHDAY" => {
                    let mut days = Vec::new();
                    for day in parse_list(key, value, -31, 31)? {
                        if day == 0 {
                            return Err(invalid(key, value));
                        }
                        days.push(to_i32(key, value, day)?);
                    }
                    rule.by_month_day = days;
                }
                "BYMONTH" => rule.by_month = parse_unsigned_list(key, value, 1, 12)?,
                "BYHOUR" => rule.by_hour = parse_unsigned_list(key, value, 0, 23)?,
                "BYMINUTE" => rule.by_minute = parse_unsigned_list(key, value, 0, 59)?,
                "BYSECOND" => rule.by_second = parse_unsigned_list(key, value, 0, 59)?,
                "WKST" => rule.week_start = parse_weekday(key, value)?,
                "BYSETPOS" | "BYYEARDAY" | "BYWEEKNO" | "BYEASTER" | "RSCALE" | "SKIP" => {
                    return Err(RuleError::Unsupported(key.to_string()));
                }
                _ => return Err(RuleError::UnknownPart(key.to_string())),
            }
        }

        rule.frequency = frequency.ok_or(RuleError::MissingFrequency)?;
        if rule.count.is_some() && rule.until.is_some() {
            return Err(RuleError::CountWithUntil);
        }
        let ordinals_allowed = rule.frequency == Frequency::Monthly
            || (rule.frequency == Frequency::Yearly && !rule.by_month.is_empty());
        if !ordinals_allowed && rule.by_day.iter().any(|spec| spec.ordinal.is_some()) {
            return Err(RuleError::OrdinalOutOfContext);
        }
        Ok(rule)
    }

    /// The first occurrence strictly after `after`.
    ///
    /// The series starts at `dtstart` when present, otherwise at `after`.
    /// `Ok(None)` means the series is exhausted: its `COUNT` or `UNTIL` ran
    /// out, or nothing matches within 400 years or before year 10000.
    ///
    /// # Errors
    ///
    /// Returns [`SearchLimitReached`] if the lookup examined too many periods
    /// to decide either way.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, SearchLimitReached> {
        self.search(after, MAX_PERIODS)
    }

    fn search(&self, after: DateTime<Utc>, budget: u32) -> Result<Option<DateTime<Utc>>, SearchLimitReached> {
        let Some(start) = self.dtstart.unwrap_or(after).with_nanosecond(0) else {
            return Ok(None);
        };
        let horizon = after.max(start).naive_utc().checked_add_months(SEARCH_SPAN);
        let beyond = |instant: NaiveDateTime| {
            instant.year() > LAST_YEAR || horizon.is_some_and(|limit| instant > limit)
        };

        // Counting needs every occurrence from the start, so COUNT rules only
        // skip ahead when each skipped period holds exactly one occurrence.
        let first = if self.count.is_none() || self.one_per_period() {
            self.periods_before(start, after)
        } else {
            0
        };
        let mut emitted = if self.count.is_some() { first } else { 0 };
        let mut period = first;

        for _ in 0..budget {
            let Some(floor) = self.period_floor(start, period) else {
                return Ok(None);
            };
            if beyond(floor) {
                return Ok(None);
            }
            let candidates = self.period_candidates(start, floor);
            for &candidate in &candidates {
                if candidate < start {
                    continue;
                }
                if beyond(candidate.naive_utc()) || self.until.is_some_and(|until| candidate > until) {
                    return Ok(None);
                }
                emitted = emitted.saturating_add(1);
                if self.count.is_some_and(|count| emitted > count) {
                    return Ok(None);
                }
                if candidate > after {
                    return Ok(Some(candidate));
                }
            }
            let next = if candidates.is_empty() { self.skip_rejected_date(start, floor, period) } else { None };
            period = match next.or_else(|| period.checked_add(1)) {
                Some(next) => next,
                None => return Ok(None),
            };
        }
        Err(SearchLimitReached(budget))
    }

    /// Whether every period holds exactly one occurrence, the first being the start.
    fn one_per_period(&self) -> bool {
        matches!(self.frequency, Frequency::Weekly | Frequency::Daily | Frequency::Hourly | Frequency::Minutely)
            && self.by_day.is_empty()
            && self.by_month_day.is_empty()
            && self.by_month.is_empty()
            && self.by_hour.is_empty()
            && self.by_minute.is_empty()
            && self.by_second.is_empty()
    }

    /// Number of whole periods that end before `after`, conservatively.
    fn periods_before(&self, start: DateTime<Utc>, after: DateTime<Utc>) -> u32 {
        if after <= start {
            return 0;
        }
        let days = (after.date_naive() - start.date_naive()).num_days();
        let units = match self.frequency {
            Frequency::Yearly => i64::from(after.year() - start.year()),
            Frequency::Monthly => month_index(after) - month_index(start),
            Frequency::Weekly => days / 7,
            Frequency::Daily => days,
            Frequency::Hourly => (after - start).num_hours(),
            Frequency::Minutely => (after - start).num_minutes(),
        };
        let periods = units / i64::from(self.interval) - 1;
        u32::try_from(periods.max(0)).unwrap_or(u32::MAX)
    }

    /// Where the `period`-th period after the start begins.
    ///
    /// `None` once the period lies outside the representable calendar.
    fn period_floor(&self, start: DateTime<Utc>, period: u32) -> Option<NaiveDateTime> {
        let step = i64::from(period).checked_mul(i64::from(self.interval))?;
        let midnight = |date: NaiveDate| date.and_hms_opt(0, 0, 0);
        match self.frequency {
            Frequency::Yearly => {
                let year = i32::try_from(i64::from(start.year()).checked_add(step)?).ok()?;
                midnight(NaiveDate::from_ymd_opt(year, 1, 1)?)
            }
            Frequency::Monthly => {
                let index = month_index(start).checked_add(step)?;
                let year = i32::try_from(index.div_euclid(12)).ok()?;
                let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
                midnight(NaiveDate::from_ymd_opt(year, month, 1)?)
            }
            Frequency::Weekly => {
                let offset = days_since(self.week_start, start.weekday());
                let week = start
                    .date_naive()
                    .checked_sub_signed(Duration::try_days(offset)?)?
                    .checked_add_signed(Duration::try_days(step.checked_mul(7)?)?)?;
                midnight(week)
            }
            Frequency::Daily => midnight(start.date_naive().checked_add_signed(Duration::try_days(step)?)?),
            Frequency::Hourly => truncate(start, start.hour(), 0)?.checked_add_signed(Duration::try_hours(step)?),
            Frequency::Minutely => {
                truncate(start, start.hour(), start.minute())?.checked_add_signed(Duration::try_minutes(step)?)
            }
        }
    }

    /// For daily and finer rules whose period at `floor` falls on a date the
    /// filters reject, the first later period on a date they might accept.
    fn skip_rejected_date(&self, start: DateTime<Utc>, floor: NaiveDateTime, period: u32) -> Option<u32> {
        let unit = match self.frequency {
            Frequency::Daily => Duration::try_days(i64::from(self.interval))?,
            Frequency::Hourly => Duration::try_hours(i64::from(self.interval))?,
            Frequency::Minutely => Duration::try_minutes(i64::from(self.interval))?,
            Frequency::Yearly | Frequency::Monthly | Frequency::Weekly => return None,
        };
        let date = floor.date();
        if self.date_matches(date) {
            return None;
        }
        let target = if allows(&self.by_month, date.month()) {
            date.succ_opt()?
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.checked_add_months(Months::new(1))?
        };
        let origin = self.period_floor(start, 0)?;
        let ahead = (target.and_hms_opt(0, 0, 0)? - origin).num_seconds();
        let unit = unit.num_seconds();
        let periods = (ahead + unit - 1).div_euclid(unit);
        u32::try_from(periods).ok().filter(|&next| next > period)
    }

    /// Occurrences inside the period beginning at `floor`, ascending.
    fn period_candidates(&self, start: DateTime<Utc>, floor: NaiveDateTime) -> Vec<DateTime<Utc>> {
        let dates: Vec<NaiveDate> = match self.frequency {
            Frequency::Yearly => {
                let year = floor.year();
                let months: Vec<u32> = if !self.by_month.is_empty() {
                    self.by_month.clone()
                } else if !self.by_month_day.is_empty() || !self.by_day.is_empty() {
                    (1..=12).collect()
                } else {
                    vec![start.month()]
                };
                months
                    .into_iter()
                    .flat_map(|month| {
                        self.month_days(year, month, start)
                            .into_iter()
                            .filter_map(move |day| NaiveDate::from_ymd_opt(year, month, day))
                    })
                    .collect()
            }
            Frequency::Monthly => {
                let (year, month) = (floor.year(), floor.month());
                if allows(&self.by_month, month) {
                    self.month_days(year, month, start)
                        .into_iter()
                        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
                        .collect()
                } else {
                    Vec::new()
                }
            }
            Frequency::Weekly => (0..7)
                .filter_map(|i| floor.date().checked_add_signed(Duration::try_days(i)?))
                .filter(|date| {
                    (!self.by_day.is_empty() || date.weekday() == start.weekday()) && self.date_matches(*date)
                })
                .collect(),
            Frequency::Daily => {
                if self.date_matches(floor.date()) {
                    vec![floor.date()]
                } else {
                    Vec::new()
                }
            }
            Frequency::Hourly => {
                if !self.date_matches(floor.date()) || !allows(&self.by_hour, floor.hour()) {
                    return Vec::new();
                }
                let minutes = or_default(&self.by_minute, start.minute());
                let seconds = or_default(&self.by_second, start.second());
                return combine(floor.date(), &[floor.hour()], &minutes, &seconds);
            }
            Frequency::Minutely => {
                if !self.date_matches(floor.date())
                    || !allows(&self.by_hour, floor.hour())
                    || !allows(&self.by_minute, floor.minute())
                {
                    return Vec::new();
                }
                let seconds = or_default(&self.by_second, start.second());
                return combine(floor.date(), &[floor.hour()], &[floor.minute()], &seconds);
            }
        };

        let hours = or_default(&self.by_hour, start.hour());
        let minutes = or_default(&self.by_minute, start.minute());
        let seconds = or_default(&self.by_second, start.second());
        let mut out = Vec::new();
        for date in dates {
            out.extend(combine(date, &hours, &minutes, &seconds));
        }
        out.sort_unstable();
        out
    }

    /// Days of `year`-`month` selected by the day rules, ascending.
    fn month_days(&self, year: i32, month: u32, start: DateTime<Utc>) -> Vec<u32> {
        let last = days_in_month(year, month);
        let mut days = BTreeSet::new();

        if !self.by_month_day.is_empty() {
            days.extend(self.by_month_day.iter().filter_map(|&d| resolve_month_day(d, last)));
            if !self.by_day.is_empty() {
                days.retain(|&day| {
                    self.by_day.iter().any(|spec| weekday_days(year, month, last, *spec).contains(&day))
                });
            }
        } else if !self.by_day.is_empty() {
            for spec in &self.by_day {
                days.extend(weekday_days(year, month, last, *spec));
            }
        } else if start.day() <= last {
            days.insert(start.day());
        }

        days.into_iter().collect()
    }

    /// Whether `date` passes the month, month-day and weekday filters.
    fn date_matches(&self, date: NaiveDate) -> bool {
        let last = days_in_month(date.year(), date.month());
        allows(&self.by_month, date.month())
            && (self.by_month_day.is_empty()
                || self.by_month_day.iter().any(|&d| resolve_month_day(d, last) == Some(date.day())))
            && (self.by_day.is_empty() || self.by_day.iter().any(|spec| spec.weekday == date.weekday()))
    }
}

fn month_index(instant: DateTime<Utc>) -> i64 {
    i64::from(instant.year()) * 12 + i64::from(instant.month0())
}

fn days_since(week_start: Weekday, day: Weekday) -> i64 {
    i64::from((day.num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(28, |d| d.day())
}

fn resolve_month_day(day: i32, last: u32) -> Option<u32> {
    let last = i32::try_from(last).ok()?;
    let resolved = if day > 0 { day } else { last + 1 + day };
    if (1..=last).contains(&resolved) {
        u32::try_from(resolved).ok()
    } else {
        None
    }
}

/// Days of the month falling on `spec.weekday`, narrowed by its ordinal.
fn weekday_days(year: i32, month: u32, last: u32, spec: WeekdaySpec) -> Vec<u32> {
    let matching: Vec<u32> = (1..=last)
        .filter(|&day| NaiveDate::from_ymd_opt(year, month, day).is_some_and(|d| d.weekday() == spec.weekday))
        .collect();
    match spec.ordinal {
        None => matching,
        Some(n) => {
            let len = i64::try_from(matching.len()).unwrap_or(0);
            let index = if n > 0 { i64::from(n) - 1 } else { len + i64::from(n) };
            usize::try_from(index)
                .ok()
                .and_then(|i| matching.get(i).copied())
                .into_iter()
                .collect()
        }
    }
}

fn allows(filter: &[u32], value: u32) -> bool {
    filter.is_empty() || filter.contains(&value)
}

fn or_default(values: &[u32], default: u32) -> Vec<u32> {
    if values.is_empty() {
        vec![default]
    } else {
        values.to_vec()
    }
}

fn truncate(start: DateTime<Utc>, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    start.date_naive().and_hms_opt(hour, minute, 0)
}

fn combine(date: NaiveDate, hours: &[u32], minutes: &[u32], seconds: &[u32]) -> Vec<DateTime<Utc>> {
    let mut out = Vec::with_capacity(hours.len() * minutes.len() * seconds.len());
    for &hour in hours {
        for &minute in minutes {
            for &second in seconds {
                if let Some(time) = NaiveTime::from_hms_opt(hour, minute, second) {
                    out.push(Utc.from_utc_datetime(&date.and_time(time)));
                }
            }
        }
    }
    out.sort_unstable();
    out
}

fn invalid(part: &str, value: &str) -> RuleError {
    RuleError::InvalidValue { part: part.to_string(), value: value.to_string() }
}

fn parse_frequency(value: &str) -> Result<Frequency, RuleError> {
    match value {
        "YEARLY" => Ok(Frequency::Yearly),
        "MONTHLY" => Ok(Frequency::Monthly),
        "WEEKLY" => Ok(Frequency::Weekly),
        "DAILY" => Ok(Frequency::Daily),
        "HOURLY" => Ok(Frequency::Hourly),
        "MINUTELY" => Ok(Frequency::Minutely),
        "SECONDLY" => Err(RuleError::Unsupported("FREQ=SECONDLY".to_string())),
        _ => Err(invalid("FREQ", value)),
    }
}

fn parse_int(part: &str, value: &str, min: i64, max: i64) -> Result<i64, RuleError> {
    let number: i64 = value.trim().parse().map_err(|_| invalid(part, value))?;
    if (min..=max).contains(&number) {
        Ok(number)
    } else {
        Err(invalid(part, value))
    }
}

fn to_u32(part: &str, value: &str, number: i64) -> Result<u32, RuleError> {
    u32::try_from(number).map_err(|_| invalid(part, value))
}

fn to_i32(part: &str, value: &str, number: i64) -> Result<i32, RuleError> {
    i32::try_from(number).map_err(|_| invalid(part, value))
}

fn parse_list(part: &str, value: &str, min: i64, max: i64) -> Result<Vec<i64>, RuleError> {
    let mut items: Vec<i64> =
        value.split(',').map(|item| parse_int(part, item, min, max)).collect::<Result<_, _>>()?;
    items.sort_unstable();
    items.dedup();
    Ok(items)
}

fn parse_unsigned_list(part: &str, value: &str, min: i64, max: i64) -> Result<Vec<u32>, RuleError> {
    parse_list(part, value, min, max)?.into_iter().map(|n| to_u32(part, value, n)).collect()
}

fn parse_weekday(part: &str, value: &str) -> Result<Weekday, RuleError> {
    match value {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(invalid(part, value)),
    }
}

fn parse_weekday_spec(item: &str) -> Result<WeekdaySpec, RuleError> {
    if item.len() < 2 || !item.is_char_boundary(item.len() - 2) {
        return Err(invalid("BYDAY", item));
    }
    let (ordinal, day) = item.split_at(item.len() - 2);
    let weekday = parse_weekday("BYDAY", day).map_err(|_| invalid("BYDAY", item))?;
    let ordinal = if ordinal.is_empty() {
        None
    } else {
        let n = parse_int("BYDAY", ordinal, -53, 53).map_err(|_| invalid("BYDAY", item))?;
        if n == 0 {
            return Err(invalid("BYDAY", item));
        }
        Some(to_i32("BYDAY", item, n)?)
    };
    Ok(WeekdaySpec { weekday, ordinal })
}

/// Parse `YYYYMMDDTHHMMSSZ`, `YYYYMMDDTHHMMSS` (read as UTC) or `YYYYMMDD`
/// (midnight UTC). Years outside 0000-9999 are rejected.
fn parse_datetime(part: &str, value: &str) -> Result<DateTime<Utc>, RuleError> {
    let value = value.trim();
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S"))
        .ok()
        .or_else(|| NaiveDate::parse_from_str(value, "%Y%m%d").ok()?.and_hms_opt(0, 0, 0));
    match naive {
        Some(naive) if (0..=LAST_YEAR).contains(&naive.year()) => Ok(Utc.from_utc_datetime(&naive)),
        _ => Err(invalid(part, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_daily_from_after() {
        assert_eq!(next_occurrence("FREQ=DAILY", at(2025, 1, 6, 9, 0)), Some(at(2025, 1, 7, 9, 0)));
    }

    #[test]
    fn test_weekly_advances_one_week_at_a_time() {
        let mut current = at(2025, 1, 6, 9, 0);
        for expected in [at(2025, 1, 13, 9, 0), at(2025, 1, 20, 9, 0), at(2025, 1, 27, 9, 0)] {
            current = next_occurrence("FREQ=WEEKLY", current).unwrap();
            assert_eq!(current, expected);
        }
    }

    #[test]
    fn test_weekly_byday_picks_next_listed_day() {
        let rule = "RRULE:FREQ=WEEKLY;BYDAY=MO,WE;BYHOUR=9;BYMINUTE=0";
        assert_eq!(next_occurrence(rule, at(2025, 1, 6, 9, 0)), Some(at(2025, 1, 8, 9, 0)));
        assert_eq!(next_occurrence(rule, at(2025, 1, 8, 9, 0)), Some(at(2025, 1, 13, 9, 0)));
    }

    #[test]
    fn test_biweekly_interval() {
        let rule = "FREQ=WEEKLY;INTERVAL=2";
        assert_eq!(next_occurrence(rule, at(2025, 1, 6, 9, 0)), Some(at(2025, 1, 20, 9, 0)));
    }

    #[test]
    fn test_monthly_on_31st_skips_short_months() {
        let rule = "DTSTART:20250131T100000Z\nRRULE:FREQ=MONTHLY";
        assert_eq!(next_occurrence(rule, at(2025, 1, 31, 10, 0)), Some(at(2025, 3, 31, 10, 0)));
    }

    #[test]
    fn test_last_day_of_month() {
        let rule = "FREQ=MONTHLY;BYMONTHDAY=-1";
        assert_eq!(next_occurrence(rule, at(2025, 2, 10, 8, 0)), Some(at(2025, 2, 28, 8, 0)));
        assert_eq!(next_occurrence(rule, at(2024, 2, 10, 8, 0)), Some(at(2024, 2, 29, 8, 0)));
    }

    #[test]
    fn test_monthly_ordinal_weekdays() {
        assert_eq!(
            next_occurrence("FREQ=MONTHLY;BYDAY=2TU", at(2025, 1, 15, 12, 0)),
            Some(at(2025, 2, 11, 12, 0))
        );
        assert_eq!(
            next_occurrence("FREQ=MONTHLY;BYDAY=-1FR", at(2025, 1, 1, 0, 0)),
            Some(at(2025, 1, 31, 0, 0))
        );
    }

    #[test]
    fn test_yearly_with_month_and_ordinal() {
        let rule = "FREQ=YEARLY;BYMONTH=11;BYDAY=4TH";
        assert_eq!(next_occurrence(rule, at(2025, 1, 1, 0, 0)), Some(at(2025, 11, 27, 0, 0)));
    }

    #[test]
    fn test_yearly_leap_day_waits_for_next_leap_year() {
        let rule = "DTSTART:20240229T000000Z\nRRULE:FREQ=YEARLY";
        assert_eq!(next_occurrence(rule, at(2024, 2, 29, 0, 0)), Some(at(2028, 2, 29, 0, 0)));
    }

    #[test]
    fn test_count_is_measured_from_dtstart() {
        let rule = "DTSTART:20250101T090000Z\nRRULE:FREQ=DAILY;COUNT=3";
        assert_eq!(next_occurrence(rule, at(2024, 12, 1, 0, 0)), Some(at(2025, 1, 1, 9, 0)));
        assert_eq!(next_occurrence(rule, at(2025, 1, 2, 9, 0)), Some(at(2025, 1, 3, 9, 0)));
        assert_eq!(next_occurrence(rule, at(2025, 1, 3, 9, 0)), None);
    }

    #[test]
    fn test_count_one_without_dtstart_is_exhausted() {
        assert_eq!(next_occurrence("FREQ=WEEKLY;COUNT=1", at(2025, 1, 6, 9, 0)), None);
    }

    #[test]
    fn test_until_is_inclusive() {
        let rule = "DTSTART:20250101T090000Z\nRRULE:FREQ=DAILY;UNTIL=20250103T090000Z";
        assert_eq!(next_occurrence(rule, at(2025, 1, 2, 9, 0)), Some(at(2025, 1, 3, 9, 0)));
        assert_eq!(next_occurrence(rule, at(2025, 1, 3, 9, 0)), None);
    }

    #[test]
    fn test_date_only_until_means_midnight() {
        let rule = "DTSTART:20250101T090000Z\nRRULE:FREQ=DAILY;UNTIL=20250103";
        assert_eq!(next_occurrence(rule, at(2025, 1, 2, 9, 0)), None);
    }

    #[test]
    fn test_hourly_by_minute() {
        let rule = "FREQ=HOURLY;BYMINUTE=0,30";
        assert_eq!(next_occurrence(rule, at(2025, 1, 1, 10, 10)), Some(at(2025, 1, 1, 10, 30)));
        assert_eq!(next_occurrence(rule, at(2025, 1, 1, 10, 30)), Some(at(2025, 1, 1, 11, 0)));
    }

    #[test]
    fn test_minutely_interval() {
        let rule = "FREQ=MINUTELY;INTERVAL=15";
        assert_eq!(next_occurrence(rule, at(2025, 1, 1, 10, 0)), Some(at(2025, 1, 1, 10, 15)));
    }

    #[test]
    fn test_dtstart_far_in_past_skips_ahead() {
        let rule = "DTSTART:20000103T070000Z\nRRULE:FREQ=DAILY";
        assert_eq!(next_occurrence(rule, at(2025, 6, 1, 12, 0)), Some(at(2025, 6, 2, 7, 0)));
    }

    #[test]
    fn test_minutely_in_one_month_jumps_to_that_month() {
        let rule = "FREQ=MINUTELY;BYMONTH=12";
        assert!(validate(rule));
        assert_eq!(next_occurrence(rule, at(2025, 1, 6, 9, 0)), Some(at(2025, 12, 1, 0, 0)));
        assert_eq!(next_occurrence(rule, at(2025, 12, 1, 0, 0)), Some(at(2025, 12, 1, 0, 1)));
    }

    #[test]
    fn test_hourly_on_a_month_day_skips_other_days() {
        let rule = "FREQ=HOURLY;INTERVAL=5;BYMONTHDAY=15";
        // Periods stay on the five-hour grid from 02:00 on the 1st.
        assert_eq!(next_occurrence(rule, at(2025, 1, 1, 2, 0)), Some(at(2025, 1, 15, 1, 0)));
    }

    #[test]
    fn test_count_with_dtstart_far_back_still_finds_next() {
        let rule = "DTSTART:20250101T000000Z\nRRULE:FREQ=MINUTELY;COUNT=200000";
        assert_eq!(next_occurrence(rule, at(2025, 3, 20, 0, 0)), Some(at(2025, 3, 20, 0, 1)));
        // 200000 minutes after the start is 2025-05-19T21:19; that was the last one.
        assert_eq!(next_occurrence(rule, at(2025, 5, 19, 21, 18)), Some(at(2025, 5, 19, 21, 19)));
        assert_eq!(next_occurrence(rule, at(2025, 5, 19, 21, 19)), None);
    }

    #[test]
    fn test_rule_that_never_matches_is_exhausted() {
        let rule = RecurrenceRule::parse("FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=30").unwrap();
        assert_eq!(rule.next_after(at(2025, 1, 1, 0, 0)), Ok(None));
    }

    #[test]
    fn test_series_ends_before_year_ten_thousand() {
        let rule = RecurrenceRule::parse("FREQ=YEARLY").unwrap();
        assert_eq!(rule.next_after(at(9998, 6, 1, 0, 0)), Ok(Some(at(9999, 6, 1, 0, 0))));
        assert_eq!(rule.next_after(at(9999, 6, 1, 0, 0)), Ok(None));
    }

    #[test]
    fn test_exhausted_budget_is_not_exhaustion() {
        let rule = RecurrenceRule::parse("FREQ=MINUTELY;BYHOUR=23").unwrap();
        assert_eq!(rule.search(at(2025, 1, 1, 0, 0), 10), Err(SearchLimitReached(10)));
        assert_eq!(rule.next_after(at(2025, 1, 1, 0, 0)), Ok(Some(at(2025, 1, 1, 23, 0))));
    }

    #[test]
    fn test_dates_outside_four_digit_years_are_invalid() {
        assert!(!validate("FREQ=DAILY;UNTIL=100000101T000000Z"));
        assert!(validate("DTSTART:99991231T000000Z\nRRULE:FREQ=DAILY"));
    }

    #[test]
    fn test_sub_second_precision_is_dropped() {
        let after = at(2025, 1, 6, 9, 0) + Duration::milliseconds(250);
        assert_eq!(next_occurrence("FREQ=DAILY", after), Some(at(2025, 1, 7, 9, 0)));
    }

    #[test]
    fn test_validate_accepts_supported_rules() {
        for rule in [
            "FREQ=DAILY",
            "freq=daily;interval=2",
            "RRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR;WKST=SU",
            "FREQ=YEARLY;BYMONTH=11;BYDAY=4TH",
            "FREQ=MONTHLY;BYMONTHDAY=1,15,-1",
            "DTSTART:20250101T090000Z\nRRULE:FREQ=DAILY;COUNT=5",
            "FREQ=DAILY;UNTIL=20251231T235959Z",
        ] {
            assert!(validate(rule), "{rule} should be valid");
        }
    }

    #[test]
    fn test_validate_rejects_malformed_rules() {
        for rule in [
            "",
            "   ",
            "INTERVAL=2",
            "FREQ=FORTNIGHTLY",
            "FREQ=SECONDLY",
            "FREQ=DAILY;COUNT=2;UNTIL=20250101",
            "FREQ=WEEKLY;BYDAY=1MO",
            "FREQ=DAILY;BYHOUR=24",
            "FREQ=DAILY;FOO=1",
            "FREQ=DAILY;INTERVAL=0",
            "FREQ=DAILY;BYSETPOS=1",
            "FREQ=DAILY;FREQ=WEEKLY",
            "FREQ=MONTHLY;BYMONTHDAY=0",
            "FREQ=MONTHLY;BYDAY=XX",
            "FREQ=DAILY;UNTIL=tomorrow",
            "FREQ=DAILY;COUNT",
            "DTSTART:20250101T090000Z",
        ] {
            assert!(!validate(rule), "{rule:?} should be invalid");
        }
    }

    #[test]
    fn test_parse_errors_are_specific() {
        assert_eq!(RecurrenceRule::parse("").unwrap_err(), RuleError::Empty);
        assert_eq!(
            RecurrenceRule::parse("FREQ=DAILY;COUNT=1;UNTIL=20250101").unwrap_err(),
            RuleError::CountWithUntil
        );
        assert_eq!(
            RecurrenceRule::parse("FREQ=DAILY;BYWEEKNO=3").unwrap_err(),
            RuleError::Unsupported("BYWEEKNO".to_string())
        );
    }

    #[test]
    fn test_invalid_rule_has_no_next_occurrence() {
        assert_eq!(next_occurrence("FREQ=NEVER", at(2025, 1, 1, 0, 0)), None);
    }

    proptest! {
        #[test]
        fn prop_daily_interval_lands_exactly_n_days_later(
            interval in 1i64..60,
            offset in 0i64..2_000_000_000,
        ) {
            let after = Utc.timestamp_opt(offset, 0).unwrap();
            let rule = format!("FREQ=DAILY;INTERVAL={interval}");
            prop_assert_eq!(next_occurrence(&rule, after), Some(after + Duration::days(interval)));
        }

        #[test]
        fn prop_next_occurrence_is_deterministic_and_later(
            rule in prop::sample::select(vec![
                "FREQ=WEEKLY;BYDAY=MO,TH",
                "FREQ=MONTHLY;BYMONTHDAY=-1",
                "FREQ=HOURLY;BYMINUTE=15,45",
                "FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=29",
                "FREQ=MONTHLY;BYDAY=-2WE",
            ]),
            offset in 0i64..2_000_000_000,
        ) {
            let after = Utc.timestamp_opt(offset, 0).unwrap();
            let first = next_occurrence(rule, after);
            prop_assert_eq!(first, next_occurrence(rule, after));
            let first = first.unwrap();
            prop_assert!(first > after);
        }
    }
}
