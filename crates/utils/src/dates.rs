use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Date layouts a tabular source may use. Each normalizer lists the ones it accepts,
/// in order, when it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// Unix seconds, optionally fractional.
    UnixSeconds,
    /// `DD/MM/YYYY HH:mm:ss`, UTC.
    DayMonthYear,
    /// `DD/Mon/YYYY HH:mm:ss` with a three-letter month name, UTC.
    DayMonNameYear,
    /// ISO-8601; `Z` is assumed when no offset is given.
    Iso,
}

impl DateLayout {
    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            DateLayout::UnixSeconds => parse_unix_seconds(raw),
            DateLayout::DayMonthYear => parse_day_month_year(raw),
            DateLayout::DayMonNameYear => parse_day_mon_name_year(raw),
            DateLayout::Iso => parse_iso(raw),
        }
    }
}

/// Tries each layout in turn and returns the first successful parse.
pub fn parse_with_layouts(raw: &str, layouts: &[DateLayout]) -> Option<DateTime<Utc>> {
    layouts.iter().find_map(|l| l.parse(raw))
}

pub fn parse_unix_seconds(raw: &str) -> Option<DateTime<Utc>> {
    let t = raw.trim();
    if t.is_empty() || !t.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
        return None;
    }
    let secs: f64 = t.parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

pub fn parse_day_month_year(raw: &str) -> Option<DateTime<Utc>> {
    parse_naive_with(raw, &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"], &["%d/%m/%Y"])
}

pub fn parse_day_mon_name_year(raw: &str) -> Option<DateTime<Utc>> {
    parse_naive_with(raw, &["%d/%b/%Y %H:%M:%S", "%d/%b/%Y %H:%M"], &["%d/%b/%Y"])
}

fn parse_naive_with(raw: &str, datetime_fmts: &[&str], date_fmts: &[&str]) -> Option<DateTime<Utc>> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    for fmt in datetime_fmts {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in date_fmts {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Parses an ISO-8601 instant. A missing offset is read as UTC.
pub fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = normalize_iso(raw)?;
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Returns the ISO string with a `T` separator and a trailing `Z` when no
/// timezone designator is present.
pub fn normalize_iso(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.len() < 10 {
        return None;
    }
    let (date, time) = match t.find(['T', 't', ' ']) {
        Some(i) => (&t[..i], t[i + 1..].trim()),
        None => (t, "00:00:00"),
    };
    if date.len() != 10 || date.as_bytes().get(4) != Some(&b'-') {
        return None;
    }
    let has_zone = time.ends_with(['Z', 'z']) || time.contains(['+', '-']);
    let time = if time.len() == 5 && !has_zone {
        format!("{time}:00")
    } else {
        time.to_string()
    };
    if has_zone {
        Some(format!("{date}T{time}"))
    } else {
        Some(format!("{date}T{time}Z"))
    }
}
