use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Bucket width used when grouping samples into periods.
///
/// Truncation happens in the configured reporting zone, not in UTC: a "day"
/// bucket starts at local midnight, so day boundaries shift with the zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Minute,
    Hour,
    Day,
}

impl Granularity {
    fn truncate_local(self, local: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Minute => local.with_second(0).and_then(|dt| dt.with_nanosecond(0)),
            Granularity::Hour => local
                .with_minute(0)
                .and_then(|dt| dt.with_second(0))
                .and_then(|dt| dt.with_nanosecond(0)),
            Granularity::Day => Some(local.date().and_time(NaiveTime::MIN)),
        }
        // The setters only fail for out-of-range values, which 0 never is.
        .unwrap_or(local)
    }
}

/// Logical chart range requested by a caller.
///
/// Unrecognized tags deliberately resolve to `Day`; callers rely on this
/// fallback instead of receiving an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeTag {
    Hour,
    Day,
    Week,
    Month,
}

impl RangeTag {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" => RangeTag::Hour,
            "day" => RangeTag::Day,
            "week" => RangeTag::Week,
            "month" => RangeTag::Month,
            _ => RangeTag::Day,
        }
    }
}

/// Concrete sample window plus the bucket width to aggregate it with.
#[derive(Debug, Clone, Copy)]
pub struct RangeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
}

impl RangeWindow {
    /// Maps a range tag to `[start, end)` and a granularity:
    /// hour → (last 1h, minute), day → (since local midnight, minute),
    /// week → (last 7d, hour), month → (last 30d, day).
    pub fn resolve(tag: RangeTag, now: DateTime<Utc>, tz: Tz) -> Self {
        match tag {
            RangeTag::Hour => RangeWindow {
                start: now - Duration::hours(1),
                end: now,
                granularity: Granularity::Minute,
            },
            RangeTag::Day => RangeWindow {
                start: bucket_start(now, Granularity::Day, tz),
                end: now,
                granularity: Granularity::Minute,
            },
            RangeTag::Week => RangeWindow {
                start: now - Duration::days(7),
                end: now,
                granularity: Granularity::Hour,
            },
            RangeTag::Month => RangeWindow {
                start: now - Duration::days(30),
                end: now,
                granularity: Granularity::Day,
            },
        }
    }
}

/// Truncates `ts` downward to the start of its bucket in the given zone,
/// returning the bucket start as UTC.
///
/// DST transitions can make the truncated local time ambiguous or
/// nonexistent. Ambiguity resolves to the earlier instant; a nonexistent
/// local midnight (zones that spring forward over 00:00) resolves to the
/// first valid local time after it.
pub fn bucket_start(ts: DateTime<Utc>, granularity: Granularity, tz: Tz) -> DateTime<Utc> {
    let local = ts.with_timezone(&tz).naive_local();
    let truncated = granularity.truncate_local(local);

    match tz.from_local_datetime(&truncated) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earlier, later) => {
            std::cmp::min(earlier.with_timezone(&Utc), later.with_timezone(&Utc))
        }
        chrono::LocalResult::None => next_valid_local(&tz, truncated)
            .map(|dt| dt.with_timezone(&Utc))
            // No IANA zone has gaps longer than the search span; interpret
            // as UTC rather than panic if that assumption ever breaks.
            .unwrap_or_else(|| Utc.from_utc_datetime(&truncated)),
    }
}

fn next_valid_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    const SEARCH_MINUTES: i64 = 180;

    for minutes in 1..=SEARCH_MINUTES {
        let candidate = naive + Duration::minutes(minutes);
        match tz.from_local_datetime(&candidate) {
            chrono::LocalResult::Single(dt) => return Some(dt),
            chrono::LocalResult::Ambiguous(earlier, _) => return Some(earlier),
            chrono::LocalResult::None => continue,
        }
    }
    None
}
