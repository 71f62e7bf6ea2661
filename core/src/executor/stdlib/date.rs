//! Date stdlib functions
//!
//! Dates are UTC instants; local-time getters report UTC fields.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

use crate::executor::values::{to_js_string, to_number, EvalResult, Val};
use crate::executor::errors::ErrorInfo;

pub const METHODS: &[&str] = &[
    "getTime",
    "valueOf",
    "toISOString",
    "toJSON",
    "toString",
    "getFullYear",
    "getMonth",
    "getDate",
    "getDay",
    "getHours",
    "getMinutes",
    "getSeconds",
    "getMilliseconds",
];

/// `Date()` called without `new` returns the current time as a string
pub fn now_string() -> String {
    Utc::now().to_rfc2822()
}

fn from_millis(ms: f64) -> Result<DateTime<Utc>, ErrorInfo> {
    if !ms.is_finite() {
        return Err(ErrorInfo::range_error("Invalid time value"));
    }
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .ok_or_else(|| ErrorInfo::range_error("Invalid time value"))
}

/// Parse the date strings examples use: RFC 3339 and bare `YYYY-MM-DD`
pub fn parse_date(text: &str) -> Result<DateTime<Utc>, ErrorInfo> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    Err(ErrorInfo::range_error(format!("Invalid time value: {}", text)))
}

/// new Date(), new Date(ms), new Date(text), new Date(y, m, d, h, mi, s, ms)
pub fn construct(args: &[Val]) -> EvalResult {
    let dt = match args {
        [] => Utc::now(),
        [Val::Date(dt)] => *dt,
        [Val::Str(text)] => parse_date(text)?,
        [single] => from_millis(to_number(single))?,
        fields => {
            let field = |i: usize, default: f64| fields.get(i).map(to_number).unwrap_or(default);
            let (year, month) = (field(0, 1970.0), field(1, 0.0));
            let date = NaiveDate::from_ymd_opt(year as i32, 1, 1)
                .and_then(|d| d.checked_add_months(chrono::Months::new(month.max(0.0) as u32)))
                .and_then(|d| d.checked_add_days(chrono::Days::new((field(2, 1.0) - 1.0).max(0.0) as u64)))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| ErrorInfo::range_error("Invalid time value"))?;
            let offset_ms = field(3, 0.0) * 3_600_000.0
                + field(4, 0.0) * 60_000.0
                + field(5, 0.0) * 1000.0
                + field(6, 0.0);
            from_millis(Utc.from_utc_datetime(&date).timestamp_millis() as f64 + offset_ms)?
        }
    };
    Ok(Val::Date(dt))
}

/// Invoke a `Date.prototype` method
pub fn call(dt: &DateTime<Utc>, name: &str) -> EvalResult {
    let value = match name {
        "getTime" | "valueOf" => Val::Num(dt.timestamp_millis() as f64),
        "getFullYear" => Val::Num(dt.year() as f64),
        "getMonth" => Val::Num(dt.month0() as f64),
        "getDate" => Val::Num(dt.day() as f64),
        "getDay" => Val::Num(dt.weekday().num_days_from_sunday() as f64),
        "getHours" => Val::Num(dt.hour() as f64),
        "getMinutes" => Val::Num(dt.minute() as f64),
        "getSeconds" => Val::Num(dt.second() as f64),
        "getMilliseconds" => Val::Num((dt.timestamp_subsec_millis()) as f64),
        _ => Val::Str(to_js_string(&Val::Date(*dt))),
    };
    Ok(value)
}
