use chrono::{DateTime, SecondsFormat, Utc};

#[allow(unused)]
pub fn time_millis() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_millis()
}

/// Current time as an ISO-8601 UTC string, used for `executed_at`
/// stamps and the `{{$now}}` template variable.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
