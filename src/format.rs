use chrono::{DateTime, Utc};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;

/// Human-readable byte count: `"512 B"`, `"2 kB"`, `"5.00 MB"`.
pub fn file_size(size: u64) -> String {
    if size < KB {
        format!("{} B", size)
    } else if size < MB {
        format!("{} kB", (size as f64 / KB as f64).round())
    } else {
        let megabytes = size as f64 / MB as f64;
        format!("{:.2} MB", (megabytes * 100.0).round() / 100.0)
    }
}

/// Relative phrase for how long ago `modified` was, `"-"` when unknown.
pub fn time_ago(modified: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(modified) = modified else {
        return "-".to_string();
    };

    let seconds = (now - modified).num_seconds();
    let phrase = humanize(seconds.unsigned_abs());
    if seconds < 0 {
        format!("in {}", phrase)
    } else {
        format!("{} ago", phrase)
    }
}

fn humanize(seconds: u64) -> String {
    let minutes = (seconds as f64 / 60.0).round() as u64;
    let hours = (seconds as f64 / 3600.0).round() as u64;
    let days = (seconds as f64 / 86_400.0).round() as u64;
    let months = (seconds as f64 / (86_400.0 * 30.4)).round() as u64;
    let years = (seconds as f64 / (86_400.0 * 365.25)).round() as u64;

    match seconds {
        s if s < 45 => "a few seconds".to_string(),
        s if s < 90 => "a minute".to_string(),
        s if s < 45 * 60 => format!("{} minutes", minutes),
        s if s < 90 * 60 => "an hour".to_string(),
        s if s < 22 * 3600 => format!("{} hours", hours),
        s if s < 36 * 3600 => "a day".to_string(),
        s if s < 26 * 86_400 => format!("{} days", days),
        s if s < 45 * 86_400 => "a month".to_string(),
        s if s < 320 * 86_400 => format!("{} months", months.max(2)),
        s if s < 548 * 86_400 => "a year".to_string(),
        _ => format!("{} years", years.max(2)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_file_size() {
        assert_eq!(file_size(0), "0 B");
        assert_eq!(file_size(512), "512 B");
        assert_eq!(file_size(1023), "1023 B");
        assert_eq!(file_size(1024), "1 kB");
        assert_eq!(file_size(2048), "2 kB");
        assert_eq!(file_size(1536), "2 kB");
        assert_eq!(file_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(file_size(1024 * 1024 + 1024 * 1024 / 4), "1.25 MB");
        assert_eq!(file_size(3 * 1024 * 1024 * 1024), "3072.00 MB");
    }

    #[test]
    fn test_time_ago() {
        let now = Utc::now();
        assert_eq!(time_ago(None, now), "-");
        assert_eq!(time_ago(Some(now - TimeDelta::seconds(10)), now), "a few seconds ago");
        assert_eq!(time_ago(Some(now - TimeDelta::seconds(70)), now), "a minute ago");
        assert_eq!(time_ago(Some(now - TimeDelta::minutes(5)), now), "5 minutes ago");
        assert_eq!(time_ago(Some(now - TimeDelta::minutes(60)), now), "an hour ago");
        assert_eq!(time_ago(Some(now - TimeDelta::hours(5)), now), "5 hours ago");
        assert_eq!(time_ago(Some(now - TimeDelta::hours(30)), now), "a day ago");
        assert_eq!(time_ago(Some(now - TimeDelta::days(3)), now), "3 days ago");
        assert_eq!(time_ago(Some(now - TimeDelta::days(30)), now), "a month ago");
        assert_eq!(time_ago(Some(now - TimeDelta::days(100)), now), "3 months ago");
        assert_eq!(time_ago(Some(now - TimeDelta::days(400)), now), "a year ago");
        assert_eq!(time_ago(Some(now - TimeDelta::days(3 * 365)), now), "3 years ago");
        assert_eq!(time_ago(Some(now + TimeDelta::hours(2)), now), "in 2 hours");
    }
}
