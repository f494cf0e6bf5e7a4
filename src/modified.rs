//! Bucketing of files into named modification-time windows.

use chrono::{DateTime, Datelike, Local, Months, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use serde::Serialize;

use crate::record::{Entry, FileEntry, FileRecord, FolderEntry};

pub const UNDATED_BUCKET: &str = "Undated";

/// A named window holding the files modified within `(begins, ends]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub key: String,
    pub name: String,
    pub begins: DateTime<Utc>,
    pub ends: DateTime<Utc>,
    pub children: Vec<Entry>,
}

impl TimeBucket {
    fn new(name: impl Into<String>, begins: DateTime<Utc>, ends: DateTime<Utc>) -> Self {
        let name = name.into();
        Self {
            key: bucket_key(&name),
            name,
            begins,
            ends,
            children: Vec::new(),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant > self.begins && instant <= self.ends
    }

    pub fn size(&self) -> u64 {
        0
    }

    /// Present the bucket as a folder so it renders like one.
    pub fn into_entry(self) -> Entry {
        Entry::Folder(FolderEntry {
            relative_key: self.key.clone(),
            key: self.key,
            new_key: None,
            name: Some(self.name),
            modified: None,
            draft: false,
            key_derived: true,
            children: self.children,
        })
    }
}

/// Lower-case the name and replace its first space with `_`.
pub fn bucket_key(name: &str) -> String {
    name.to_lowercase().replacen(' ', "_", 1)
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Open lower bound for a window starting on `date`, so that midnight itself
/// falls inside the window.
fn window_begins<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    start_of_day(tz, date) - TimeDelta::milliseconds(1)
}

/// Last millisecond before the day after `date` begins.
fn end_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let next = date.succ_opt().unwrap_or(date);
    start_of_day(tz, next) - TimeDelta::milliseconds(1)
}

fn week_start_date(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = (7 + date.weekday().num_days_from_monday() - week_start.num_days_from_monday()) % 7;
    date - TimeDelta::days(offset as i64)
}

fn month_start_date(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn month_bucket<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> TimeBucket {
    let first = month_start_date(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    TimeBucket::new(
        first.format("%B %Y").to_string(),
        window_begins(tz, first),
        end_of_day(tz, last),
    )
}

/// The fixed relative windows anchored on `now`, in matching order.
pub fn relative_time_windows<Tz: TimeZone>(now: &DateTime<Tz>, week_start: Weekday) -> Vec<TimeBucket> {
    let tz = now.timezone();
    let today = now.date_naive();
    let mut windows = Vec::with_capacity(5);

    let today_begins = window_begins(&tz, today);
    let today_ends = end_of_day(&tz, today);
    windows.push(TimeBucket::new("Today", today_begins, today_ends));
    windows.push(TimeBucket::new(
        "Yesterday",
        today_begins - TimeDelta::hours(24),
        today_ends - TimeDelta::hours(24),
    ));

    let week_first = week_start_date(today, week_start);
    let week_last = week_first + TimeDelta::days(6);
    windows.push(TimeBucket::new(
        "Earlier this Week",
        window_begins(&tz, week_first),
        end_of_day(&tz, week_last),
    ));

    let last_week_first = week_first - TimeDelta::days(7);
    let last_week_last = last_week_first + TimeDelta::days(6);
    windows.push(TimeBucket::new(
        "Last Week",
        window_begins(&tz, last_week_first),
        end_of_day(&tz, last_week_last),
    ));

    if last_week_first.month() == today.month() && last_week_first.year() == today.year() {
        let month = month_bucket(&tz, today);
        windows.push(TimeBucket::new("Earlier this Month", month.begins, month.ends));
    }

    windows
}

/// Group leaf files by modification time relative to the local clock.
pub fn group_by_modified(files: &[FileRecord]) -> Vec<TimeBucket> {
    group_by_modified_at(files, &Local::now(), Weekday::Sun)
}

/// Group leaf files into time windows anchored on `now`.
///
/// Files are matched against the relative windows first, then against the
/// calendar-month buckets created so far; a file matching nothing opens a new
/// bucket for its own month. Files without a timestamp end up in a trailing
/// `Undated` bucket. Empty windows are dropped.
pub fn group_by_modified_at<Tz: TimeZone>(
    files: &[FileRecord],
    now: &DateTime<Tz>,
    week_start: Weekday,
) -> Vec<TimeBucket> {
    let tz = now.timezone();
    let mut windows = relative_time_windows(now, week_start);
    let mut undated = Vec::new();

    for record in files.iter().filter(|record| !record.is_folder()) {
        let entry = Entry::File(FileEntry::from_record(record, record.key.clone()));

        let Some(modified) = record.modified else {
            undated.push(entry);
            continue;
        };

        if let Some(window) = windows.iter_mut().find(|window| window.contains(modified)) {
            window.children.push(entry);
            continue;
        }

        let local_date = modified.with_timezone(&tz).date_naive();
        let mut bucket = month_bucket(&tz, local_date);
        if let Some(existing) = windows.iter_mut().find(|window| window.key == bucket.key) {
            existing.children.push(entry);
        } else {
            bucket.children.push(entry);
            windows.push(bucket);
        }
    }

    if !undated.is_empty() {
        let epoch = DateTime::<Utc>::default();
        let mut bucket = TimeBucket::new(UNDATED_BUCKET, epoch, epoch);
        bucket.children = undated;
        windows.push(bucket);
    }

    windows.retain(|window| !window.children.is_empty());
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use pretty_assertions::assert_eq;

    // Wednesday 2026-10-14 15:00 UTC; weeks start on Sunday the 11th.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 15, 0, 0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn file(key: &str, modified: DateTime<Utc>) -> FileRecord {
        FileRecord::file(key, 1).with_modified(modified)
    }

    fn names(buckets: &[TimeBucket]) -> Vec<&str> {
        buckets.iter().map(|b| b.name.as_str()).collect()
    }

    #[test]
    fn test_bucket_key_replaces_first_space_only() {
        assert_eq!(bucket_key("Earlier this Week"), "earlier_this week");
        assert_eq!(bucket_key("Today"), "today");
        assert_eq!(bucket_key("October 2026"), "october_2026");
    }

    #[test]
    fn test_windows_in_order() {
        let files = vec![
            file("old.png", at(2025, 3, 2, 9)),
            file("today.png", at(2026, 10, 14, 9)),
            file("yesterday.png", at(2026, 10, 13, 9)),
            file("sunday.png", at(2026, 10, 11, 9)),
            file("last-week.png", at(2026, 10, 6, 9)),
            file("this-month.png", at(2026, 10, 2, 9)),
            file("september.png", at(2026, 9, 20, 9)),
            file("september-2.png", at(2026, 9, 3, 9)),
        ];
        let buckets = group_by_modified_at(&files, &now(), Weekday::Sun);

        assert_eq!(
            names(&buckets),
            vec![
                "Today",
                "Yesterday",
                "Earlier this Week",
                "Last Week",
                "Earlier this Month",
                "March 2025",
                "September 2026",
            ]
        );
        let september = buckets.last().unwrap();
        assert_eq!(september.key, "september_2026");
        assert_eq!(september.children.len(), 2);
        assert_eq!(buckets[0].key, "today");
    }

    #[test]
    fn test_earlier_this_month_only_when_last_week_in_month() {
        // Tuesday 2026-10-06: last week starts Sunday 2026-09-27.
        let early = Utc.with_ymd_and_hms(2026, 10, 6, 12, 0, 0).unwrap();
        let windows = relative_time_windows(&early, Weekday::Sun);
        assert!(!names(&windows).contains(&"Earlier this Month"));

        let windows = relative_time_windows(&now(), Weekday::Sun);
        assert!(names(&windows).contains(&"Earlier this Month"));
    }

    #[test]
    fn test_future_days_this_week_land_in_earlier_this_week() {
        let buckets = group_by_modified_at(&[file("friday.png", at(2026, 10, 16, 9))], &now(), Weekday::Sun);
        assert_eq!(names(&buckets), vec!["Earlier this Week"]);
    }

    #[test]
    fn test_week_start_monday() {
        // With Monday weeks, Sunday the 11th belongs to last week.
        let buckets = group_by_modified_at(&[file("sunday.png", at(2026, 10, 11, 9))], &now(), Weekday::Mon);
        assert_eq!(names(&buckets), vec!["Last Week"]);
    }

    #[test]
    fn test_folders_skipped_and_undated_collected() {
        let files = vec![
            FileRecord::folder("photos/"),
            FileRecord::file("no-date.png", 3),
            file("today.png", at(2026, 10, 14, 1)),
        ];
        let buckets = group_by_modified_at(&files, &now(), Weekday::Sun);

        assert_eq!(names(&buckets), vec!["Today", UNDATED_BUCKET]);
        assert_eq!(buckets[1].key, "undated");
        assert_eq!(buckets[1].children[0].key(), "no-date.png");
    }

    #[test]
    fn test_every_file_within_its_bucket() {
        let files: Vec<FileRecord> = (0..120)
            .map(|hours_back| file(&format!("f{hours_back}.png"), now() - TimeDelta::hours(hours_back * 7 + 1)))
            .collect();
        let buckets = group_by_modified_at(&files, &now(), Weekday::Sun);

        let mut placed = 0;
        for bucket in &buckets {
            for child in &bucket.children {
                let modified = child.modified().unwrap();
                assert!(bucket.contains(modified), "{} outside {}", child.key(), bucket.name);
                placed += 1;
            }
        }
        assert_eq!(placed, files.len());
    }

    #[test]
    fn test_month_start_belongs_to_its_month() {
        let files = vec![
            file("oct1.png", at(2026, 10, 1, 0)),
            file("sep1.png", at(2026, 9, 1, 0)),
            file("midnight.png", at(2026, 10, 14, 0)),
            file("sunday-midnight.png", at(2026, 10, 11, 0)),
        ];
        let buckets = group_by_modified_at(&files, &now(), Weekday::Sun);

        assert_eq!(
            names(&buckets),
            vec!["Today", "Earlier this Week", "Earlier this Month", "September 2026"]
        );
        for bucket in &buckets {
            for child in &bucket.children {
                let modified = child.modified().unwrap();
                assert!(bucket.contains(modified), "{} outside {}", child.key(), bucket.name);
            }
        }
    }

    #[test]
    fn test_empty_files_are_bucketed() {
        let files = vec![FileRecord::file("empty.txt", 0).with_modified(at(2026, 10, 14, 9))];
        let buckets = group_by_modified_at(&files, &now(), Weekday::Sun);

        assert_eq!(names(&buckets), vec!["Today"]);
        assert_eq!(buckets[0].children[0].key(), "empty.txt");
    }

    #[test]
    fn test_local_offset_decides_the_day() {
        // 23:30 UTC on the 13th is already the 14th at +02:00.
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local_now = now().with_timezone(&offset);
        let buckets = group_by_modified_at(
            &[file("late.png", Utc.with_ymd_and_hms(2026, 10, 13, 23, 30, 0).unwrap())],
            &local_now,
            Weekday::Sun,
        );
        assert_eq!(names(&buckets), vec!["Today"]);
    }

    #[test]
    fn test_bucket_into_entry() {
        let buckets = group_by_modified_at(&[file("today.png", at(2026, 10, 14, 9))], &now(), Weekday::Sun);
        let entry = buckets.into_iter().next().unwrap().into_entry();
        assert!(entry.is_folder());
        assert_eq!(entry.key(), "today");
        assert_eq!(entry.display_name(), "Today");
        assert_eq!(entry.children().len(), 1);
        assert_eq!(entry.size(), 0);
    }

    #[test]
    fn test_group_by_modified_uses_local_clock() {
        let buckets = group_by_modified(&[file("fresh.png", Utc::now())]);
        assert_eq!(names(&buckets), vec!["Today"]);
    }
}
