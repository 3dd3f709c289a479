use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};

const KST_OFFSET_SECS: i32 = 9 * 3600;

fn kst() -> anyhow::Result<FixedOffset> {
    FixedOffset::east_opt(KST_OFFSET_SECS).context("invalid KST offset")
}

/// Calendar date in Korea at `now_utc`.
pub fn kst_date(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    Ok(now_utc.with_timezone(&kst()?).date_naive())
}

/// Start of the current KST week (Monday 00:00 KST), expressed in UTC.
///
/// The "this week" change digest counts everything observed at or after this instant.
pub fn week_start(now_utc: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let offset = kst()?;
    let today = now_utc.with_timezone(&offset).date_naive();
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let midnight = monday
        .and_hms_opt(0, 0, 0)
        .context("invalid KST midnight")?
        .and_local_timezone(offset)
        .single()
        .context("ambiguous KST midnight")?;
    Ok(midnight.with_timezone(&Utc))
}
