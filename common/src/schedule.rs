//! Calendar and scheduling logic
//!
//! Pure functions over `Job` slices. The CLI renders the month grid and the
//! store layer persists the result of `move_job`.

use crate::error::{Error, Result};
use crate::types::{Job, JobStatus};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;

/// One calendar week, Sunday first. Days outside the month are `None`.
pub type Week = [Option<NaiveDate>; 7];

pub fn month_grid(year: i32, month: u32) -> Result<Vec<Week>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidDate(format!("{}-{:02}", year, month)))?;
    let days = days_in_month(year, month)?;

    let mut weeks = Vec::new();
    let mut week: Week = [None; 7];
    let mut slot = first.weekday().num_days_from_sunday() as usize;

    for offset in 0..days {
        week[slot] = Some(first + Duration::days(offset as i64));
        slot += 1;
        if slot == 7 {
            weeks.push(week);
            week = [None; 7];
            slot = 0;
        }
    }
    if slot > 0 {
        weeks.push(week);
    }

    Ok(weeks)
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidDate(format!("{}-{:02}", year, month)))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| Error::InvalidDate(format!("{}-{:02}", next_year, next_month)))?;
    Ok((next - first).num_days() as u32)
}

/// First and last day of a month
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidDate(format!("{}-{:02}", year, month)))?;
    let last = first + Duration::days(days_in_month(year, month)? as i64 - 1);
    Ok((first, last))
}

/// Shift (year, month) by `delta` months
pub fn add_months(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Jobs keyed by day within `from..=to`. Untimed jobs sort before timed ones.
pub fn group_by_day<'a>(jobs: &'a [Job], from: NaiveDate, to: NaiveDate) -> BTreeMap<NaiveDate, Vec<&'a Job>> {
    let mut days: BTreeMap<NaiveDate, Vec<&Job>> = BTreeMap::new();
    for job in jobs.iter().filter(|j| j.scheduled_on >= from && j.scheduled_on <= to) {
        days.entry(job.scheduled_on).or_default().push(job);
    }
    for list in days.values_mut() {
        list.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.title.cmp(&b.title)));
    }
    days
}

/// Move a job to another day, keeping its time, crew and status.
pub fn move_job(job: &Job, new_date: NaiveDate) -> Result<Job> {
    match job.status {
        JobStatus::Completed | JobStatus::Cancelled => {
            return Err(Error::Schedule(format!(
                "job '{}' is {} and cannot be moved",
                job.title, job.status
            )));
        }
        _ => {}
    }

    let mut moved = job.clone();
    moved.scheduled_on = new_date;
    moved.updated_at = Utc::now();
    Ok(moved)
}

/// Minutes since midnight covered by a job. Untimed jobs take the whole day.
fn time_window(job: &Job) -> (u32, u32) {
    match job.start_time {
        Some(start) => {
            let begin = minutes_of(start);
            let length = (job.duration_hours.max(0.0) * 60.0).round() as u32;
            (begin, (begin + length.max(1)).min(24 * 60))
        }
        None => (0, 24 * 60),
    }
}

fn minutes_of(time: NaiveTime) -> u32 {
    use chrono::Timelike;
    time.hour() * 60 + time.minute()
}

/// A crew booked on two overlapping jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub date: NaiveDate,
    pub crew: String,
    pub first_id: String,
    pub second_id: String,
}

pub fn find_conflicts(jobs: &[Job]) -> Vec<Conflict> {
    let mut by_crew_day: BTreeMap<(NaiveDate, String), Vec<&Job>> = BTreeMap::new();
    for job in jobs.iter().filter(|j| j.status.is_active()) {
        let Some(crew) = job.crew.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        by_crew_day
            .entry((job.scheduled_on, crew.to_lowercase()))
            .or_default()
            .push(job);
    }

    let mut conflicts = Vec::new();
    for ((date, crew), list) in by_crew_day {
        for (i, a) in list.iter().enumerate() {
            let (a_start, a_end) = time_window(a);
            for b in &list[i + 1..] {
                let (b_start, b_end) = time_window(b);
                if a_start < b_end && b_start < a_end {
                    conflicts.push(Conflict {
                        date,
                        crew: crew.clone(),
                        first_id: a.id.clone(),
                        second_id: b.id.clone(),
                    });
                }
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn job(title: &str, on: NaiveDate, crew: Option<&str>, start: Option<(u32, u32)>, hours: f32) -> Job {
        let mut job = Job::new("c1", title, on);
        job.crew = crew.map(String::from);
        job.start_time = start.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0));
        job.duration_hours = hours;
        job
    }

    #[test]
    fn test_month_grid_shape() {
        // 2026-11-01 is a Sunday
        let grid = month_grid(2026, 11).unwrap();
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0][0], Some(date(2026, 11, 1)));
        assert_eq!(grid[4][1], Some(date(2026, 11, 30)));
        assert_eq!(grid[4][2], None);
    }

    #[test]
    fn test_month_grid_leading_blanks() {
        // 2026-10-01 is a Thursday
        let grid = month_grid(2026, 10).unwrap();
        assert!(grid[0][..4].iter().all(|d| d.is_none()));
        assert_eq!(grid[0][4], Some(date(2026, 10, 1)));
        let total: usize = grid.iter().map(|w| w.iter().flatten().count()).sum();
        assert_eq!(total, 31);
    }

    #[test]
    fn test_invalid_month() {
        assert!(month_grid(2026, 13).is_err());
        assert!(days_in_month(2026, 0).is_err());
    }

    #[test]
    fn test_days_in_month_leap_year() {
        assert_eq!(days_in_month(2028, 2).unwrap(), 29);
        assert_eq!(days_in_month(2026, 2).unwrap(), 28);
        assert_eq!(days_in_month(2026, 12).unwrap(), 31);
    }

    #[test]
    fn test_add_months_wraps_year() {
        assert_eq!(add_months(2026, 12, 1), (2027, 1));
        assert_eq!(add_months(2026, 1, -1), (2025, 12));
        assert_eq!(add_months(2026, 6, 0), (2026, 6));
    }

    #[test]
    fn test_group_by_day_orders_untimed_first() {
        let day = date(2026, 11, 3);
        let jobs = vec![
            job("Gutters", day, None, Some((13, 0)), 2.0),
            job("Tear-off", day, None, None, 8.0),
            job("Inspection", day, None, Some((8, 30)), 1.0),
            job("Outside", date(2026, 12, 1), None, None, 8.0),
        ];
        let grouped = group_by_day(&jobs, date(2026, 11, 1), date(2026, 11, 30));
        assert_eq!(grouped.len(), 1);
        let titles: Vec<&str> = grouped[&day].iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Tear-off", "Inspection", "Gutters"]);
    }

    #[test]
    fn test_move_job_keeps_time_and_crew() {
        let original = job("Reroof", date(2026, 11, 3), Some("A"), Some((7, 0)), 8.0);
        let moved = move_job(&original, date(2026, 11, 5)).unwrap();
        assert_eq!(moved.scheduled_on, date(2026, 11, 5));
        assert_eq!(moved.start_time, original.start_time);
        assert_eq!(moved.crew, original.crew);
        assert_eq!(moved.id, original.id);
        assert!(moved.updated_at >= original.updated_at);
    }

    #[test]
    fn test_move_completed_job_rejected() {
        let mut done = job("Reroof", date(2026, 11, 3), None, None, 8.0);
        done.status = JobStatus::Completed;
        assert!(matches!(move_job(&done, date(2026, 11, 4)), Err(Error::Schedule(_))));
    }

    #[test]
    fn test_conflicts_same_crew_overlap() {
        let day = date(2026, 11, 3);
        let jobs = vec![
            job("A", day, Some("Crew 1"), Some((8, 0)), 4.0),
            job("B", day, Some("crew 1"), Some((11, 0)), 2.0),
            job("C", day, Some("Crew 1"), Some((13, 0)), 2.0),
            job("D", day, Some("Crew 2"), Some((8, 0)), 4.0),
        ];
        let conflicts = find_conflicts(&jobs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].first_id, jobs[0].id);
        assert_eq!(conflicts[0].second_id, jobs[1].id);
    }

    #[test]
    fn test_untimed_job_blocks_whole_day() {
        let day = date(2026, 11, 3);
        let jobs = vec![
            job("All day", day, Some("A"), None, 8.0),
            job("Evening", day, Some("A"), Some((18, 0)), 1.0),
        ];
        assert_eq!(find_conflicts(&jobs).len(), 1);
    }

    #[test]
    fn test_inactive_and_crewless_jobs_ignored() {
        let day = date(2026, 11, 3);
        let mut cancelled = job("X", day, Some("A"), None, 8.0);
        cancelled.status = JobStatus::Cancelled;
        let jobs = vec![cancelled, job("Y", day, Some("A"), None, 8.0), job("Z", day, None, None, 8.0)];
        assert!(find_conflicts(&jobs).is_empty());
    }
}
