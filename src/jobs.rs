//! Jobs and the month calendar

use crate::error::{Result, RoofDeskError};
use crate::repo::{short_id, Portal};
use crate::store::Filter;
use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use roofdesk_common::schedule::{self, month_bounds};
use roofdesk_common::{find_conflicts, group_by_day, month_grid, Client, Conflict, Job, JobStatus, Packet};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct JobFields {
    pub title: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub duration_hours: Option<f32>,
    pub crew: Option<String>,
    pub packet_id: Option<String>,
    pub notes: Option<String>,
}

fn check_duration(hours: f32) -> Result<()> {
    if !(hours > 0.0 && hours <= 24.0) {
        return Err(RoofDeskError::Validation(format!(
            "duration must be between 0 and 24 hours, got {}",
            hours
        )));
    }
    Ok(())
}

async fn client_packet(portal: &Portal, client_id: &str, packet_id: &str) -> Result<Packet> {
    let packet: Packet = portal.find(packet_id).await?;
    if packet.client_id != client_id {
        return Err(RoofDeskError::Validation(format!(
            "packet '{}' belongs to a different client",
            packet.title
        )));
    }
    Ok(packet)
}

/// Schedule a job. A linked packet must belong to the same client.
pub async fn create_job(portal: &Portal, client_id: &str, date: NaiveDate, fields: JobFields) -> Result<Job> {
    let client: Client = portal.find(client_id).await?;

    let packet = match fields.packet_id.as_deref() {
        Some(id) => Some(client_packet(portal, &client.id, id).await?),
        None => None,
    };

    let title = fields
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| packet.as_ref().map(|p| p.title.clone()))
        .unwrap_or_else(|| format!("{} roof work", client.name));

    let mut job = Job::new(&client.id, title, date);
    job.packet_id = packet.map(|p| p.id);
    job.start_time = fields.start_time;
    if let Some(hours) = fields.duration_hours {
        check_duration(hours)?;
        job.duration_hours = hours;
    }
    job.crew = fields.crew.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    job.notes = fields.notes.unwrap_or_default();

    let stored = portal.create(&job).await?;
    info!(id = %stored.id, client = %client.name, date = %date, "job scheduled");
    Ok(stored)
}

/// Jobs within `from..=to` (either bound optional), by date
pub async fn list_jobs(
    portal: &Portal,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    client_id: Option<&str>,
) -> Result<Vec<Job>> {
    let mut filter = Filter::all().order_by("scheduled_on", true);
    if let Some(id) = client_id {
        filter = filter.eq("client_id", id);
    }
    let jobs: Vec<Job> = portal.list(&filter).await?;
    Ok(jobs
        .into_iter()
        .filter(|j| from.map_or(true, |f| j.scheduled_on >= f) && to.map_or(true, |t| j.scheduled_on <= t))
        .collect())
}

pub async fn set_status(portal: &Portal, id: &str, status: JobStatus) -> Result<Job> {
    let mut job: Job = portal.find(id).await?;
    job.status = status;
    job.updated_at = Utc::now();
    let saved = portal.save(&job).await?;
    info!(id = %saved.id, status = %status, "job status");
    Ok(saved)
}

pub async fn update_job(portal: &Portal, id: &str, fields: JobFields) -> Result<Job> {
    let mut job: Job = portal.find(id).await?;
    if let Some(title) = fields.title.filter(|t| !t.trim().is_empty()) {
        job.title = title.trim().to_string();
    }
    if fields.start_time.is_some() {
        job.start_time = fields.start_time;
    }
    if let Some(hours) = fields.duration_hours {
        check_duration(hours)?;
        job.duration_hours = hours;
    }
    if let Some(crew) = fields.crew {
        job.crew = Some(crew.trim().to_string()).filter(|c| !c.is_empty());
    }
    if let Some(notes) = fields.notes {
        job.notes = notes;
    }
    // 空文字はリンク解除
    if let Some(packet_id) = fields.packet_id.as_deref().map(str::trim) {
        job.packet_id = if packet_id.is_empty() {
            None
        } else {
            Some(client_packet(portal, &job.client_id, packet_id).await?.id)
        };
    }
    job.updated_at = Utc::now();
    portal.save(&job).await
}

/// Move a job to another day. Returns the job and any crew conflicts it now has.
pub async fn move_job(portal: &Portal, id: &str, date: NaiveDate) -> Result<(Job, Vec<Conflict>)> {
    let job: Job = portal.find(id).await?;
    let moved = schedule::move_job(&job, date)?;
    let saved = portal.save(&moved).await?;

    let same_day: Vec<Job> = portal
        .list(&Filter::all().eq("scheduled_on", date.to_string()))
        .await?;
    let conflicts = find_conflicts(&same_day)
        .into_iter()
        .filter(|c| c.first_id == saved.id || c.second_id == saved.id)
        .collect();

    info!(id = %saved.id, from = %job.scheduled_on, to = %date, "job moved");
    Ok((saved, conflicts))
}

pub async fn delete_job(portal: &Portal, id: &str) -> Result<Job> {
    let job: Job = portal.find(id).await?;
    portal.delete::<Job>(&job.id).await?;
    Ok(job)
}

/// The job "complete <client>" refers to: the earliest active job on or after
/// `today`, else the most recent overdue one.
pub fn pick_next_job(jobs: &[Job], today: NaiveDate) -> Option<&Job> {
    let active = || jobs.iter().filter(|j| j.status.is_active());
    active()
        .filter(|j| j.scheduled_on >= today)
        .min_by_key(|j| (j.scheduled_on, j.start_time))
        .or_else(|| active().max_by_key(|j| (j.scheduled_on, j.start_time)))
}

pub async fn next_job_for_client(portal: &Portal, client_id: &str, today: NaiveDate) -> Result<Job> {
    let jobs = list_jobs(portal, None, None, Some(client_id)).await?;
    pick_next_job(&jobs, today)
        .cloned()
        .ok_or_else(|| RoofDeskError::Validation("client has no scheduled jobs".into()))
}

/// Jobs and client names needed to draw one month
pub async fn month_jobs(portal: &Portal, year: i32, month: u32) -> Result<(Vec<Job>, HashMap<String, String>)> {
    let (first, last) = month_bounds(year, month)?;
    let jobs = list_jobs(portal, Some(first), Some(last), None).await?;
    let clients: Vec<Client> = portal.list(&Filter::all()).await?;
    let names = clients.into_iter().map(|c| (c.id, c.name)).collect();
    Ok((jobs, names))
}

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

/// Text calendar: a Sunday-first grid then the agenda.
/// `*` marks days with jobs, `!` days with a crew conflict, `[..]` today.
pub fn render_month(
    year: i32,
    month: u32,
    jobs: &[Job],
    client_names: &HashMap<String, String>,
    today: NaiveDate,
) -> Result<String> {
    let grid = month_grid(year, month)?;
    let (first, last) = month_bounds(year, month)?;
    let days = group_by_day(jobs, first, last);
    let conflicts = find_conflicts(jobs);
    let conflict_days: HashSet<NaiveDate> = conflicts.iter().map(|c| c.date).collect();
    let conflicted: HashSet<&str> = conflicts
        .iter()
        .flat_map(|c| [c.first_id.as_str(), c.second_id.as_str()])
        .collect();

    let mut out = String::new();
    let title = format!("{} {}", MONTH_NAMES[(month - 1) as usize], year);
    let _ = writeln!(out, "{:^42}", title);
    let _ = writeln!(out, "  Sun   Mon   Tue   Wed   Thu   Fri   Sat");

    for week in &grid {
        for day in week {
            let cell = match day {
                Some(date) => {
                    let marker = if conflict_days.contains(date) {
                        "!"
                    } else if days.contains_key(date) {
                        "*"
                    } else {
                        " "
                    };
                    if *date == today {
                        format!("[{:>2}]{}", date.day(), marker)
                    } else {
                        format!(" {:>2} {}", date.day(), marker)
                    }
                }
                None => "     ".to_string(),
            };
            let _ = write!(out, " {}", cell);
        }
        out.push('\n');
    }

    if days.is_empty() {
        let _ = writeln!(out, "\nNo jobs scheduled.");
        return Ok(out);
    }

    out.push('\n');
    for (date, list) in &days {
        for job in list {
            let time = job
                .start_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "all day".into());
            let client = client_names.get(&job.client_id).map(String::as_str).unwrap_or("?");
            let crew = job.crew.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default();
            let flag = if conflicted.contains(job.id.as_str()) { "  ⚠ crew conflict" } else { "" };
            let _ = writeln!(
                out,
                "{} {:<7} {} - {}{} ({}) {}{}",
                date.format("%a %d"),
                time,
                job.title,
                client,
                crew,
                job.status,
                short_id(&job.id),
                flag
            );
        }
    }

    if !conflicts.is_empty() {
        let _ = writeln!(out, "\n⚠ {} crew conflict(s)", conflicts.len());
    }
    Ok(out)
}
