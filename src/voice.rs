//! Voice command parser
//!
//! 音声（または入力テキスト）を正規表現で順番に照合してコマンドに変換する。
//! 日付は `today` 基準で解決する。

use crate::clients::{self, describe_overview, ClientFields};
use crate::error::{Result, RoofDeskError};
use crate::jobs::{self, JobFields};
use crate::repo::{short_id, Portal};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;
use roofdesk_common::schedule::add_months;
use roofdesk_common::JobStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCommand {
    NewClient { name: String },
    OpenClient { query: String },
    Schedule { client: String, date: NaiveDate, time: Option<NaiveTime> },
    Move { client: String, date: NaiveDate },
    Complete { client: String },
    Note { client: String, text: String },
    /// Month offset from the current month
    ShowCalendar { offset: i32 },
    Unknown(String),
}

lazy_static::lazy_static! {
    static ref NOTE_RE: Regex = Regex::new(r"(?i)^(?:add\s+)?note\s+for\s+([^:]+?)\s*:\s*(.+)$").unwrap();
    static ref CALENDAR_RE: Regex = Regex::new(r"(?i)^(?:show|open)\s+(?:the\s+|my\s+)?calendar$").unwrap();
    static ref MONTH_RE: Regex = Regex::new(r"(?i)^show\s+(next|last|previous)\s+month$").unwrap();
    static ref NEW_CLIENT_RE: Regex = Regex::new(r"(?i)^(?:new|add|create)\s+client\s+(.+)$").unwrap();
    static ref OPEN_CLIENT_RE: Regex = Regex::new(r"(?i)^(?:open|show)\s+client\s+(.+)$").unwrap();
    static ref SCHEDULE_RE: Regex = Regex::new(r"(?i)^schedule\s+(.+)$").unwrap();
    static ref MOVE_RE: Regex = Regex::new(r"(?i)^(?:move|reschedule)\s+(.+?)\s+to\s+(.+)$").unwrap();
    static ref COMPLETE_RE: Regex = Regex::new(r"(?i)^(?:complete|completed|finish|finished)\s+(?:job\s+for\s+)?(.+)$").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"(?i)^(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?$").unwrap();
    static ref ORDINAL_RE: Regex = Regex::new(r"(?i)^(\d{1,2})(?:st|nd|rd|th)?$").unwrap();
}

/// Parse a phrase. Anything that does not match a command is `Unknown`.
pub fn parse_command(text: &str, today: NaiveDate) -> VoiceCommand {
    let raw = text.trim();
    let unknown = || VoiceCommand::Unknown(raw.to_string());

    // メモ本文の句読点は残す
    if let Some(caps) = NOTE_RE.captures(raw) {
        return VoiceCommand::Note {
            client: caps[1].trim().to_string(),
            text: caps[2].trim().to_string(),
        };
    }

    let phrase = raw.trim_end_matches(['.', '!', '?']).trim();
    let phrase = collapse_spaces(phrase);

    if CALENDAR_RE.is_match(&phrase) {
        return VoiceCommand::ShowCalendar { offset: 0 };
    }
    if let Some(caps) = MONTH_RE.captures(&phrase) {
        let offset = if caps[1].eq_ignore_ascii_case("next") { 1 } else { -1 };
        return VoiceCommand::ShowCalendar { offset };
    }
    if let Some(caps) = NEW_CLIENT_RE.captures(&phrase) {
        return VoiceCommand::NewClient { name: caps[1].trim().to_string() };
    }
    if let Some(caps) = OPEN_CLIENT_RE.captures(&phrase) {
        return VoiceCommand::OpenClient { query: caps[1].trim().to_string() };
    }
    if let Some(caps) = SCHEDULE_RE.captures(&phrase) {
        return parse_schedule(&caps[1], today).unwrap_or_else(unknown);
    }
    if let Some(caps) = MOVE_RE.captures(&phrase) {
        return match parse_date(&caps[2], today) {
            Some(date) => VoiceCommand::Move { client: caps[1].trim().to_string(), date },
            None => unknown(),
        };
    }
    if let Some(caps) = COMPLETE_RE.captures(&phrase) {
        return VoiceCommand::Complete { client: caps[1].trim().to_string() };
    }

    unknown()
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "<client> [on] <date> [at <time>]"
fn parse_schedule(rest: &str, today: NaiveDate) -> Option<VoiceCommand> {
    let lower = rest.to_ascii_lowercase();
    let (head, time) = match lower.rfind(" at ") {
        Some(pos) => match parse_time(&rest[pos + 4..]) {
            Some(time) => (&rest[..pos], Some(time)),
            None => (rest, None),
        },
        None => (rest, None),
    };

    let words: Vec<&str> = head.split_whitespace().collect();
    // 日付は末尾の1〜3語（"next monday", "november 3" など）
    for take in (1..=3.min(words.len().saturating_sub(1))).rev() {
        let split = words.len() - take;
        let Some(date) = parse_date(&words[split..].join(" "), today) else {
            continue;
        };
        let mut client_words = &words[..split];
        if client_words.last().is_some_and(|w| w.eq_ignore_ascii_case("on")) {
            client_words = &client_words[..client_words.len() - 1];
        }
        if client_words.is_empty() {
            return None;
        }
        return Some(VoiceCommand::Schedule { client: client_words.join(" "), date, time });
    }
    None
}

fn weekday_from(word: &str) -> Option<Weekday> {
    match word {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_from(word: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june",
        "july", "august", "september", "october", "november", "december",
    ];
    MONTHS
        .iter()
        .position(|m| *m == word || (word.len() >= 3 && m.starts_with(word)))
        .map(|i| i as u32 + 1)
}

/// Next day after `today` falling on `weekday` (1 to 7 days ahead)
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (weekday.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    today + Duration::days(if ahead == 0 { 7 } else { ahead })
}

/// Spoken date relative to `today`
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.trim().trim_end_matches(['.', ',']).to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    match words.as_slice() {
        ["today"] => Some(today),
        ["tomorrow"] => today.succ_opt(),
        [day] if weekday_from(day).is_some() => weekday_from(day).map(|w| next_weekday(today, w)),
        ["next", day] => weekday_from(day).map(|w| next_weekday(today, w) + Duration::days(7)),
        [iso] if iso.contains('-') => NaiveDate::parse_from_str(iso, "%Y-%m-%d").ok(),
        [month, day] => {
            let month = month_from(month)?;
            let day: u32 = ORDINAL_RE.captures(day)?[1].parse().ok()?;
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Some(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
        _ => None,
    }
}

/// "9", "9am", "2:30 pm", "14:00"
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let caps = TIME_RE.captures(text.trim())?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;

    if let Some(meridiem) = caps.get(3) {
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = meridiem.as_str().to_lowercase().starts_with('p');
        hour = match (pm, hour) {
            (false, 12) => 0,
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, h) => h,
        };
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Run a parsed command and describe what happened
pub async fn execute(portal: &Portal, command: VoiceCommand, today: NaiveDate) -> Result<String> {
    match command {
        VoiceCommand::NewClient { name } => {
            let client = clients::add_client(portal, &name, ClientFields::default()).await?;
            Ok(format!("✔ Added client {} ({})", client.name, short_id(&client.id)))
        }
        VoiceCommand::OpenClient { query } => {
            let client = clients::resolve_client(portal, &query).await?;
            let overview = clients::overview(portal, client).await?;
            Ok(describe_overview(&overview))
        }
        VoiceCommand::Schedule { client, date, time } => {
            let client = clients::resolve_client(portal, &client).await?;
            let fields = JobFields { start_time: time, ..Default::default() };
            let job = jobs::create_job(portal, &client.id, date, fields).await?;
            let at = time.map(|t| format!(" at {}", t.format("%H:%M"))).unwrap_or_default();
            Ok(format!("✔ Scheduled {} on {}{} ({})", client.name, date.format("%a %b %-d"), at, short_id(&job.id)))
        }
        VoiceCommand::Move { client, date } => {
            let client = clients::resolve_client(portal, &client).await?;
            let job = jobs::next_job_for_client(portal, &client.id, today).await?;
            let (moved, conflicts) = jobs::move_job(portal, &job.id, date).await?;
            let mut message = format!(
                "✔ Moved {} from {} to {}",
                moved.title,
                job.scheduled_on.format("%a %b %-d"),
                date.format("%a %b %-d")
            );
            if !conflicts.is_empty() {
                message.push_str(&format!("\n⚠ {} crew conflict(s) on that day", conflicts.len()));
            }
            Ok(message)
        }
        VoiceCommand::Complete { client } => {
            let client = clients::resolve_client(portal, &client).await?;
            let job = jobs::next_job_for_client(portal, &client.id, today).await?;
            let done = jobs::set_status(portal, &job.id, JobStatus::Completed).await?;
            Ok(format!("✔ Completed {} ({})", done.title, done.scheduled_on))
        }
        VoiceCommand::Note { client, text } => {
            let client = clients::resolve_client(portal, &client).await?;
            let notes = append_note(&client.notes, &text, today);
            let fields = ClientFields { notes: Some(notes), ..Default::default() };
            let updated = clients::update_client(portal, &client.id, fields).await?;
            Ok(format!("✔ Note added for {}", updated.name))
        }
        VoiceCommand::ShowCalendar { offset } => {
            let (year, month) = add_months(today.year(), today.month(), offset);
            let (month_jobs, names) = jobs::month_jobs(portal, year, month).await?;
            jobs::render_month(year, month, &month_jobs, &names, today)
        }
        VoiceCommand::Unknown(text) => Err(RoofDeskError::Validation(format!(
            "didn't understand \"{}\"",
            text
        ))),
    }
}

/// Notes grow line by line with a date stamp
pub fn append_note(existing: &str, text: &str, today: NaiveDate) -> String {
    let line = format!("[{}] {}", today, text.trim());
    if existing.trim().is_empty() {
        line
    } else {
        format!("{}\n{}", existing.trim_end(), line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2026-10-19 は月曜日
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_dates() {
        assert_eq!(parse_date("today", today()), Some(today()));
        assert_eq!(parse_date("Tomorrow", today()), Some(ymd(2026, 10, 20)));
        assert_eq!(parse_date("friday", today()), Some(ymd(2026, 10, 23)));
        // 同じ曜日は翌週
        assert_eq!(parse_date("monday", today()), Some(ymd(2026, 10, 26)));
        assert_eq!(parse_date("next friday", today()), Some(ymd(2026, 10, 30)));
        assert_eq!(parse_date("2026-12-01", today()), Some(ymd(2026, 12, 1)));
        assert_eq!(parse_date("November 3rd", today()), Some(ymd(2026, 11, 3)));
        assert_eq!(parse_date("march 2", today()), Some(ymd(2027, 3, 2)));
        assert_eq!(parse_date("oct 19", today()), Some(today()));
        assert_eq!(parse_date("february 30", today()), None);
        assert_eq!(parse_date("someday", today()), None);
    }

    #[test]
    fn test_parse_times() {
        assert_eq!(parse_time("9"), Some(hm(9, 0)));
        assert_eq!(parse_time("9am"), Some(hm(9, 0)));
        assert_eq!(parse_time("2:30 pm"), Some(hm(14, 30)));
        assert_eq!(parse_time("14:00"), Some(hm(14, 0)));
        assert_eq!(parse_time("12 am"), Some(hm(0, 0)));
        assert_eq!(parse_time("12pm"), Some(hm(12, 0)));
        assert_eq!(parse_time("13pm"), None);
        assert_eq!(parse_time("25"), None);
        assert_eq!(parse_time("noonish"), None);
    }

    #[test]
    fn test_client_commands() {
        assert_eq!(
            parse_command("New client Maria Lopez.", today()),
            VoiceCommand::NewClient { name: "Maria Lopez".into() }
        );
        assert_eq!(
            parse_command("open client smith", today()),
            VoiceCommand::OpenClient { query: "smith".into() }
        );
        assert_eq!(
            parse_command("note for Smith: leak over the garage. Check flashing!", today()),
            VoiceCommand::Note { client: "Smith".into(), text: "leak over the garage. Check flashing!".into() }
        );
    }

    #[test]
    fn test_schedule_variants() {
        assert_eq!(
            parse_command("schedule John Smith on friday at 2:30 pm", today()),
            VoiceCommand::Schedule { client: "John Smith".into(), date: ymd(2026, 10, 23), time: Some(hm(14, 30)) }
        );
        assert_eq!(
            parse_command("Schedule Lopez next monday", today()),
            VoiceCommand::Schedule { client: "Lopez".into(), date: ymd(2026, 11, 2), time: None }
        );
        assert_eq!(
            parse_command("schedule Pat Atkins November 3 at 9", today()),
            VoiceCommand::Schedule { client: "Pat Atkins".into(), date: ymd(2026, 11, 3), time: Some(hm(9, 0)) }
        );
        assert!(matches!(parse_command("schedule friday", today()), VoiceCommand::Unknown(_)));
        assert!(matches!(parse_command("schedule Smith whenever", today()), VoiceCommand::Unknown(_)));
    }

    #[test]
    fn test_move_complete_calendar() {
        assert_eq!(
            parse_command("reschedule Smith to tomorrow", today()),
            VoiceCommand::Move { client: "Smith".into(), date: ymd(2026, 10, 20) }
        );
        assert_eq!(
            parse_command("finish Lopez", today()),
            VoiceCommand::Complete { client: "Lopez".into() }
        );
        assert_eq!(parse_command("show calendar", today()), VoiceCommand::ShowCalendar { offset: 0 });
        assert_eq!(parse_command("Show next month", today()), VoiceCommand::ShowCalendar { offset: 1 });
        assert_eq!(parse_command("show last month", today()), VoiceCommand::ShowCalendar { offset: -1 });
        assert_eq!(
            parse_command("order more shingles", today()),
            VoiceCommand::Unknown("order more shingles".into())
        );
        assert!(matches!(parse_command("move Smith to nowhere", today()), VoiceCommand::Unknown(_)));
    }

    #[test]
    fn test_append_note() {
        assert_eq!(append_note("", "call back", today()), "[2026-10-19] call back");
        assert_eq!(
            append_note("gate code 1234\n", "dog in yard", today()),
            "gate code 1234\n[2026-10-19] dog in yard"
        );
    }
}
