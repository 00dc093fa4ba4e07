use crate::media::PhotoQuality;
use crate::voice;
use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use roofdesk_common::{JobStatus, PacketStatus, Severity};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roofdesk")]
#[command(about = "Roofing CRM: clients, proposals, inspections, jobs and quick capture", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage clients
    Client {
        #[command(subcommand)]
        action: ClientCommand,
    },

    /// Proposal packets (photos, amount, signature)
    Packet {
        #[command(subcommand)]
        action: PacketCommand,
    },

    /// Roof inspections
    Inspection {
        #[command(subcommand)]
        action: InspectionCommand,
    },

    /// Scheduled jobs
    Job {
        #[command(subcommand)]
        action: JobCommand,
    },

    /// Print a month calendar
    Calendar {
        /// Month to show (YYYY-MM, default: this month)
        #[arg(short, long)]
        month: Option<String>,

        /// Show next month
        #[arg(long, conflicts_with = "prev")]
        next: bool,

        /// Show previous month
        #[arg(long)]
        prev: bool,
    },

    /// Quick Capture: photos, video and voice memos per client
    Capture {
        #[command(subcommand)]
        action: CaptureCommand,
    },

    /// Attach one voice memo to a client
    Memo {
        /// Client id, id prefix or name
        #[arg(short, long)]
        client: String,

        /// Audio file (m4a/mp3/wav/ogg/webm)
        #[arg(required_unless_present = "text")]
        audio: Option<PathBuf>,

        /// Typed memo instead of audio
        #[arg(long, conflicts_with = "audio")]
        text: Option<String>,

        /// Tag for the memo
        #[arg(short, long, default_value = "")]
        tag: String,
    },

    /// Run a spoken or typed command, e.g. "schedule Smith friday at 9am"
    Voice {
        /// Command phrase
        #[arg(required_unless_present = "audio", num_args = 1..)]
        phrase: Vec<String>,

        /// Transcribe an audio file and run it
        #[arg(long, conflicts_with = "phrase")]
        audio: Option<PathBuf>,

        /// Parse only, do not execute
        #[arg(long)]
        dry_run: bool,
    },

    /// Push writes made while offline to the backend
    Sync {
        /// Only show how many writes are queued
        #[arg(long)]
        status: bool,
    },

    /// Show or edit settings
    Config {
        /// Backend URL
        #[arg(long)]
        set_url: Option<String>,

        /// Backend API key
        #[arg(long)]
        set_api_key: Option<String>,

        /// Storage bucket
        #[arg(long)]
        set_bucket: Option<String>,

        /// Show settings
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
pub enum ClientCommand {
    /// Add a client
    Add {
        name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List all clients
    List,

    /// Show a client with packets, inspections, jobs and captures
    Show { client: String },

    /// Edit client fields
    Edit {
        client: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a client
    Delete {
        client: String,

        /// Also delete linked packets, inspections, jobs and captures
        #[arg(long)]
        cascade: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Search by name, phone or email
    Find { query: String },

    /// Import clients from a spreadsheet (xlsx/xls/ods)
    Import { file: PathBuf },

    /// Export clients to xlsx
    Export {
        /// Output file or directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum PacketCommand {
    /// Create a proposal packet for a client
    Create {
        #[arg(short, long)]
        client: String,
        #[arg(short, long)]
        title: String,
        #[arg(long)]
        scope: Option<String>,
        /// Proposal amount, e.g. 12500 or $12,500.00
        #[arg(long)]
        amount: Option<String>,
    },

    /// List packets
    List {
        #[arg(short, long)]
        client: Option<String>,
    },

    /// Show one packet
    Show { packet: String },

    /// Edit an unsigned packet
    Edit {
        packet: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        scope: Option<String>,
        #[arg(long)]
        amount: Option<String>,
    },

    /// Set status (draft/sent/declined)
    Status { packet: String, status: PacketStatus },

    /// Add photos
    AddPhoto {
        packet: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "")]
        caption: String,
        /// Upload quality (high/medium/low/original)
        #[arg(long, default_value = "medium")]
        quality: PhotoQuality,
    },

    /// Remove a photo by number (as listed in `show`) or path
    RemovePhoto { packet: String, photo: String },

    /// Sign with a PNG/JPEG file or a data URL from a signature pad
    Sign {
        packet: String,
        /// Signer name
        #[arg(short, long)]
        name: String,
        /// Signature image path or data:image/...;base64 URL
        signature: String,
        /// Replace an existing signature
        #[arg(long)]
        force: bool,
    },

    /// Export the proposal PDF
    Export {
        packet: String,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Company name printed on the proposal
        #[arg(long, default_value = "")]
        company: String,
    },

    /// Delete a packet and its stored files
    Delete {
        packet: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum InspectionCommand {
    /// Start an inspection
    Create {
        #[arg(short, long)]
        client: String,
        /// Inspection date (default: today)
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        inspector: String,
        #[arg(long, default_value = "")]
        roof_type: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List inspections
    List {
        #[arg(short, long)]
        client: Option<String>,
    },

    /// Show photos by category and findings
    Show { inspection: String },

    /// Add categorized photos
    AddPhoto {
        inspection: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Category or alias (e.g. "pipe boot" → vents)
        #[arg(long, default_value = "other")]
        category: String,
        #[arg(long, default_value = "")]
        caption: String,
        /// Custom alias file (JSON)
        #[arg(long)]
        alias: Option<PathBuf>,
        #[arg(long, default_value = "medium")]
        quality: PhotoQuality,
    },

    /// Record a finding
    AddFinding {
        inspection: String,
        #[arg(long, default_value = "other")]
        category: String,
        #[arg(short, long, default_value = "medium")]
        severity: Severity,
        #[arg(short, long)]
        description: String,
        #[arg(short, long, default_value = "")]
        recommendation: String,
        #[arg(long)]
        alias: Option<PathBuf>,
    },

    /// Findings by severity
    Summary { inspection: String },

    /// Export the report
    Export {
        inspection: String,
        /// Output format (pdf/excel/both)
        #[arg(short, long, default_value = "both")]
        format: ExportFormat,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Delete an inspection and its photos
    Delete {
        inspection: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Schedule a job
    Create {
        #[arg(short, long)]
        client: String,
        /// Date: YYYY-MM-DD, today, tomorrow, friday, "march 3"
        #[arg(short, long, value_parser = parse_date_arg)]
        date: NaiveDate,
        /// Start time: 9am, 2:30 pm, 14:00
        #[arg(long, value_parser = parse_time_arg)]
        time: Option<NaiveTime>,
        #[arg(long)]
        hours: Option<f32>,
        #[arg(long)]
        crew: Option<String>,
        /// Linked packet (must belong to the same client)
        #[arg(long)]
        packet: Option<String>,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List jobs in a date range
    List {
        #[arg(long, value_parser = parse_date_arg)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_arg)]
        to: Option<NaiveDate>,
        #[arg(short, long)]
        client: Option<String>,
    },

    /// Set status (scheduled/in_progress/completed/cancelled)
    Status { job: String, status: JobStatus },

    /// Move to another date
    Move {
        job: String,
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },

    /// Edit job fields
    Edit {
        job: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(long, value_parser = parse_time_arg)]
        time: Option<NaiveTime>,
        #[arg(long)]
        hours: Option<f32>,
        #[arg(long)]
        crew: Option<String>,
        /// Link a packet of the same client ("" to unlink)
        #[arg(long)]
        packet: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a job
    Delete {
        job: String,
        #[arg(short, long)]
        yes: bool,
    },

    /// Export jobs to xlsx
    Export {
        #[arg(long, value_parser = parse_date_arg)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_arg)]
        to: Option<NaiveDate>,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum CaptureCommand {
    /// Upload every new photo, video and voice memo in a folder
    Folder {
        folder: PathBuf,
        #[arg(short, long)]
        client: String,
        #[arg(short, long, default_value = "")]
        tag: String,
        #[arg(short, long, default_value = "")]
        note: String,
        /// Include subfolders
        #[arg(short = 'r', long)]
        recursive: bool,
        /// Transcribe voice memos (needs a transcription endpoint)
        #[arg(long)]
        transcribe: bool,
    },

    /// Tag untagged captures interactively
    Review {
        #[arg(short, long)]
        client: String,
    },

    /// List captures for a client
    List {
        #[arg(short, long)]
        client: String,
        #[arg(long)]
        untagged: bool,
    },

    /// Forget which files in a folder were uploaded
    ClearLedger { folder: PathBuf },
}

#[derive(Clone, Debug, Default)]
pub enum ExportFormat {
    Pdf,
    Excel,
    #[default]
    Both,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "both" => Ok(ExportFormat::Both),
            _ => Err(format!("Unknown format: {}. Use pdf, excel, or both", s)),
        }
    }
}

/// Dates on the command line accept the same words as voice commands
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    voice::parse_date(s, Local::now().date_naive()).ok_or_else(|| format!("Unknown date: {}", s))
}

pub fn parse_time_arg(s: &str) -> Result<NaiveTime, String> {
    voice::parse_time(s).ok_or_else(|| format!("Unknown time: {}. Use 9am, 2:30 pm or 14:00", s))
}

/// `YYYY-MM` → (year, month)
pub fn parse_month_arg(s: &str) -> Result<(i32, u32), String> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| format!("Unknown month: {}. Use YYYY-MM", s))?;
    Ok((date.year(), date.month()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_export_format() {
        assert!(matches!("XLSX".parse::<ExportFormat>(), Ok(ExportFormat::Excel)));
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_parse_month_arg() {
        assert_eq!(parse_month_arg("2026-11"), Ok((2026, 11)));
        assert!(parse_month_arg("2026-13").is_err());
        assert!(parse_month_arg("november").is_err());
    }

    #[test]
    fn test_parse_time_arg() {
        assert_eq!(parse_time_arg("2:30 pm"), Ok(NaiveTime::from_hms_opt(14, 30, 0).unwrap()));
        assert!(parse_time_arg("25:00").is_err());
    }

    #[test]
    fn test_parse_job_create() {
        let cli = Cli::try_parse_from([
            "roofdesk", "job", "create", "--client", "smith", "--date", "2026-11-03", "--time", "9am", "--crew", "A",
        ])
        .unwrap();
        match cli.command {
            Commands::Job { action: JobCommand::Create { date, time, crew, .. } } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 11, 3).unwrap());
                assert_eq!(time, NaiveTime::from_hms_opt(9, 0, 0));
                assert_eq!(crew.as_deref(), Some("A"));
            }
            _ => panic!("expected job create"),
        }
    }

    #[test]
    fn test_voice_phrase_words() {
        let cli = Cli::try_parse_from(["roofdesk", "voice", "show", "calendar"]).unwrap();
        match cli.command {
            Commands::Voice { phrase, audio, .. } => {
                assert_eq!(phrase.join(" "), "show calendar");
                assert!(audio.is_none());
            }
            _ => panic!("expected voice"),
        }
    }
}
