use anyhow::Context;
use chrono::{Datelike, Local, NaiveDate};
use clap::Parser;
use dialoguer::Confirm;
use roofdesk::capture::{self, ledger::Ledger, CaptureOptions, MemoSource};
use roofdesk::cli::{self, CaptureCommand, Cli, ClientCommand, Commands, InspectionCommand, JobCommand, PacketCommand};
use roofdesk::clients::{self, ClientFields};
use roofdesk::config::Config;
use roofdesk::inspections::{self, InspectionFields};
use roofdesk::jobs::{self, JobFields};
use roofdesk::packets::{self, PacketFields};
use roofdesk::repo::{short_id, Portal};
use roofdesk::signature::{self, SignatureSource};
use roofdesk::transcribe::Transcriber;
use roofdesk::{export, voice};
use roofdesk_common::schedule::add_months;
use roofdesk_common::{format_amount, AliasConfig, Client, Inspection, Packet};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Config { set_url, set_api_key, set_bucket, show } => {
            run_config(config, set_url, set_api_key, set_bucket, show)?;
        }
        command => {
            let portal = Portal::open(&config)?;
            run(&portal, &config, command, today).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "roofdesk=debug" } else { "roofdesk=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn confirm(prompt: &str, yes: bool) -> anyhow::Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

fn amount(text: Option<String>) -> anyhow::Result<Option<i64>> {
    Ok(text.as_deref().map(packets::parse_amount).transpose()?)
}

async fn run(portal: &Portal, config: &Config, command: Commands, today: NaiveDate) -> anyhow::Result<()> {
    match command {
        Commands::Client { action } => run_client(portal, action).await,
        Commands::Packet { action } => run_packet(portal, action).await,
        Commands::Inspection { action } => run_inspection(portal, action, today).await,
        Commands::Job { action } => run_job(portal, action).await,
        Commands::Calendar { month, next, prev } => {
            let (year, month) = match month {
                Some(text) => cli::parse_month_arg(&text).map_err(anyhow::Error::msg)?,
                None => (today.year(), today.month()),
            };
            let offset = if next { 1 } else if prev { -1 } else { 0 };
            let (year, month) = add_months(year, month, offset);
            let (month_jobs, names) = jobs::month_jobs(portal, year, month).await?;
            println!("{}", jobs::render_month(year, month, &month_jobs, &names, today)?);
            Ok(())
        }
        Commands::Capture { action } => run_capture(portal, config, action).await,
        Commands::Memo { client, audio, text, tag } => {
            let client = clients::resolve_client(portal, &client).await?;
            let transcriber = Transcriber::optional(config);
            let source = match (&audio, text) {
                (Some(path), _) => MemoSource::Audio(path),
                (None, Some(text)) => MemoSource::Text(text),
                (None, None) => anyhow::bail!("give an audio file or --text"),
            };
            let memo = capture::add_voice_memo(portal, &client, source, &tag, transcriber.as_ref()).await?;
            println!("✔ Memo saved for {} ({})", client.name, short_id(&memo.id));
            if let Some(transcript) = &memo.transcript {
                println!("  \"{}\"", transcript);
            }
            Ok(())
        }
        Commands::Voice { phrase, audio, dry_run } => {
            let text = match audio {
                Some(path) => {
                    println!("- Transcribing {}...", path.display());
                    let text = Transcriber::from_config(config)?.transcribe_file(&path).await?;
                    println!("✔ Heard: \"{}\"", text.trim());
                    text
                }
                None => phrase.join(" "),
            };
            let command = voice::parse_command(&text, today);
            if dry_run {
                println!("{:?}", command);
                return Ok(());
            }
            println!("{}", voice::execute(portal, command, today).await?);
            Ok(())
        }
        Commands::Sync { status } => {
            let store = portal.store();
            let pending = store.pending()?;
            if status || !store.has_remote() {
                println!("Queued writes: {}", pending);
                if !store.has_remote() {
                    println!("No backend configured; data stays in {}", store.local().root().display());
                }
                return Ok(());
            }
            println!("- Syncing {} queued write(s)...", pending);
            let report = store.sync().await?;
            println!("✔ Applied: {}", report.applied);
            if let Some(failed) = &report.failed {
                println!("  ✖ {}", failed);
            }
            if report.remaining > 0 {
                println!("⚠ Sync stopped, {} write(s) still queued", report.remaining);
            }
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn run_config(
    mut config: Config,
    set_url: Option<String>,
    set_api_key: Option<String>,
    set_bucket: Option<String>,
    show: bool,
) -> anyhow::Result<()> {
    if let Some(url) = set_url {
        config.set_backend_url(url)?;
        println!("✔ Backend URL saved");
    }
    if let Some(key) = set_api_key {
        config.set_api_key(key)?;
        println!("✔ API key saved");
    }
    if let Some(bucket) = set_bucket {
        config.set_bucket(bucket)?;
        println!("✔ Bucket saved");
    }

    if show {
        let set = |v: bool| if v { "set" } else { "not set" };
        println!("Settings ({}):", Config::config_path()?.display());
        println!("  Backend:       {}", config.backend_url().unwrap_or_else(|| "(local only)".into()));
        println!("  API key:       {}", set(config.get_api_key().is_ok()));
        println!("  Bucket:        {}", config.bucket);
        println!("  Data dir:      {}", config.data_dir()?.display());
        println!("  Transcription: {}", config.transcribe_url.as_deref().unwrap_or("(none)"));
        println!("  Model:         {}", config.transcribe_model);
        println!("  Timeout:       {}s", config.timeout_seconds);
    }
    Ok(())
}

async fn run_client(portal: &Portal, action: ClientCommand) -> anyhow::Result<()> {
    match action {
        ClientCommand::Add { name, phone, email, address, notes } => {
            let fields = ClientFields { name: None, phone, email, address, notes };
            let client = clients::add_client(portal, &name, fields).await?;
            println!("✔ Added {} ({})", client.name, short_id(&client.id));
        }
        ClientCommand::List => print_clients(&clients::list_clients(portal).await?),
        ClientCommand::Find { query } => print_clients(&clients::find_clients(portal, &query).await?),
        ClientCommand::Show { client } => {
            let client = clients::resolve_client(portal, &client).await?;
            let overview = clients::overview(portal, client).await?;
            println!("{}", clients::describe_overview(&overview));
        }
        ClientCommand::Edit { client, name, phone, email, address, notes } => {
            let client = clients::resolve_client(portal, &client).await?;
            let fields = ClientFields { name, phone, email, address, notes };
            let updated = clients::update_client(portal, &client.id, fields).await?;
            println!("✔ Updated {}", updated.name);
        }
        ClientCommand::Delete { client, cascade, yes } => {
            let client = clients::resolve_client(portal, &client).await?;
            let what = if cascade { " and everything linked to it" } else { "" };
            if !confirm(&format!("Delete {}{}?", client.name, what), yes)? {
                println!("Cancelled");
                return Ok(());
            }
            let removed = clients::delete_client(portal, &client.id, cascade).await?;
            println!(
                "✔ Deleted {} ({} packet(s), {} inspection(s), {} job(s), {} capture(s))",
                removed.client.name,
                removed.packets.len(),
                removed.inspections.len(),
                removed.jobs.len(),
                removed.captures.len()
            );
        }
        ClientCommand::Import { file } => {
            println!("- Importing {}...", file.display());
            let report = clients::import_clients(portal, &file).await?;
            println!("✔ Added {} client(s)", report.added.len());
            if !report.duplicates.is_empty() {
                println!("  Skipped existing: {}", report.duplicates.join(", "));
            }
            for (row, reason) in &report.invalid {
                println!("  ✖ row {}: {}", row, reason);
            }
        }
        ClientCommand::Export { output } => {
            export::export_clients(portal, &output).await?;
        }
    }
    Ok(())
}

fn print_clients(list: &[Client]) {
    if list.is_empty() {
        println!("No clients");
        return;
    }
    for client in list {
        println!("{}  {:<28} {:<16} {}", short_id(&client.id), client.name, client.phone, client.email);
    }
}

fn print_packet(packet: &Packet, client: &Client) {
    println!("{} ({})", packet.title, short_id(&packet.id));
    println!("  Client:  {}", client.name);
    println!("  Status:  {}", packet.status);
    println!(
        "  Amount:  {}",
        packet.amount_cents.map(format_amount).unwrap_or_else(|| "-".into())
    );
    if !packet.scope.trim().is_empty() {
        println!("  Scope:");
        for line in packet.scope.lines() {
            println!("    {}", line);
        }
    }
    println!("  Photos ({})", packet.photos.len());
    for (i, photo) in packet.photos.iter().enumerate() {
        println!("    {:>2}. {}  {}", i + 1, photo.path, photo.caption);
    }
    if let Some(signature) = &packet.signature {
        println!(
            "  Signed by {} on {}",
            signature.signer_name,
            signature.signed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
}

async fn run_packet(portal: &Portal, action: PacketCommand) -> anyhow::Result<()> {
    match action {
        PacketCommand::Create { client, title, scope, amount: text } => {
            let client = clients::resolve_client(portal, &client).await?;
            let fields = PacketFields { title: Some(title), scope, amount_cents: amount(text)? };
            let packet = packets::create_packet(portal, &client.id, fields).await?;
            println!("✔ Created packet {} for {} ({})", packet.title, client.name, short_id(&packet.id));
        }
        PacketCommand::List { client } => {
            let client = match client {
                Some(query) => Some(clients::resolve_client(portal, &query).await?),
                None => None,
            };
            let list = packets::list_packets(portal, client.as_ref().map(|c| c.id.as_str())).await?;
            if list.is_empty() {
                println!("No packets");
            }
            for p in &list {
                let amount = p.amount_cents.map(format_amount).unwrap_or_else(|| "-".into());
                println!("{}  {:<8} {:>12}  {}", short_id(&p.id), p.status.as_str(), amount, p.title);
            }
        }
        PacketCommand::Show { packet } => {
            let packet: Packet = portal.find(&packet).await?;
            let client: Client = portal.get(&packet.client_id).await?;
            print_packet(&packet, &client);
        }
        PacketCommand::Edit { packet, title, scope, amount: text } => {
            let fields = PacketFields { title, scope, amount_cents: amount(text)? };
            let packet = packets::update_packet(portal, &packet, fields).await?;
            println!("✔ Updated {}", packet.title);
        }
        PacketCommand::Status { packet, status } => {
            let packet = packets::set_status(portal, &packet, status).await?;
            println!("✔ {} is now {}", packet.title, packet.status);
        }
        PacketCommand::AddPhoto { packet, files, caption, quality } => {
            for file in &files {
                let updated = packets::add_photo(portal, &packet, file, &caption, quality)
                    .await
                    .with_context(|| format!("adding {}", file.display()))?;
                println!("✔ {} ({} photo(s))", file.display(), updated.photos.len());
            }
        }
        PacketCommand::RemovePhoto { packet, photo } => {
            let updated = packets::remove_photo(portal, &packet, &photo).await?;
            println!("✔ Removed photo ({} left)", updated.photos.len());
        }
        PacketCommand::Sign { packet, name, signature: input, force } => {
            let signed = signature::sign_packet(portal, &packet, &name, SignatureSource::detect(&input), force).await?;
            println!("✔ {} signed by {}", signed.title, name.trim());
        }
        PacketCommand::Export { packet, output, company } => {
            export::export_packet(portal, &packet, &output, &company).await?;
        }
        PacketCommand::Delete { packet, yes } => {
            let found: Packet = portal.find(&packet).await?;
            if !confirm(&format!("Delete packet {}?", found.title), yes)? {
                println!("Cancelled");
                return Ok(());
            }
            let removed = packets::delete_packet(portal, &found.id).await?;
            println!("✔ Deleted {}", removed.title);
        }
    }
    Ok(())
}

fn load_aliases(path: Option<&Path>) -> anyhow::Result<AliasConfig> {
    match path {
        Some(path) => AliasConfig::from_file(path).with_context(|| format!("alias file {}", path.display())),
        None => Ok(AliasConfig::default()),
    }
}

async fn run_inspection(portal: &Portal, action: InspectionCommand, today: NaiveDate) -> anyhow::Result<()> {
    match action {
        InspectionCommand::Create { client, date, inspector, roof_type, notes } => {
            let client = clients::resolve_client(portal, &client).await?;
            let fields = InspectionFields { inspector, roof_type, notes };
            let date = date.unwrap_or(today);
            let inspection = inspections::create_inspection(portal, &client.id, date, fields).await?;
            println!("✔ Inspection for {} on {} ({})", client.name, date, short_id(&inspection.id));
        }
        InspectionCommand::List { client } => {
            let client = match client {
                Some(query) => Some(clients::resolve_client(portal, &query).await?),
                None => None,
            };
            let list = inspections::list_inspections(portal, client.as_ref().map(|c| c.id.as_str())).await?;
            if list.is_empty() {
                println!("No inspections");
            }
            for i in &list {
                let (high, medium, low) = i.severity_counts();
                println!(
                    "{}  {}  {:>3} photo(s)  H{} M{} L{}  {}",
                    short_id(&i.id),
                    i.inspected_on,
                    i.photos.len(),
                    high,
                    medium,
                    low,
                    i.inspector
                );
            }
        }
        InspectionCommand::Show { inspection } => {
            let inspection: Inspection = portal.find(&inspection).await?;
            let client: Client = portal.get(&inspection.client_id).await?;
            println!("Inspection {} - {} ({})", inspection.inspected_on, client.name, short_id(&inspection.id));
            if !inspection.inspector.is_empty() {
                println!("  Inspector: {}", inspection.inspector);
            }
            if !inspection.roof_type.is_empty() {
                println!("  Roof:      {}", inspection.roof_type);
            }
            for (category, photos) in inspections::photos_by_category(&inspection) {
                println!("  {} ({})", category.label(), photos.len());
                for photo in photos {
                    println!("    {}  {}", photo.path, photo.caption);
                }
            }
            print_findings(&inspection);
        }
        InspectionCommand::AddPhoto { inspection, files, category, caption, alias, quality } => {
            let aliases = load_aliases(alias.as_deref())?;
            for file in &files {
                let (_, filed) = inspections::add_photo(portal, &inspection, file, &category, &caption, &aliases, quality)
                    .await
                    .with_context(|| format!("adding {}", file.display()))?;
                println!("✔ {} → {}", file.display(), filed.label());
            }
        }
        InspectionCommand::AddFinding { inspection, category, severity, description, recommendation, alias } => {
            let aliases = load_aliases(alias.as_deref())?;
            let updated = inspections::add_finding(
                portal,
                &inspection,
                &category,
                severity,
                &description,
                &recommendation,
                &aliases,
            )
            .await?;
            println!("✔ Finding added ({} total)", updated.findings.len());
        }
        InspectionCommand::Summary { inspection } => {
            let inspection: Inspection = portal.find(&inspection).await?;
            print_findings(&inspection);
        }
        InspectionCommand::Export { inspection, format, output } => {
            let written = export::export_inspection(portal, &inspection, &format, &output).await?;
            println!("\n✅ Exported {} file(s)", written.len());
        }
        InspectionCommand::Delete { inspection, yes } => {
            let found: Inspection = portal.find(&inspection).await?;
            if !confirm(&format!("Delete inspection of {}?", found.inspected_on), yes)? {
                println!("Cancelled");
                return Ok(());
            }
            inspections::delete_inspection(portal, &found.id).await?;
            println!("✔ Deleted inspection {}", short_id(&found.id));
        }
    }
    Ok(())
}

fn print_findings(inspection: &Inspection) {
    let summary = inspections::summarize(inspection);
    println!(
        "  Findings: {} (high {}, medium {}, low {})",
        summary.total_findings(),
        summary.high,
        summary.medium,
        summary.low
    );
    for (severity, findings) in &summary.by_severity {
        println!("  [{}]", severity.as_str().to_uppercase());
        for finding in findings {
            println!("    {}: {}", finding.category.label(), finding.description);
            if !finding.recommendation.is_empty() {
                println!("      → {}", finding.recommendation);
            }
        }
    }
}

async fn run_job(portal: &Portal, action: JobCommand) -> anyhow::Result<()> {
    match action {
        JobCommand::Create { client, date, time, hours, crew, packet, title, notes } => {
            let client = clients::resolve_client(portal, &client).await?;
            let fields = JobFields { title, start_time: time, duration_hours: hours, crew, packet_id: packet, notes };
            let job = jobs::create_job(portal, &client.id, date, fields).await?;
            println!("✔ Scheduled {} on {} ({})", job.title, job.scheduled_on, short_id(&job.id));
        }
        JobCommand::List { from, to, client } => {
            let client = match client {
                Some(query) => Some(clients::resolve_client(portal, &query).await?),
                None => None,
            };
            let list = jobs::list_jobs(portal, from, to, client.as_ref().map(|c| c.id.as_str())).await?;
            if list.is_empty() {
                println!("No jobs");
            }
            for job in &list {
                let time = job.start_time.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "--:--".into());
                println!(
                    "{}  {} {}  {:<11} {:<10} {}",
                    short_id(&job.id),
                    job.scheduled_on,
                    time,
                    job.status.as_str(),
                    job.crew.as_deref().unwrap_or("-"),
                    job.title
                );
            }
        }
        JobCommand::Status { job, status } => {
            let job = jobs::set_status(portal, &job, status).await?;
            println!("✔ {} is now {}", job.title, job.status);
        }
        JobCommand::Move { job, date } => {
            let (moved, conflicts) = jobs::move_job(portal, &job, date).await?;
            println!("✔ Moved {} to {}", moved.title, moved.scheduled_on);
            for conflict in &conflicts {
                println!("⚠ Crew {} is double-booked on {}", conflict.crew, conflict.date);
            }
        }
        JobCommand::Edit { job, title, time, hours, crew, packet, notes } => {
            let fields = JobFields { title, start_time: time, duration_hours: hours, crew, packet_id: packet, notes };
            let job = jobs::update_job(portal, &job, fields).await?;
            println!("✔ Updated {}", job.title);
        }
        JobCommand::Delete { job, yes } => {
            let found: roofdesk_common::Job = portal.find(&job).await?;
            if !confirm(&format!("Delete job {} on {}?", found.title, found.scheduled_on), yes)? {
                println!("Cancelled");
                return Ok(());
            }
            jobs::delete_job(portal, &found.id).await?;
            println!("✔ Deleted {}", found.title);
        }
        JobCommand::Export { from, to, output } => {
            export::export_jobs(portal, from, to, &output).await?;
        }
    }
    Ok(())
}

async fn run_capture(portal: &Portal, config: &Config, action: CaptureCommand) -> anyhow::Result<()> {
    match action {
        CaptureCommand::Folder { folder, client, tag, note, recursive, transcribe } => {
            println!("📷 roofdesk - Quick Capture\n");
            let client = clients::resolve_client(portal, &client).await?;
            let transcriber = if transcribe { Some(Transcriber::from_config(config)?) } else { None };

            println!("[1/2] Scanning {}...", folder.display());
            let options = CaptureOptions { tag, note, recursive, show_progress: true };
            println!("[2/2] Uploading for {}...", client.name);
            let report = capture::capture_folder(portal, &client, &folder, &options, transcriber.as_ref()).await?;

            println!("✔ Uploaded: {}", report.uploaded.len());
            if report.skipped > 0 {
                println!("  Already uploaded: {}", report.skipped);
            }
            for (file, reason) in &report.failed {
                println!("  ✖ {}: {}", file, reason);
            }
            let untagged = report.uploaded.iter().filter(|c| c.tag.is_empty()).count();
            if untagged > 0 {
                println!("\nTag them with: roofdesk capture review --client {}", short_id(&client.id));
            }
        }
        CaptureCommand::Review { client } => {
            let client = clients::resolve_client(portal, &client).await?;
            let report = capture::review_tags(portal, &client, capture::prompt_review_action).await?;
            println!("✔ Tagged {}, skipped {}", report.tagged, report.skipped);
        }
        CaptureCommand::List { client, untagged } => {
            let client = clients::resolve_client(portal, &client).await?;
            let list = capture::list_captures(portal, &client.id).await?;
            let shown: Vec<_> = list.iter().filter(|c| !untagged || c.tag.is_empty()).collect();
            if shown.is_empty() {
                println!("No captures");
            }
            for c in shown {
                let tag = if c.tag.is_empty() { "(untagged)" } else { c.tag.as_str() };
                let what = if c.path.is_empty() { "(typed memo)" } else { c.path.as_str() };
                println!("{}  {:<5} {:<16} {}", short_id(&c.id), c.kind.as_str(), tag, what);
                if let Some(transcript) = &c.transcript {
                    println!("      \"{}\"", transcript);
                }
            }
        }
        CaptureCommand::ClearLedger { folder } => match Ledger::clear(&folder)? {
            true => println!("✔ Ledger removed: {}", Ledger::ledger_path(&folder).display()),
            false => println!("No ledger in {}", folder.display()),
        },
    }
    Ok(())
}
