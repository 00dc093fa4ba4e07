//! Quick Capture
//!
//! フォルダ内の写真・動画・音声メモを顧客に紐付けてアップロードする。
//! - `capture_folder`: 一括取り込み（台帳で重複スキップ）
//! - `review_tags`: 未タグのキャプチャを対話式でタグ付け
//! - `add_voice_memo`: 音声メモ1件（またはテキスト）を追加

mod exif;
pub mod ledger;
pub mod scan;

use crate::error::{Result, RoofDeskError};
use crate::repo::Portal;
use crate::store::{content_type_for, object_path, Filter};
use crate::transcribe::Transcriber;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use ledger::{Ledger, LedgerEntry};
use roofdesk_common::{Capture, Client, MediaKind};
use scan::MediaFile;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Options shared by every file in one capture batch
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub tag: String,
    pub note: String,
    pub recursive: bool,
    pub show_progress: bool,
}

#[derive(Debug, Default)]
pub struct CaptureReport {
    pub uploaded: Vec<Capture>,
    /// Already in the ledger (or duplicated within the batch)
    pub skipped: usize,
    /// (file name, reason)
    pub failed: Vec<(String, String)>,
}

/// Object path for captured media: `clients/{client_id}/captures/{hash}.{ext}`
pub fn capture_object_path(client_id: &str, hash: &str, ext: &str) -> String {
    let file = if ext.is_empty() { hash.to_string() } else { format!("{}.{}", hash, ext) };
    object_path(&["clients", client_id, "captures", &file])
}

fn progress_bar(total: u64, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    pb
}

/// Upload one media file and insert its `captures` row
async fn upload_media(
    portal: &Portal,
    client: &Client,
    file: &MediaFile,
    hash: &str,
    options: &CaptureOptions,
    transcriber: Option<&Transcriber>,
) -> Result<Capture> {
    let ext = file.extension();
    let bytes = tokio::fs::read(&file.path).await?;
    let path = capture_object_path(&client.id, hash, &ext);
    portal.objects().upload(&path, bytes, content_type_for(&ext)).await?;

    let mut capture = Capture::new(&client.id, file.kind, path);
    capture.tag = options.tag.trim().to_string();
    capture.note = options.note.clone();
    capture.taken_at = file.taken_at.clone();
    capture.content_hash = hash.to_string();

    if file.kind == MediaKind::Voice {
        if let Some(transcriber) = transcriber {
            // 文字起こし失敗はアップロード自体を失敗にしない
            match transcriber.transcribe_file(&file.path).await {
                Ok(text) => capture.transcript = Some(text),
                Err(e) => warn!(file = %file.file_name, error = %e, "transcription skipped"),
            }
        }
    }

    portal.create(&capture).await
}

/// Upload every new media file in `folder` for `client`
pub async fn capture_folder(
    portal: &Portal,
    client: &Client,
    folder: &Path,
    options: &CaptureOptions,
    transcriber: Option<&Transcriber>,
) -> Result<CaptureReport> {
    let media = scan::scan_folder(folder, options.recursive)?;
    if media.is_empty() {
        return Err(RoofDeskError::NoMediaFound(folder.display().to_string()));
    }

    let mut ledger = Ledger::load(folder);
    let partition = ledger::partition_new(&media, &ledger);
    info!(
        folder = %folder.display(),
        new = partition.fresh.len(),
        known = partition.known.len(),
        "capture batch"
    );

    let mut report = CaptureReport {
        skipped: partition.known.len(),
        failed: partition
            .failed
            .into_iter()
            .map(|(file, reason)| (file.file_name, reason))
            .collect(),
        ..Default::default()
    };

    let pb = progress_bar(partition.fresh.len() as u64, options.show_progress);
    for (file, hash) in &partition.fresh {
        pb.set_message(file.file_name.clone());
        match upload_media(portal, client, file, hash, options, transcriber).await {
            Ok(capture) => {
                let file_size = std::fs::metadata(&file.path).map(|m| m.len()).unwrap_or(0);
                ledger.insert(
                    hash.clone(),
                    LedgerEntry {
                        file_name: file.file_name.clone(),
                        file_size,
                        capture_id: capture.id.clone(),
                        client_id: client.id.clone(),
                    },
                );
                report.uploaded.push(capture);
            }
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "capture upload failed");
                report.failed.push((file.file_name.clone(), e.to_string()));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if !report.uploaded.is_empty() {
        ledger.save(folder)?;
    }
    Ok(report)
}

/// Where a voice memo comes from
#[derive(Debug, Clone)]
pub enum MemoSource<'a> {
    Audio(&'a Path),
    Text(String),
}

/// Attach a single voice memo (audio file or typed transcript) to a client
pub async fn add_voice_memo(
    portal: &Portal,
    client: &Client,
    source: MemoSource<'_>,
    tag: &str,
    transcriber: Option<&Transcriber>,
) -> Result<Capture> {
    match source {
        MemoSource::Audio(path) => {
            let mut file = scan::media_file(path)?;
            // webm は動画扱いだが、メモとして渡された場合は音声とみなす
            if file.kind == MediaKind::Video && file.extension() == "webm" {
                file.kind = MediaKind::Voice;
            }
            if file.kind != MediaKind::Voice {
                return Err(RoofDeskError::Validation(format!(
                    "{} is not an audio file",
                    file.file_name
                )));
            }
            let hash = ledger::compute_file_hash(path)?;
            let options = CaptureOptions { tag: tag.to_string(), ..Default::default() };
            upload_media(portal, client, &file, &hash, &options, transcriber).await
        }
        MemoSource::Text(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(RoofDeskError::Validation("memo text is empty".into()));
            }
            let mut capture = Capture::new(&client.id, MediaKind::Voice, "");
            capture.tag = tag.trim().to_string();
            capture.content_hash = ledger::hash_bytes(text.as_bytes());
            capture.transcript = Some(text);
            portal.create(&capture).await
        }
    }
}

pub async fn list_captures(portal: &Portal, client_id: &str) -> Result<Vec<Capture>> {
    portal
        .list(&Filter::all().eq("client_id", client_id).order_by("created_at", true))
        .await
}

/// Indices of captures with no tag
pub fn untagged(captures: &[Capture]) -> Vec<usize> {
    captures
        .iter()
        .enumerate()
        .filter(|(_, c)| c.tag.trim().is_empty())
        .map(|(i, _)| i)
        .collect()
}

/// Tags already used, first occurrence order
pub fn existing_tags(captures: &[Capture]) -> Vec<String> {
    let mut seen = HashSet::new();
    captures
        .iter()
        .map(|c| c.tag.trim())
        .filter(|t| !t.is_empty() && seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Review prompt outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    /// Tag this capture
    Input(String),
    /// Leave this one untagged
    Skip,
    /// Leave all remaining untagged
    SkipAll,
    /// Same tag as the previous one
    Repeat,
    /// Previous tag for all remaining
    RepeatAll,
    Quit,
}

impl ReviewAction {
    /// `s`/empty skip, `S` skip all, `r`/`R` repeat (only with a previous tag), `q` quit
    pub fn parse(input: &str, has_prev: bool) -> Self {
        match input.trim() {
            "" | "s" => ReviewAction::Skip,
            "S" => ReviewAction::SkipAll,
            "r" if has_prev => ReviewAction::Repeat,
            "R" if has_prev => ReviewAction::RepeatAll,
            "q" | "Q" => ReviewAction::Quit,
            other => ReviewAction::Input(other.to_string()),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReviewReport {
    pub tagged: usize,
    pub skipped: usize,
}

/// Walk untagged captures, asking `prompt` for each one.
/// Every tag is saved as soon as it is chosen.
pub async fn review_tags<F>(portal: &Portal, client: &Client, mut prompt: F) -> Result<ReviewReport>
where
    F: FnMut(&Capture, &[String], Option<&str>) -> Result<ReviewAction>,
{
    let mut captures = list_captures(portal, &client.id).await?;
    let pending = untagged(&captures);
    let mut report = ReviewReport::default();

    if pending.is_empty() {
        println!("✔ All captures for {} are tagged", client.name);
        return Ok(report);
    }

    println!("📷 Untagged captures: {}", pending.len());
    println!("---");
    println!("Keys: [text]tag [s]skip [S]skip rest [r]same as previous [R]same for rest [q]quit");
    println!("---\n");

    let candidates = existing_tags(&captures);
    let mut prev_tag: Option<String> = None;
    let mut repeat_all = false;

    for (count, &idx) in pending.iter().enumerate() {
        let capture = &captures[idx];
        println!(
            "[{}/{}] {} ({})",
            count + 1,
            pending.len(),
            capture.path,
            capture.kind
        );

        let action = match (&prev_tag, repeat_all) {
            (Some(_), true) => ReviewAction::Repeat,
            _ => prompt(capture, &candidates, prev_tag.as_deref())?,
        };

        let tag = match action {
            ReviewAction::Input(tag) => Some(tag),
            ReviewAction::Repeat => prev_tag.clone(),
            ReviewAction::RepeatAll => {
                repeat_all = true;
                prev_tag.clone()
            }
            ReviewAction::Skip => None,
            ReviewAction::SkipAll => {
                report.skipped += pending.len() - count;
                println!("  → skipping the rest\n");
                break;
            }
            ReviewAction::Quit => {
                report.skipped += pending.len() - count;
                println!("Stopping review...");
                break;
            }
        };

        match tag {
            Some(tag) => {
                captures[idx].tag = tag.clone();
                portal.save(&captures[idx]).await?;
                println!("  → {}\n", tag);
                prev_tag = Some(tag);
                report.tagged += 1;
            }
            None => {
                println!("  → skipped\n");
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}

/// Terminal prompt for `review_tags`
pub fn prompt_review_action(
    _capture: &Capture,
    candidates: &[String],
    prev: Option<&str>,
) -> Result<ReviewAction> {
    let prompt = if prev.is_some() {
        "Tag (s:skip S:skip rest r:same R:same for rest q:quit)"
    } else {
        "Tag (s:skip S:skip rest q:quit)"
    };

    if !candidates.is_empty() {
        println!("  Existing: {}", candidates.join(", "));
    }

    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .map_err(|e| RoofDeskError::Prompt(e.to_string()))?;

    Ok(ReviewAction::parse(&input, prev.is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(tag: &str) -> Capture {
        let mut c = Capture::new("c1", MediaKind::Photo, "clients/c1/captures/x.jpg");
        c.tag = tag.into();
        c
    }

    #[test]
    fn test_capture_object_path() {
        assert_eq!(
            capture_object_path("c1", "abc", "jpg"),
            "clients/c1/captures/abc.jpg"
        );
        assert_eq!(capture_object_path("c1", "abc", ""), "clients/c1/captures/abc");
    }

    #[test]
    fn test_untagged_and_existing_tags() {
        let captures = vec![capture("ridge"), capture(""), capture("  "), capture("ridge"), capture("gutter")];
        assert_eq!(untagged(&captures), vec![1, 2]);
        assert_eq!(existing_tags(&captures), vec!["ridge", "gutter"]);
    }

    #[test]
    fn test_review_action_parse() {
        assert_eq!(ReviewAction::parse("", false), ReviewAction::Skip);
        assert_eq!(ReviewAction::parse("S", false), ReviewAction::SkipAll);
        assert_eq!(ReviewAction::parse("r", true), ReviewAction::Repeat);
        assert_eq!(ReviewAction::parse("R", true), ReviewAction::RepeatAll);
        // 前のタグがなければ r はそのままタグ扱い
        assert_eq!(ReviewAction::parse("r", false), ReviewAction::Input("r".into()));
        assert_eq!(ReviewAction::parse("q", true), ReviewAction::Quit);
        assert_eq!(ReviewAction::parse(" north slope ", true), ReviewAction::Input("north slope".into()));
    }
}
