//! PDF生成
//!
//! A4・組み込み Helvetica のテキストのみのドキュメント。
//! 行送りとページ送りは `TextPdf` が受け持つ。

use crate::error::{Result, RoofDeskError};
use crate::inspections::{photos_by_category, summarize};
use printpdf::*;
use roofdesk_common::{format_amount, Client, Inspection, Packet};
use std::path::Path;

const A4_WIDTH_MM: f32 = 210.0;
const A4_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 18.0;
const MM_TO_PT: f32 = 72.0 / 25.4;
/// Helvetica の平均文字幅（em比）
const AVG_CHAR_EM: f32 = 0.5;

pub const TITLE_SIZE: f32 = 18.0;
pub const HEADING_SIZE: f32 = 13.0;
pub const BODY_SIZE: f32 = 10.5;

/// Greedy word wrap to at most `max_chars` per line.
/// Words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
            let needed = if line.is_empty() { word.chars().count() } else { line.chars().count() + 1 + word.chars().count() };
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }

    // 末尾の空行は落とす
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Characters per line at a font size for the usable page width
pub fn chars_per_line(font_size: f32, indent_mm: f32) -> usize {
    let usable_pt = (A4_WIDTH_MM - MARGIN_MM * 2.0 - indent_mm) * MM_TO_PT;
    (usable_pt / (font_size * AVG_CHAR_EM)).floor().max(10.0) as usize
}

/// Top-down text writer that starts a new page when the cursor reaches the margin
pub struct TextPdf {
    title: String,
    pages: Vec<Vec<Op>>,
    current: Vec<Op>,
    /// 現在のベースライン（mm, 下端基準）
    y_mm: f32,
}

impl TextPdf {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            pages: Vec::new(),
            current: Vec::new(),
            y_mm: A4_HEIGHT_MM - MARGIN_MM,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    fn line_height_mm(size: f32) -> f32 {
        size * 1.35 / MM_TO_PT
    }

    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.y_mm = A4_HEIGHT_MM - MARGIN_MM;
    }

    /// Write one pre-wrapped line
    pub fn line(&mut self, text: &str, size: f32, indent_mm: f32) {
        let advance = Self::line_height_mm(size);
        if self.y_mm - advance < MARGIN_MM {
            self.new_page();
        }
        self.y_mm -= advance;
        let font = BuiltinFont::Helvetica;
        self.current.extend([
            Op::StartTextSection,
            Op::SetTextCursor { pos: Point::new(Mm(MARGIN_MM + indent_mm), Mm(self.y_mm)) },
            Op::SetFontSizeBuiltinFont { size: Pt(size), font },
            Op::WriteTextBuiltinFont { items: vec![TextItem::Text(text.to_string())], font },
            Op::EndTextSection,
        ]);
    }

    /// Wrap and write a paragraph
    pub fn paragraph(&mut self, text: &str, size: f32, indent_mm: f32) {
        for line in wrap_text(text, chars_per_line(size, indent_mm)) {
            self.line(&line, size, indent_mm);
        }
    }

    pub fn heading(&mut self, text: &str) {
        self.space(3.0);
        self.line(text, HEADING_SIZE, 0.0);
        self.space(1.0);
    }

    pub fn space(&mut self, mm: f32) {
        self.y_mm -= mm;
        if self.y_mm < MARGIN_MM {
            self.new_page();
        }
    }

    /// Serialize to PDF bytes
    pub fn finish(mut self) -> Vec<u8> {
        self.new_page();
        let pages: Vec<PdfPage> = self
            .pages
            .into_iter()
            .map(|ops| PdfPage::new(Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), ops))
            .collect();
        let mut doc = PdfDocument::new(&self.title);
        let mut warnings = Vec::new();
        doc.with_pages(pages).save(&PdfSaveOptions::default(), &mut warnings)
    }
}

pub fn packet_proposal(packet: &Packet, client: &Client, company: &str) -> TextPdf {
    let mut pdf = TextPdf::new(&packet.title);

    if !company.is_empty() {
        pdf.line(company, BODY_SIZE, 0.0);
    }
    pdf.line(&format!("Proposal: {}", packet.title), TITLE_SIZE, 0.0);
    pdf.line(
        &format!("Date: {}   Status: {}", packet.updated_at.format("%Y-%m-%d"), packet.status),
        BODY_SIZE,
        0.0,
    );

    pdf.heading("Prepared for");
    pdf.line(&client.name, BODY_SIZE, 4.0);
    for value in [&client.address, &client.phone, &client.email] {
        if !value.is_empty() {
            pdf.paragraph(value, BODY_SIZE, 4.0);
        }
    }

    pdf.heading("Scope of work");
    if packet.scope.trim().is_empty() {
        pdf.line("-", BODY_SIZE, 4.0);
    } else {
        pdf.paragraph(&packet.scope, BODY_SIZE, 4.0);
    }

    pdf.heading("Price");
    let amount = packet
        .amount_cents
        .map(format_amount)
        .unwrap_or_else(|| "To be quoted".into());
    pdf.line(&amount, HEADING_SIZE, 4.0);

    if !packet.photos.is_empty() {
        pdf.heading(&format!("Photos ({})", packet.photos.len()));
        for (i, photo) in packet.photos.iter().enumerate() {
            let caption = if photo.caption.is_empty() { "(no caption)" } else { photo.caption.as_str() };
            pdf.paragraph(&format!("{}. {}", i + 1, caption), BODY_SIZE, 4.0);
        }
    }

    pdf.heading("Acceptance");
    match &packet.signature {
        Some(signature) => {
            pdf.line(&format!("Signed by: {}", signature.signer_name), BODY_SIZE, 4.0);
            pdf.line(
                &format!("Signed at: {}", signature.signed_at.format("%Y-%m-%d %H:%M UTC")),
                BODY_SIZE,
                4.0,
            );
        }
        None => {
            pdf.space(8.0);
            pdf.line("Signature: ________________________________", BODY_SIZE, 4.0);
            pdf.space(4.0);
            pdf.line("Name: _____________________   Date: ___________", BODY_SIZE, 4.0);
        }
    }
    pdf
}

pub fn inspection_report(inspection: &Inspection, client: &Client) -> TextPdf {
    let title = format!("Roof Inspection - {}", client.name);
    let mut pdf = TextPdf::new(&title);
    let summary = summarize(inspection);

    pdf.line(&title, TITLE_SIZE, 0.0);
    pdf.line(&format!("Inspected on: {}", inspection.inspected_on), BODY_SIZE, 0.0);
    if !inspection.inspector.is_empty() {
        pdf.line(&format!("Inspector: {}", inspection.inspector), BODY_SIZE, 0.0);
    }
    if !inspection.roof_type.is_empty() {
        pdf.line(&format!("Roof type: {}", inspection.roof_type), BODY_SIZE, 0.0);
    }
    if !client.address.is_empty() {
        pdf.paragraph(&format!("Property: {}", client.address), BODY_SIZE, 0.0);
    }

    pdf.heading("Summary");
    pdf.line(
        &format!(
            "{} finding(s): {} high, {} medium, {} low. {} photo(s).",
            summary.total_findings(),
            summary.high,
            summary.medium,
            summary.low,
            inspection.photos.len()
        ),
        BODY_SIZE,
        4.0,
    );
    if !inspection.notes.trim().is_empty() {
        pdf.paragraph(&inspection.notes, BODY_SIZE, 4.0);
    }

    for (severity, findings) in &summary.by_severity {
        pdf.heading(&format!("{} severity", capitalize(severity.as_str())));
        for finding in findings {
            pdf.paragraph(
                &format!("- [{}] {}", finding.category.label(), finding.description),
                BODY_SIZE,
                4.0,
            );
            if !finding.recommendation.is_empty() {
                pdf.paragraph(&format!("Recommendation: {}", finding.recommendation), BODY_SIZE, 10.0);
            }
        }
    }

    let grouped = photos_by_category(inspection);
    if !grouped.is_empty() {
        pdf.heading("Photos");
        for (category, photos) in grouped {
            pdf.line(&format!("{} ({})", category.label(), photos.len()), BODY_SIZE, 4.0);
            for photo in photos {
                let name = photo.path.rsplit('/').next().unwrap_or(&photo.path);
                let text = if photo.caption.is_empty() {
                    name.to_string()
                } else {
                    format!("{} - {}", photo.caption, name)
                };
                pdf.paragraph(&text, BODY_SIZE, 10.0);
            }
        }
    }
    pdf
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn write_pdf(pdf: TextPdf, output_path: &Path) -> Result<()> {
    let bytes = pdf.finish();
    if bytes.is_empty() {
        return Err(RoofDeskError::PdfGeneration("empty document".into()));
    }
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use roofdesk_common::{Finding, InspectionCategory, Severity};

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("the quick brown fox", 9), vec!["the quick", "brown fox"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("one\n\ntwo", 20), vec!["one", "", "two"]);
        assert!(wrap_text("", 10).is_empty());
    }

    #[test]
    fn test_chars_per_line_shrinks_with_size() {
        assert!(chars_per_line(BODY_SIZE, 0.0) > chars_per_line(TITLE_SIZE, 0.0));
        assert!(chars_per_line(BODY_SIZE, 0.0) > chars_per_line(BODY_SIZE, 20.0));
    }

    #[test]
    fn test_long_text_paginates() {
        let mut pdf = TextPdf::new("long");
        for i in 0..200 {
            pdf.line(&format!("line {}", i), BODY_SIZE, 0.0);
        }
        assert!(pdf.page_count() >= 3);
        let bytes = pdf.finish();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_reports_render() {
        let client = Client::new("John Smith");
        let mut packet = Packet::new(&client.id, "Full replacement");
        packet.scope = "Tear off two layers and install architectural shingles. ".repeat(20);
        packet.amount_cents = Some(1_845_000);
        assert!(packet_proposal(&packet, &client, "Acme Roofing").finish().starts_with(b"%PDF"));

        let mut inspection = Inspection::new(&client.id, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        inspection.findings.push(Finding {
            category: InspectionCategory::Flashing,
            severity: Severity::High,
            description: "Lifted step flashing at the chimney".into(),
            recommendation: "Reseal and replace".into(),
        });
        let pdf = inspection_report(&inspection, &client);
        assert_eq!(pdf.page_count(), 1);
        assert!(pdf.finish().starts_with(b"%PDF"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("high"), "High");
        assert_eq!(capitalize(""), "");
    }
}
