//! Excel生成
//!
//! 顧客一覧・工事一覧・点検レポート（所見／写真の2シート）

use crate::error::{Result, RoofDeskError};
use crate::inspections::photos_by_category;
use roofdesk_common::{Client, Inspection, Job};
use rust_xlsxwriter::*;
use std::collections::HashMap;
use std::path::Path;

fn excel_err(context: &str) -> impl Fn(XlsxError) -> RoofDeskError + '_ {
    move |e| RoofDeskError::ExcelGeneration(format!("{}: {}", context, e))
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0x333333))
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xAAAAAA))
}

fn wrap_format() -> Format {
    Format::new().set_text_wrap().set_align(FormatAlign::Top)
}

/// Header row, column widths and frozen header
fn write_header(worksheet: &mut Worksheet, columns: &[(&str, f64)]) -> Result<()> {
    let format = header_format();
    for (col, (label, width)) in columns.iter().enumerate() {
        let col = col as u16;
        worksheet
            .write_string_with_format(0, col, *label, &format)
            .map_err(excel_err("header"))?;
        worksheet.set_column_width(col, *width).map_err(excel_err("column width"))?;
    }
    worksheet.set_freeze_panes(1, 0).map_err(excel_err("freeze panes"))?;
    Ok(())
}

fn write_row(worksheet: &mut Worksheet, row: u32, values: &[String], format: &Format) -> Result<()> {
    for (col, value) in values.iter().enumerate() {
        worksheet
            .write_string_with_format(row, col as u16, value, format)
            .map_err(excel_err("cell"))?;
    }
    Ok(())
}

pub fn clients_workbook(clients: &[Client]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Clients").map_err(excel_err("sheet name"))?;
    write_header(
        worksheet,
        &[("Name", 28.0), ("Phone", 16.0), ("Email", 28.0), ("Address", 36.0), ("Notes", 48.0), ("Created", 12.0)],
    )?;

    let wrap = wrap_format();
    for (i, client) in clients.iter().enumerate() {
        let values = [
            client.name.clone(),
            client.phone.clone(),
            client.email.clone(),
            client.address.clone(),
            client.notes.clone(),
            client.created_at.format("%Y-%m-%d").to_string(),
        ];
        write_row(worksheet, i as u32 + 1, &values, &wrap)?;
    }

    workbook.save_to_buffer().map_err(excel_err("save"))
}

pub fn jobs_workbook(jobs: &[Job], client_names: &HashMap<String, String>) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Jobs").map_err(excel_err("sheet name"))?;
    write_header(
        worksheet,
        &[
            ("Date", 12.0),
            ("Start", 8.0),
            ("Hours", 8.0),
            ("Client", 24.0),
            ("Title", 32.0),
            ("Crew", 14.0),
            ("Status", 12.0),
            ("Notes", 40.0),
        ],
    )?;

    let wrap = wrap_format();
    let number = Format::new().set_num_format("0.0").set_align(FormatAlign::Top);
    for (i, job) in jobs.iter().enumerate() {
        let row = i as u32 + 1;
        let values = [
            job.scheduled_on.to_string(),
            job.start_time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default(),
        ];
        write_row(worksheet, row, &values, &wrap)?;
        worksheet
            .write_number_with_format(row, 2, job.duration_hours as f64, &number)
            .map_err(excel_err("cell"))?;
        let rest = [
            client_names.get(&job.client_id).cloned().unwrap_or_default(),
            job.title.clone(),
            job.crew.clone().unwrap_or_default(),
            job.status.to_string(),
            job.notes.clone(),
        ];
        for (offset, value) in rest.iter().enumerate() {
            worksheet
                .write_string_with_format(row, 3 + offset as u16, value, &wrap)
                .map_err(excel_err("cell"))?;
        }
    }

    workbook.save_to_buffer().map_err(excel_err("save"))
}

/// Findings sheet plus a photos sheet (category order)
pub fn inspection_workbook(inspection: &Inspection, client: &Client) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let wrap = wrap_format();

    {
        let findings = workbook.add_worksheet();
        findings.set_name("Findings").map_err(excel_err("sheet name"))?;
        let bold = Format::new().set_bold();
        findings
            .write_string_with_format(0, 0, format!("Roof Inspection - {}", client.name), &bold)
            .map_err(excel_err("title"))?;
        findings
            .write_string(1, 0, format!("Inspected on {}", inspection.inspected_on))
            .map_err(excel_err("title"))?;

        let columns = [("Severity", 10.0), ("Category", 22.0), ("Description", 50.0), ("Recommendation", 40.0)];
        let header = header_format();
        for (col, (label, width)) in columns.iter().enumerate() {
            findings
                .write_string_with_format(3, col as u16, *label, &header)
                .map_err(excel_err("header"))?;
            findings.set_column_width(col as u16, *width).map_err(excel_err("column width"))?;
        }

        let mut sorted: Vec<_> = inspection.findings.iter().collect();
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.category.cmp(&b.category)));
        for (i, finding) in sorted.iter().enumerate() {
            let values = [
                finding.severity.to_string(),
                finding.category.label().to_string(),
                finding.description.clone(),
                finding.recommendation.clone(),
            ];
            write_row(findings, 4 + i as u32, &values, &wrap)?;
        }
    }

    {
        let photos = workbook.add_worksheet();
        photos.set_name("Photos").map_err(excel_err("sheet name"))?;
        write_header(photos, &[("Category", 22.0), ("Caption", 40.0), ("Path", 60.0)])?;
        let mut row = 1;
        for (category, list) in photos_by_category(inspection) {
            for photo in list {
                let values = [category.label().to_string(), photo.caption.clone(), photo.path.clone()];
                write_row(photos, row, &values, &wrap)?;
                row += 1;
            }
        }
    }

    workbook.save_to_buffer().map_err(excel_err("save"))
}

pub fn write_workbook(bytes: Vec<u8>, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, bytes)?;
    Ok(())
}
