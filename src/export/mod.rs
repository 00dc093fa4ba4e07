pub mod excel;
pub mod import;
pub mod pdf;

use crate::cli::ExportFormat;
use crate::clients::list_clients;
use crate::error::Result;
use crate::jobs::list_jobs;
use crate::repo::Portal;
use chrono::NaiveDate;
use roofdesk_common::{Client, Inspection, Packet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn output_path_for_format(output: &Path, title: &str, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", title, extension))
    } else {
        output.to_path_buf()
    }
}

fn output_paths_for_both(output: &Path, title: &str) -> (PathBuf, PathBuf) {
    if output.is_dir() || output.extension().is_none() {
        let pdf_path = output.join(format!("{}.pdf", title));
        let excel_path = output.join(format!("{}.xlsx", title));
        (pdf_path, excel_path)
    } else {
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let stem = output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(title);
        let pdf_path = parent.join(format!("{}.pdf", stem));
        let excel_path = parent.join(format!("{}.xlsx", stem));
        (pdf_path, excel_path)
    }
}

/// File-name-safe title: keeps letters, digits, space, dash and underscore
pub fn file_title(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        "export".into()
    } else {
        cleaned
    }
}

/// Proposal PDF for a packet
pub async fn export_packet(portal: &Portal, packet_id: &str, output: &Path, company: &str) -> Result<PathBuf> {
    let packet: Packet = portal.find(packet_id).await?;
    let client: Client = portal.get(&packet.client_id).await?;
    let path = output_path_for_format(output, &file_title(&packet.title), "pdf");

    println!("- Generating proposal PDF...");
    pdf::write_pdf(pdf::packet_proposal(&packet, &client, company), &path)?;
    println!("✔ PDF: {}", path.display());
    Ok(path)
}

pub async fn export_inspection(
    portal: &Portal,
    inspection_id: &str,
    format: &ExportFormat,
    output: &Path,
) -> Result<Vec<PathBuf>> {
    let inspection: Inspection = portal.find(inspection_id).await?;
    let client: Client = portal.get(&inspection.client_id).await?;
    let title = file_title(&format!("Inspection {} {}", client.name, inspection.inspected_on));

    let (pdf_path, excel_path) = match format {
        ExportFormat::Pdf => (Some(output_path_for_format(output, &title, "pdf")), None),
        ExportFormat::Excel => (None, Some(output_path_for_format(output, &title, "xlsx"))),
        ExportFormat::Both => {
            let (pdf, excel) = output_paths_for_both(output, &title);
            (Some(pdf), Some(excel))
        }
    };

    let mut written = Vec::new();
    if let Some(path) = pdf_path {
        println!("- Generating inspection PDF...");
        pdf::write_pdf(pdf::inspection_report(&inspection, &client), &path)?;
        println!("✔ PDF: {}", path.display());
        written.push(path);
    }
    if let Some(path) = excel_path {
        println!("- Generating inspection workbook...");
        excel::write_workbook(excel::inspection_workbook(&inspection, &client)?, &path)?;
        println!("✔ Excel: {}", path.display());
        written.push(path);
    }
    Ok(written)
}

pub async fn export_clients(portal: &Portal, output: &Path) -> Result<PathBuf> {
    let clients = list_clients(portal).await?;
    let path = output_path_for_format(output, "clients", "xlsx");
    excel::write_workbook(excel::clients_workbook(&clients)?, &path)?;
    println!("✔ Excel: {} ({} clients)", path.display(), clients.len());
    Ok(path)
}

pub async fn export_jobs(
    portal: &Portal,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    output: &Path,
) -> Result<PathBuf> {
    let jobs = list_jobs(portal, from, to, None).await?;
    let names: HashMap<String, String> = list_clients(portal)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let path = output_path_for_format(output, "jobs", "xlsx");
    excel::write_workbook(excel::jobs_workbook(&jobs, &names)?, &path)?;
    println!("✔ Excel: {} ({} jobs)", path.display(), jobs.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_for_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            output_path_for_format(dir.path(), "Report", "pdf"),
            dir.path().join("Report.pdf")
        );
        assert_eq!(
            output_path_for_format(Path::new("out/reports"), "Report", "xlsx"),
            Path::new("out/reports/Report.xlsx")
        );
        assert_eq!(
            output_path_for_format(Path::new("out/custom.pdf"), "Report", "pdf"),
            Path::new("out/custom.pdf")
        );
    }

    #[test]
    fn test_output_paths_for_both() {
        let (pdf, excel) = output_paths_for_both(Path::new("out/smith.pdf"), "Report");
        assert_eq!(pdf, Path::new("out/smith.pdf"));
        assert_eq!(excel, Path::new("out/smith.xlsx"));

        let (pdf, excel) = output_paths_for_both(Path::new("out"), "Report");
        assert_eq!(pdf, Path::new("out/Report.pdf"));
        assert_eq!(excel, Path::new("out/Report.xlsx"));
    }

    #[test]
    fn test_file_title() {
        assert_eq!(file_title("Smith / Re-roof: 2026"), "Smith _ Re-roof_ 2026");
        assert_eq!(file_title("  "), "export");
    }
}
