//! Roof inspections: categorized photos and findings

use crate::capture::ledger::hash_bytes;
use crate::error::{Result, RoofDeskError};
use crate::media::PhotoQuality;
use crate::packets::read_photo;
use crate::repo::Portal;
use crate::store::{content_type_for, object_path, Filter};
use chrono::NaiveDate;
use roofdesk_common::{AliasConfig, Client, Finding, Inspection, InspectionCategory, InspectionPhoto, Severity};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct InspectionFields {
    pub inspector: String,
    pub roof_type: String,
    pub notes: String,
}

pub async fn create_inspection(
    portal: &Portal,
    client_id: &str,
    inspected_on: NaiveDate,
    fields: InspectionFields,
) -> Result<Inspection> {
    let client: Client = portal.find(client_id).await?;
    let mut inspection = Inspection::new(&client.id, inspected_on);
    inspection.inspector = fields.inspector.trim().to_string();
    inspection.roof_type = fields.roof_type.trim().to_string();
    inspection.notes = fields.notes;

    let stored = portal.create(&inspection).await?;
    info!(id = %stored.id, client = %client.name, date = %inspected_on, "inspection created");
    Ok(stored)
}

/// Newest first, optionally for one client
pub async fn list_inspections(portal: &Portal, client_id: Option<&str>) -> Result<Vec<Inspection>> {
    let mut filter = Filter::all().order_by("inspected_on", false);
    if let Some(id) = client_id {
        filter = filter.eq("client_id", id);
    }
    portal.list(&filter).await
}

/// Upload to `inspections/{id}/{category}/{hash}.{ext}`.
/// `category` is free text resolved through the alias table.
pub async fn add_photo(
    portal: &Portal,
    id: &str,
    file: &Path,
    category: &str,
    caption: &str,
    aliases: &AliasConfig,
    quality: PhotoQuality,
) -> Result<(Inspection, InspectionCategory)> {
    let mut inspection: Inspection = portal.find(id).await?;
    let category = aliases.resolve(category);
    let (display, bytes, ext) = read_photo(file, quality)?;
    let object = object_path(&[
        "inspections",
        &inspection.id,
        category.as_str(),
        &format!("{}.{}", hash_bytes(&bytes), ext),
    ]);
    if inspection.photos.iter().any(|p| p.path == object) {
        return Err(RoofDeskError::Validation(format!(
            "{} is already filed under {}",
            display, category
        )));
    }

    portal.objects().upload(&object, bytes, content_type_for(&ext)).await?;
    inspection.photos.push(InspectionPhoto {
        path: object,
        category,
        caption: caption.trim().to_string(),
    });
    let saved = portal.save(&inspection).await?;
    Ok((saved, category))
}

pub async fn add_finding(
    portal: &Portal,
    id: &str,
    category: &str,
    severity: Severity,
    description: &str,
    recommendation: &str,
    aliases: &AliasConfig,
) -> Result<Inspection> {
    if description.trim().is_empty() {
        return Err(RoofDeskError::Validation("finding description is required".into()));
    }
    let mut inspection: Inspection = portal.find(id).await?;
    inspection.findings.push(Finding {
        category: aliases.resolve(category),
        severity,
        description: description.trim().to_string(),
        recommendation: recommendation.trim().to_string(),
    });
    portal.save(&inspection).await
}

pub async fn delete_inspection(portal: &Portal, id: &str) -> Result<Inspection> {
    let inspection: Inspection = portal.find(id).await?;
    let paths: Vec<String> = inspection.photos.iter().map(|p| p.path.clone()).collect();
    portal.delete::<Inspection>(&inspection.id).await?;
    portal.objects().remove(&paths).await?;
    Ok(inspection)
}

/// Findings grouped by severity (high first) plus photo counts per category
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionSummary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub by_severity: Vec<(Severity, Vec<Finding>)>,
    pub photos_by_category: BTreeMap<InspectionCategory, usize>,
}

impl InspectionSummary {
    pub fn total_findings(&self) -> usize {
        self.high + self.medium + self.low
    }
}

pub fn summarize(inspection: &Inspection) -> InspectionSummary {
    let (high, medium, low) = inspection.severity_counts();
    let by_severity = [Severity::High, Severity::Medium, Severity::Low]
        .into_iter()
        .map(|severity| {
            let findings: Vec<Finding> = inspection
                .findings
                .iter()
                .filter(|f| f.severity == severity)
                .cloned()
                .collect();
            (severity, findings)
        })
        .filter(|(_, findings)| !findings.is_empty())
        .collect();

    let mut photos_by_category = BTreeMap::new();
    for photo in &inspection.photos {
        *photos_by_category.entry(photo.category).or_insert(0) += 1;
    }

    InspectionSummary { high, medium, low, by_severity, photos_by_category }
}

/// Photos in report order: by category, then upload order
pub fn photos_by_category(inspection: &Inspection) -> Vec<(InspectionCategory, Vec<&InspectionPhoto>)> {
    InspectionCategory::ALL
        .iter()
        .map(|category| {
            let photos: Vec<&InspectionPhoto> = inspection
                .photos
                .iter()
                .filter(|p| p.category == *category)
                .collect();
            (*category, photos)
        })
        .filter(|(_, photos)| !photos.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, category: InspectionCategory) -> Finding {
        Finding {
            category,
            severity,
            description: format!("{} issue", category),
            recommendation: String::new(),
        }
    }

    fn sample() -> Inspection {
        let mut inspection = Inspection::new("c1", NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        inspection.findings = vec![
            finding(Severity::Low, InspectionCategory::Gutters),
            finding(Severity::High, InspectionCategory::Flashing),
            finding(Severity::Low, InspectionCategory::Vents),
        ];
        inspection.photos = vec![
            InspectionPhoto { path: "a".into(), category: InspectionCategory::Shingles, caption: String::new() },
            InspectionPhoto { path: "b".into(), category: InspectionCategory::Overview, caption: String::new() },
            InspectionPhoto { path: "c".into(), category: InspectionCategory::Shingles, caption: String::new() },
        ];
        inspection
    }

    #[test]
    fn test_summary_groups_by_severity() {
        let summary = summarize(&sample());
        assert_eq!((summary.high, summary.medium, summary.low), (1, 0, 2));
        assert_eq!(summary.total_findings(), 3);
        let order: Vec<Severity> = summary.by_severity.iter().map(|(s, _)| *s).collect();
        assert_eq!(order, vec![Severity::High, Severity::Low]);
        assert_eq!(summary.photos_by_category[&InspectionCategory::Shingles], 2);
    }

    #[test]
    fn test_photos_in_category_order() {
        let inspection = sample();
        let grouped = photos_by_category(&inspection);
        assert_eq!(grouped[0].0, InspectionCategory::Overview);
        assert_eq!(grouped[1].0, InspectionCategory::Shingles);
        assert_eq!(grouped[1].1.len(), 2);
    }
}
