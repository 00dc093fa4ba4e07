//! PDF/Excel出力の統合テスト

use chrono::NaiveDate;
use roofdesk::cli::ExportFormat;
use roofdesk::clients::{self, ClientFields};
use roofdesk::export;
use roofdesk::inspections::{self, InspectionFields};
use roofdesk::jobs::{self, JobFields};
use roofdesk::packets::{self, PacketFields};
use roofdesk::repo::Portal;
use roofdesk::store::{FallbackStore, LocalStore};
use roofdesk_common::{AliasConfig, Severity};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn local_portal(dir: &TempDir) -> Portal {
    let local = Arc::new(LocalStore::open(&dir.path().join("data")).unwrap());
    Portal::new(FallbackStore::local_only(local))
}

fn read(path: &std::path::Path) -> Vec<u8> {
    std::fs::read(path).expect("output file")
}

#[tokio::test]
async fn test_packet_proposal_pdf() {
    let dir = tempdir().unwrap();
    let portal = local_portal(&dir);
    let client = clients::add_client(&portal, "John Smith", ClientFields::default()).await.unwrap();
    let scope = "Remove existing shingles down to the deck. ".repeat(40);
    let packet = packets::create_packet(
        &portal,
        &client.id,
        PacketFields {
            title: Some("Full tear-off / replacement".into()),
            scope: Some(scope),
            amount_cents: Some(1_850_000),
        },
    )
    .await
    .unwrap();

    let out = dir.path().join("out");
    let path = export::export_packet(&portal, &packet.id[..8], &out, "Summit Roofing").await.unwrap();
    assert_eq!(path, out.join("Full tear-off _ replacement.pdf"));
    assert!(read(&path).starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_inspection_report_both_formats() {
    let dir = tempdir().unwrap();
    let portal = local_portal(&dir);
    let client = clients::add_client(&portal, "Oak HOA", ClientFields::default()).await.unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let inspection = inspections::create_inspection(&portal, &client.id, date, InspectionFields::default())
        .await
        .unwrap();
    let aliases = AliasConfig::default();
    for (severity, text) in [(Severity::High, "Active leak at chimney"), (Severity::Low, "Granule loss")] {
        inspections::add_finding(&portal, &inspection.id, "chimney", severity, text, "Reflash", &aliases)
            .await
            .unwrap();
    }

    let written = export::export_inspection(&portal, &inspection.id, &ExportFormat::Both, dir.path())
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
    assert!(read(&written[0]).starts_with(b"%PDF"));
    assert!(read(&written[1]).starts_with(b"PK"));

    // 拡張子付きの出力先は兄弟パスになる
    let named = dir.path().join("report.pdf");
    let written = export::export_inspection(&portal, &inspection.id, &ExportFormat::Both, &named)
        .await
        .unwrap();
    assert_eq!(written, vec![named.clone(), dir.path().join("report.xlsx")]);

    let only_excel = export::export_inspection(&portal, &inspection.id, &ExportFormat::Excel, dir.path())
        .await
        .unwrap();
    assert_eq!(only_excel.len(), 1);
    assert_eq!(only_excel[0].extension().unwrap(), "xlsx");
}

#[tokio::test]
async fn test_clients_and_jobs_workbooks() {
    let dir = tempdir().unwrap();
    let portal = local_portal(&dir);
    let client = clients::add_client(&portal, "Maria Lopez", ClientFields::default()).await.unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 11, 3).unwrap();
    jobs::create_job(&portal, &client.id, date, JobFields { crew: Some("B".into()), ..Default::default() })
        .await
        .unwrap();

    let clients_path = export::export_clients(&portal, dir.path()).await.unwrap();
    assert_eq!(clients_path, dir.path().join("clients.xlsx"));
    assert!(read(&clients_path).starts_with(b"PK"));

    // 書き出した顧客一覧はそのまま取り込める（重複はスキップ）
    let report = clients::import_clients(&portal, &clients_path).await.unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.duplicates, vec!["Maria Lopez".to_string()]);

    let jobs_path = export::export_jobs(&portal, Some(date), None, &dir.path().join("nov.xlsx"))
        .await
        .unwrap();
    assert_eq!(jobs_path, dir.path().join("nov.xlsx"));
    assert!(read(&jobs_path).starts_with(b"PK"));
}
