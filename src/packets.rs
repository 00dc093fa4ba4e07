//! Proposal packets

use crate::capture::ledger::hash_bytes;
use crate::error::{Result, RoofDeskError};
use crate::media::{prepare_photo, PhotoQuality};
use crate::repo::Portal;
use crate::store::{content_type_for, object_path, Filter};
use chrono::Utc;
use roofdesk_common::{Client, Packet, PacketPhoto, PacketStatus};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct PacketFields {
    pub title: Option<String>,
    pub scope: Option<String>,
    pub amount_cents: Option<i64>,
}

/// Parse "1234.56", "$1,234.56" or "1234" into cents
pub fn parse_amount(text: &str) -> Result<i64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '$' && *c != ',').collect();
    let invalid = || RoofDeskError::Validation(format!("invalid amount: {}", text));
    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let dollars: i64 = whole.parse().map_err(|_| invalid())?;
    if dollars < 0 {
        return Err(invalid());
    }
    let cents: i64 = format!("{:0<2}", frac).parse().map_err(|_| invalid())?;
    dollars
        .checked_mul(100)
        .and_then(|d| d.checked_add(cents))
        .ok_or_else(invalid)
}

pub async fn create_packet(portal: &Portal, client_id: &str, fields: PacketFields) -> Result<Packet> {
    let client: Client = portal.find(client_id).await?;
    let title = fields.title.unwrap_or_default();
    if title.trim().is_empty() {
        return Err(RoofDeskError::Validation("packet title is required".into()));
    }
    let mut packet = Packet::new(&client.id, title.trim());
    packet.scope = fields.scope.unwrap_or_default();
    packet.amount_cents = fields.amount_cents;

    let stored = portal.create(&packet).await?;
    info!(id = %stored.id, client = %client.name, "packet created");
    Ok(stored)
}

pub async fn update_packet(portal: &Portal, id: &str, fields: PacketFields) -> Result<Packet> {
    let mut packet: Packet = portal.find(id).await?;
    if packet.is_signed() {
        return Err(RoofDeskError::Validation("signed packets cannot be edited".into()));
    }
    if let Some(title) = fields.title {
        if title.trim().is_empty() {
            return Err(RoofDeskError::Validation("packet title is required".into()));
        }
        packet.title = title.trim().to_string();
    }
    if let Some(scope) = fields.scope {
        packet.scope = scope;
    }
    if fields.amount_cents.is_some() {
        packet.amount_cents = fields.amount_cents;
    }
    packet.updated_at = Utc::now();
    portal.save(&packet).await
}

/// All packets, or one client's, newest first
pub async fn list_packets(portal: &Portal, client_id: Option<&str>) -> Result<Vec<Packet>> {
    let mut filter = Filter::all().order_by("created_at", false);
    if let Some(id) = client_id {
        filter = filter.eq("client_id", id);
    }
    portal.list(&filter).await
}

/// Status changes. `signed` is only reachable through signing.
pub async fn set_status(portal: &Portal, id: &str, status: PacketStatus) -> Result<Packet> {
    let mut packet: Packet = portal.find(id).await?;
    check_transition(&packet, status)?;
    packet.status = status;
    packet.updated_at = Utc::now();
    let saved = portal.save(&packet).await?;
    info!(id = %saved.id, status = %status, "packet status");
    Ok(saved)
}

fn check_transition(packet: &Packet, status: PacketStatus) -> Result<()> {
    if status == PacketStatus::Signed && !packet.is_signed() {
        return Err(RoofDeskError::Validation(
            "use `packet sign` to mark a packet signed".into(),
        ));
    }
    if packet.is_signed() && status != PacketStatus::Signed {
        return Err(RoofDeskError::Validation("packet is already signed".into()));
    }
    Ok(())
}

/// Upload a photo to `packets/{id}/{hash}.{ext}` and append it
pub async fn add_photo(
    portal: &Portal,
    id: &str,
    file: &Path,
    caption: &str,
    quality: PhotoQuality,
) -> Result<Packet> {
    let mut packet: Packet = portal.find(id).await?;
    let (path, bytes, ext) = read_photo(file, quality)?;
    let object = object_path(&["packets", &packet.id, &format!("{}.{}", hash_bytes(&bytes), ext)]);
    if packet.photos.iter().any(|p| p.path == object) {
        return Err(RoofDeskError::Validation(format!("{} is already in this packet", path)));
    }

    portal.objects().upload(&object, bytes, content_type_for(&ext)).await?;
    packet.photos.push(PacketPhoto { path: object, caption: caption.trim().to_string() });
    packet.updated_at = Utc::now();
    portal.save(&packet).await
}

/// Read a photo from disk and prepare it for upload: (display name, bytes, extension)
pub(crate) fn read_photo(file: &Path, quality: PhotoQuality) -> Result<(String, Vec<u8>, String)> {
    if !file.is_file() {
        return Err(RoofDeskError::FileNotFound(file.display().to_string()));
    }
    let ext = file
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if crate::capture::scan::media_kind(&ext) != Some(roofdesk_common::MediaKind::Photo) {
        return Err(RoofDeskError::Validation(format!("not a photo: {}", file.display())));
    }
    let prepared = prepare_photo(std::fs::read(file)?, &ext, quality)?;
    Ok((file.display().to_string(), prepared.bytes, prepared.extension))
}

/// Remove a photo by its 1-based position or object path; the stored object goes too
pub async fn remove_photo(portal: &Portal, id: &str, which: &str) -> Result<Packet> {
    let mut packet: Packet = portal.find(id).await?;
    let index = photo_index(&packet.photos, which)?;
    let removed = packet.photos.remove(index);
    packet.updated_at = Utc::now();
    let saved = portal.save(&packet).await?;
    portal.objects().remove(&[removed.path]).await?;
    Ok(saved)
}

fn photo_index(photos: &[PacketPhoto], which: &str) -> Result<usize> {
    let which = which.trim();
    if let Ok(n) = which.parse::<usize>() {
        if n >= 1 && n <= photos.len() {
            return Ok(n - 1);
        }
        return Err(RoofDeskError::Validation(format!(
            "photo #{} does not exist ({} photo(s))",
            n,
            photos.len()
        )));
    }
    photos
        .iter()
        .position(|p| p.path == which || p.path.ends_with(&format!("/{}", which)))
        .ok_or_else(|| RoofDeskError::Validation(format!("no photo matches '{}'", which)))
}

/// Delete a packet with its photos and signature
pub async fn delete_packet(portal: &Portal, id: &str) -> Result<Packet> {
    let packet: Packet = portal.find(id).await?;
    let mut paths: Vec<String> = packet.photos.iter().map(|p| p.path.clone()).collect();
    paths.extend(packet.signature.iter().map(|s| s.path.clone()));
    portal.delete::<Packet>(&packet.id).await?;
    portal.objects().remove(&paths).await?;
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1234").unwrap(), 123_400);
        assert_eq!(parse_amount("$1,234.5").unwrap(), 123_450);
        assert_eq!(parse_amount("0.07").unwrap(), 7);
        assert!(parse_amount("12.345").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount(".50").is_err());
        assert!(parse_amount("-5").is_err());
    }

    #[test]
    fn test_photo_index() {
        let photos = vec![
            PacketPhoto { path: "packets/p1/aaa.jpg".into(), caption: String::new() },
            PacketPhoto { path: "packets/p1/bbb.jpg".into(), caption: String::new() },
        ];
        assert_eq!(photo_index(&photos, "2").unwrap(), 1);
        assert_eq!(photo_index(&photos, "aaa.jpg").unwrap(), 0);
        assert!(photo_index(&photos, "0").is_err());
        assert!(photo_index(&photos, "3").is_err());
        assert!(photo_index(&photos, "zzz.jpg").is_err());
    }

    #[test]
    fn test_status_transitions() {
        let mut packet = Packet::new("c1", "Roof replacement");
        assert!(check_transition(&packet, PacketStatus::Sent).is_ok());
        assert!(check_transition(&packet, PacketStatus::Signed).is_err());

        packet.signature = Some(roofdesk_common::Signature {
            signer_name: "Ann".into(),
            path: "packets/p/signature.png".into(),
            signed_at: Utc::now(),
        });
        assert!(check_transition(&packet, PacketStatus::Declined).is_err());
    }
}
