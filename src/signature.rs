//! Packet signing
//!
//! 署名パッドの出力（Data URL）または PNG/JPEG ファイルを受け付け、
//! 画像としてデコードできることを確認してから保存する。

use crate::error::{Result, RoofDeskError};
use crate::media::image_dimensions;
use crate::repo::Portal;
use crate::store::{content_type_for, object_path};
use base64::Engine;
use chrono::Utc;
use image::ImageFormat;
use roofdesk_common::{Packet, PacketStatus, Signature};
use std::path::Path;
use tracing::info;

/// Where the signature image comes from
#[derive(Debug, Clone)]
pub enum SignatureSource<'a> {
    File(&'a Path),
    DataUrl(&'a str),
}

impl<'a> SignatureSource<'a> {
    /// Treat `data:` strings as data URLs, anything else as a path
    pub fn detect(input: &'a str) -> Self {
        if input.trim_start().starts_with("data:") {
            SignatureSource::DataUrl(input.trim())
        } else {
            SignatureSource::File(Path::new(input))
        }
    }
}

/// Data URLからBase64データ部分を抽出
pub fn extract_base64_from_data_url(data_url: &str) -> Option<&str> {
    let (header, data) = data_url.split_once(',')?;
    header.ends_with(";base64").then_some(data)
}

/// Data URLからMIMEタイプを抽出
pub fn extract_mime_type_from_data_url(data_url: &str) -> Option<&str> {
    data_url
        .strip_prefix("data:")
        .and_then(|s| s.split([';', ',']).next())
        .filter(|m| !m.is_empty())
}

/// Decoded signature image with its extension ("png" or "jpg")
#[derive(Debug, Clone)]
pub struct SignatureImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

pub fn load_signature(source: &SignatureSource<'_>) -> Result<SignatureImage> {
    let bytes = match source {
        SignatureSource::File(path) => {
            if !path.is_file() {
                return Err(RoofDeskError::FileNotFound(path.display().to_string()));
            }
            std::fs::read(path)?
        }
        SignatureSource::DataUrl(url) => {
            let mime = extract_mime_type_from_data_url(url).unwrap_or_default();
            if !mime.starts_with("image/") {
                return Err(RoofDeskError::Validation(format!(
                    "signature data URL must be an image, got '{}'",
                    mime
                )));
            }
            let data = extract_base64_from_data_url(url).ok_or_else(|| {
                RoofDeskError::Validation("signature data URL is not base64".into())
            })?;
            base64::engine::general_purpose::STANDARD
                .decode(data.trim())
                .map_err(|e| RoofDeskError::Validation(format!("invalid base64 signature: {}", e)))?
        }
    };
    validate_signature(bytes)
}

/// Must be a PNG or JPEG that decodes to a non-empty image
pub fn validate_signature(bytes: Vec<u8>) -> Result<SignatureImage> {
    if bytes.is_empty() {
        return Err(RoofDeskError::Validation("signature is empty".into()));
    }
    let extension = match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        _ => {
            return Err(RoofDeskError::Validation(
                "signature must be a PNG or JPEG image".into(),
            ))
        }
    };
    image_dimensions(&bytes)?;
    Ok(SignatureImage { bytes, extension })
}

/// Sign a packet. An existing signature is only replaced with `force`.
pub async fn sign_packet(
    portal: &Portal,
    packet_id: &str,
    signer_name: &str,
    source: SignatureSource<'_>,
    force: bool,
) -> Result<Packet> {
    let mut packet: Packet = portal.find(packet_id).await?;
    if packet.is_signed() && !force {
        return Err(RoofDeskError::Validation(format!(
            "packet '{}' is already signed; use --force to replace the signature",
            packet.title
        )));
    }
    let signer_name = signer_name.trim();
    if signer_name.is_empty() {
        return Err(RoofDeskError::Validation("signer name is required".into()));
    }

    let image = load_signature(&source)?;
    let path = object_path(&["packets", &packet.id, &format!("signature.{}", image.extension)]);

    // 拡張子が変わる再署名では古い画像が残らないようにする
    let stale: Vec<String> = packet
        .signature
        .iter()
        .map(|s| s.path.clone())
        .filter(|p| *p != path)
        .collect();

    portal
        .objects()
        .upload(&path, image.bytes, content_type_for(image.extension))
        .await?;

    let now = Utc::now();
    packet.signature = Some(Signature {
        signer_name: signer_name.to_string(),
        path,
        signed_at: now,
    });
    packet.status = PacketStatus::Signed;
    packet.updated_at = now;
    let saved = portal.save(&packet).await?;

    if !stale.is_empty() {
        portal.objects().remove(&stale).await?;
    }
    info!(id = %saved.id, signer = signer_name, "packet signed");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::encode_png;
    use image::{DynamicImage, RgbImage};

    fn png_data_url() -> String {
        let png = encode_png(&DynamicImage::ImageRgb8(RgbImage::new(4, 2))).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        )
    }

    #[test]
    fn test_data_url_parts() {
        let url = "data:image/jpeg;base64,/9j/4AAQ";
        assert_eq!(extract_base64_from_data_url(url), Some("/9j/4AAQ"));
        assert_eq!(extract_mime_type_from_data_url(url), Some("image/jpeg"));
        assert_eq!(extract_base64_from_data_url("data:text/plain,hello"), None);
        assert_eq!(extract_mime_type_from_data_url("nope"), None);
    }

    #[test]
    fn test_detect_source() {
        assert!(matches!(SignatureSource::detect(" data:image/png;base64,AA"), SignatureSource::DataUrl(_)));
        assert!(matches!(SignatureSource::detect("sig.png"), SignatureSource::File(_)));
    }

    #[test]
    fn test_load_valid_data_url() {
        let url = png_data_url();
        let image = load_signature(&SignatureSource::DataUrl(&url)).unwrap();
        assert_eq!(image.extension, "png");
    }

    #[test]
    fn test_rejects_non_image_payloads() {
        let text = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(b"hello")
        );
        assert!(load_signature(&SignatureSource::DataUrl(&text)).is_err());
        assert!(load_signature(&SignatureSource::DataUrl("data:text/plain;base64,aGk=")).is_err());
        assert!(load_signature(&SignatureSource::DataUrl("data:image/png;base64,***")).is_err());
        assert!(validate_signature(Vec::new()).is_err());
    }

    #[test]
    fn test_truncated_png_rejected() {
        let png = encode_png(&DynamicImage::ImageRgb8(RgbImage::new(4, 2))).unwrap();
        assert!(validate_signature(png[..20].to_vec()).is_err());
    }
}
