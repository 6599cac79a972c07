//! Normalizer - raw items to canonical Intel Records
//!
//! Each category gets explicit field validation and a confidence prior
//! reflecting source reliability. The natural key feeding the record id is
//! category-specific: article URL, scene id, CVE id, or a position-report
//! key bucketed by hour so a slow-moving track does not spawn a record per
//! ping. Threat fields stay unscored - the scorer owns them.

use chrono::Utc;

use argus_core::{GeoPoint, IntelCategory, IntelRecord, ValidationError};

use crate::RawItem;

/// Per-category confidence priors: official feeds near the top, scraped
/// social chatter near the bottom.
pub fn confidence_prior(category: IntelCategory) -> f64 {
    match category {
        IntelCategory::Cyber => 0.9,
        IntelCategory::Imagery => 0.85,
        IntelCategory::AirTrack => 0.8,
        IntelCategory::MaritimeTrack => 0.75,
        IntelCategory::News => 0.6,
        IntelCategory::Social => 0.4,
    }
}

/// Map a raw item into a canonical record, or reject it.
///
/// Rejected items are dropped from the sweep and counted by the caller,
/// never silently lost.
pub fn normalize(raw: &RawItem, keyword: Option<&str>) -> Result<IntelRecord, ValidationError> {
    let mut record = match raw {
        RawItem::News {
            url,
            title,
            body,
            source,
            country,
        } => {
            require("news", "url", url)?;
            require("news", "title", title)?;
            let summary = if body.is_empty() {
                title.clone()
            } else {
                format!("{title}. {}", truncate(body, 280))
            };
            let mut record = IntelRecord::new(
                IntelCategory::News,
                url,
                summary,
                confidence_prior(IntelCategory::News),
            )
            .with_raw_ref(url);
            if let Some(source) = source {
                record = record.with_source_name(source);
            }
            if let Some(country) = country {
                record = record.with_country(country);
            }
            record
        }

        RawItem::Social {
            url,
            text,
            author,
            platform,
            country,
        } => {
            require("social", "url", url)?;
            require("social", "text", text)?;
            let summary = match author {
                Some(author) => format!("{author}: {}", truncate(text, 280)),
                None => truncate(text, 280),
            };
            let mut record = IntelRecord::new(
                IntelCategory::Social,
                url,
                summary,
                confidence_prior(IntelCategory::Social),
            )
            .with_raw_ref(url);
            if let Some(platform) = platform {
                record = record.with_source_name(platform);
            }
            if let Some(country) = country {
                record = record.with_country(country);
            }
            record
        }

        RawItem::Imagery {
            scene_id,
            location,
            lat,
            lon,
            cloud_cover,
            captured_at,
        } => {
            require("imagery", "scene_id", scene_id)?;
            require("imagery", "location", location)?;
            let point = geolocate("imagery", *lat, *lon)?;
            let cloud = cloud_cover
                .map(|c| format!(", {c:.0}% cloud"))
                .unwrap_or_default();
            let captured = captured_at
                .map(|t| format!(" captured {}", t.format("%Y-%m-%d")))
                .unwrap_or_default();
            IntelRecord::new(
                IntelCategory::Imagery,
                scene_id,
                format!("Satellite scene over {location}{captured}{cloud}"),
                confidence_prior(IntelCategory::Imagery),
            )
            .with_coordinates(point)
            .with_country(location)
            .with_raw_ref(scene_id)
        }

        RawItem::AirTrack {
            icao24,
            callsign,
            origin_country,
            lat,
            lon,
            altitude_m,
            note,
        } => {
            let key = icao24
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .or(callsign.as_deref().filter(|s| !s.trim().is_empty()))
                .ok_or(ValidationError::MissingField {
                    category: "air_track",
                    field: "icao24 or callsign",
                })?;
            let point = geolocate("air_track", *lat, *lon)?;
            let label = match (callsign, note) {
                (_, Some(note)) => note.clone(),
                (Some(callsign), None) => format!("Military aircraft {}", callsign.trim()),
                (None, None) => format!("Aircraft {key}"),
            };
            let altitude = altitude_m
                .map(|a| format!(" at {a:.0} m"))
                .unwrap_or_default();
            let country_part = origin_country
                .as_deref()
                .map(|c| format!(" ({c})"))
                .unwrap_or_default();
            let mut record = IntelRecord::new(
                IntelCategory::AirTrack,
                &track_key(key),
                format!("{label}{country_part} tracked{altitude}"),
                confidence_prior(IntelCategory::AirTrack),
            )
            .with_coordinates(point)
            .with_raw_ref(key);
            if let Some(country) = origin_country {
                record = record.with_country(country);
            }
            record
        }

        RawItem::MaritimeTrack {
            mmsi,
            name,
            ship_type,
            flag,
            lat,
            lon,
        } => {
            let key = mmsi
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .or(name.as_deref().filter(|s| !s.trim().is_empty()))
                .ok_or(ValidationError::MissingField {
                    category: "maritime_track",
                    field: "mmsi or name",
                })?;
            let vessel = name.as_deref().unwrap_or(key);
            let kind = ship_type
                .as_deref()
                .map(|t| format!(" ({t})"))
                .unwrap_or_default();
            let position = match (lat, lon) {
                (Some(lat), Some(lon)) => {
                    let point = GeoPoint::new(*lat, *lon);
                    if !point.is_valid() {
                        return Err(ValidationError::BadCoordinates { lat: *lat, lon: *lon });
                    }
                    Some(point)
                }
                _ => None,
            };
            let mut record = IntelRecord::new(
                IntelCategory::MaritimeTrack,
                &track_key(key),
                format!("Vessel {vessel}{kind} underway"),
                confidence_prior(IntelCategory::MaritimeTrack),
            )
            .with_raw_ref(key);
            if let Some(point) = position {
                record = record.with_coordinates(point);
            }
            if let Some(flag) = flag {
                record = record.with_country(flag);
            }
            record
        }

        RawItem::Cyber {
            cve_id,
            malware,
            title,
            description,
            vendor,
        } => {
            let key = cve_id
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .or(malware.as_deref().filter(|s| !s.trim().is_empty()))
                .ok_or(ValidationError::MissingField {
                    category: "cyber",
                    field: "cve_id or malware",
                })?;
            require("cyber", "title", title)?;
            let summary = if description.is_empty() {
                title.clone()
            } else {
                format!("{title} - {}", truncate(description, 280))
            };
            let mut record = IntelRecord::new(
                IntelCategory::Cyber,
                key,
                summary,
                confidence_prior(IntelCategory::Cyber),
            )
            .with_country("Global")
            .with_raw_ref(key);
            if let Some(vendor) = vendor {
                record = record.with_source_name(vendor);
            }
            record
        }
    };

    if let Some(keyword) = keyword {
        record = record.with_keyword(keyword);
    }
    Ok(record)
}

fn require(
    category: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { category, field });
    }
    Ok(())
}

/// Imagery and air tracks mandate a resolvable position
fn geolocate(
    category: &'static str,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<GeoPoint, ValidationError> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            let point = GeoPoint::new(lat, lon);
            if !point.is_valid() {
                return Err(ValidationError::BadCoordinates { lat, lon });
            }
            Ok(point)
        }
        _ => Err(ValidationError::Unresolvable { category }),
    }
}

/// Position reports bucket by hour so re-sweeps within the hour dedup
fn track_key(key: &str) -> String {
    format!("{}-{}", key.trim().to_lowercase(), Utc::now().format("%Y%m%d%H"))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}
