//! Ingestion payload normalization.
//!
//! Turns the wire payload into a stored [`RawEvent`]. Geo resolution is an
//! external concern — the caller passes the already-resolved country/city
//! in — but identifier assignment, referrer cleanup, and the `"Unknown"`
//! country default all happen here so events enter the store in exactly one
//! shape.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::event::RawEvent;

/// The payload a tracked site submits for one visit action.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub site_id: String,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Client-side visitor id, if the tracker kept one. Absent on first
    /// visits with empty storage; the server derives one then.
    pub anon_id: Option<String>,
    pub url: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Derive a pseudonymous visitor id from IP and User-Agent.
///
/// Formula: `hex(sha256(day_epoch + ip + user_agent))[..16]`. The day epoch
/// rotates at midnight UTC, so derived ids cannot be correlated across
/// days. Ids the client already holds are reused as-is and never
/// recalculated, so rotation does not split in-progress visits.
pub fn compute_anon_id(ip: &str, user_agent: &str) -> String {
    let day_epoch = Utc::now().timestamp() / 86_400;
    let input = format!("{}{}{}", day_epoch, ip, user_agent);
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..8])
}

/// Reduce a full referrer URL to its source domain, lowercased.
///
/// Returns `None` for empty or unparseable referrers — those visits count
/// as direct traffic.
pub fn extract_source(referrer: &str) -> Option<String> {
    if referrer.is_empty() {
        return None;
    }
    let stripped = referrer
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let domain = stripped.split('/').next()?;
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_lowercase())
    }
}

/// Normalize a payload into the stored event shape.
///
/// `client_ip` is only used for the anon-id fallback and is not retained.
pub fn normalize_event(
    payload: EventPayload,
    client_ip: &str,
    country: Option<String>,
    city: Option<String>,
) -> RawEvent {
    let user_agent = payload.user_agent.unwrap_or_default();
    let anon_id = match payload.anon_id {
        Some(id) if !id.is_empty() => id,
        _ => compute_anon_id(client_ip, &user_agent),
    };
    RawEvent {
        id: uuid::Uuid::new_v4().to_string(),
        site_id: payload.site_id,
        event_type: payload.event_type,
        anon_id,
        url: payload.url,
        referrer: payload.referrer.as_deref().and_then(extract_source),
        user_agent,
        timestamp: payload.timestamp,
        country: country.unwrap_or_else(|| "Unknown".to_string()),
        city,
    }
}
