use serde::{Deserialize, Serialize};

/// One site in the portfolio roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub site_id: String,
    pub name: String,
    pub domain: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Ordered roster of sites included in portfolio-wide aggregation.
    /// Injected rather than compiled in so deployments and tests can swap it.
    pub sites: Vec<SiteInfo>,
    /// Upper bound on concurrent per-site fetches in the combiner.
    pub combine_concurrency: usize,
    /// Whether the midnight aggregation loop should run.
    pub scheduler_enabled: bool,
}

/// Parse a roster string of `site_id:name:domain` triplets, comma-separated.
///
/// Example: `greplus:GRE Plus:greplus.com,aihref:AIHref:aihref.com`
pub fn parse_roster(raw: &str) -> Result<Vec<SiteInfo>, String> {
    let mut sites = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = entry.splitn(3, ':');
        let (Some(site_id), Some(name), Some(domain)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!(
                "invalid roster entry {entry:?}: expected site_id:name:domain"
            ));
        };
        if site_id.is_empty() || domain.is_empty() {
            return Err(format!("invalid roster entry {entry:?}: empty field"));
        }
        sites.push(SiteInfo {
            site_id: site_id.to_string(),
            name: name.to_string(),
            domain: domain.to_string(),
        });
    }
    Ok(sites)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            sites: match std::env::var("PAGEPULSE_SITES") {
                Ok(raw) => parse_roster(&raw)?,
                Err(_) => Vec::new(),
            },
            combine_concurrency: std::env::var("PAGEPULSE_COMBINE_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .map(|v| v.clamp(1, 16))
                .unwrap_or(4),
            scheduler_enabled: std::env::var("PAGEPULSE_SCHEDULER")
                .map(|v| v != "off")
                .unwrap_or(true),
        })
    }
}
