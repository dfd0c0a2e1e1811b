//! Structured scaffolding around the natural-language insight backend.
//!
//! The language model itself is a black box behind [`InsightBackend`]:
//! it receives the metrics scope and a free-form question and returns
//! free text. Everything deterministic — building the metric digest,
//! sectioning the returned prose, and the error fallback — lives here
//! where it can be tested without a model.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use pagepulse_core::combine::CombinedMetrics;
use pagepulse_core::metrics::RangeMetrics;

/// Which metrics feed the insight request: one site's, or the whole
/// portfolio's. A tagged union rather than runtime type inspection so the
/// downstream formatting step can match exhaustively.
#[derive(Debug, Clone)]
pub enum InsightScope {
    SiteScoped(RangeMetrics),
    Portfolio(CombinedMetrics),
}

impl InsightScope {
    pub fn site_id(&self) -> Option<&str> {
        match self {
            Self::SiteScoped(metrics) => Some(&metrics.site_id),
            Self::Portfolio(_) => None,
        }
    }

    pub fn range(&self) -> &str {
        match self {
            Self::SiteScoped(metrics) => &metrics.range,
            Self::Portfolio(combined) => &combined.range,
        }
    }

    /// Headline numbers included verbatim in the insight response, so
    /// clients can render figures without re-querying.
    pub fn metrics_digest(&self) -> serde_json::Value {
        match self {
            Self::SiteScoped(m) => json!({
                "totalVisitorsTillDate": m.total_visitors_till_date,
                "todayVisitors": m.today_visitors,
                "thisWeekVisitors": m.this_week_visitors,
                "thisMonthVisitors": m.this_month_visitors,
                "repeatVisitorsToday": m.repeat_visitors_today,
            }),
            Self::Portfolio(c) => json!({
                "totalVisitors": c.total_visitors,
                "totalTodayVisitors": c.total_today_visitors,
                "totalWeekVisitors": c.total_week_visitors,
                "totalMonthVisitors": c.total_month_visitors,
                "totalRepeatVisitors": c.total_repeat_visitors,
                "totalSites": c.sites.len(),
            }),
        }
    }
}

/// The text generator. Implementations call out to whatever model the
/// deployment uses; the engine never sees more than this signature.
#[async_trait]
pub trait InsightBackend: Send + Sync + 'static {
    async fn generate(&self, scope: &InsightScope, query: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    pub site_id: Option<String>,
    pub range: String,
    pub generated_at: String,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub trends: Vec<String>,
    pub predictions: Vec<String>,
    pub recommendations: Vec<String>,
    pub metrics: serde_json::Value,
}

#[derive(Debug, Default, PartialEq)]
pub struct Sections {
    pub summary: String,
    pub key_insights: Vec<String>,
    pub trends: Vec<String>,
    pub predictions: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Split model prose into labeled sections by paragraph keywords.
///
/// Paragraphs that match no keyword land in key insights; if nothing at
/// all was classified, the whole text becomes the summary.
pub fn section_response(text: &str) -> Sections {
    let mut sections = Sections::default();
    let mut summary_parts: Vec<&str> = Vec::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let lower = paragraph.to_lowercase();
        if lower.contains("summary") || lower.contains("overview") {
            summary_parts.push(paragraph);
        } else if lower.contains("insight") || lower.contains("key finding") {
            sections.key_insights.push(paragraph.to_string());
        } else if lower.contains("trend") || lower.contains("pattern") {
            sections.trends.push(paragraph.to_string());
        } else if lower.contains("prediction") || lower.contains("forecast") {
            sections.predictions.push(paragraph.to_string());
        } else if lower.contains("recommendation") || lower.contains("suggestion") {
            sections.recommendations.push(paragraph.to_string());
        } else {
            sections.key_insights.push(paragraph.to_string());
        }
    }

    sections.summary = summary_parts.join("\n");
    if sections.summary.is_empty() && sections.key_insights.is_empty() {
        sections.summary = text.trim().to_string();
    }
    sections
}

/// Ask the backend about `scope` and structure its answer.
///
/// A backend failure does not propagate: clients always receive a report
/// in the usual shape, with an apologetic summary when generation failed.
pub async fn generate_insights(
    backend: &dyn InsightBackend,
    scope: &InsightScope,
    query: &str,
) -> InsightReport {
    let base = InsightReport {
        site_id: scope.site_id().map(str::to_string),
        range: scope.range().to_string(),
        generated_at: Utc::now().to_rfc3339(),
        summary: String::new(),
        key_insights: Vec::new(),
        trends: Vec::new(),
        predictions: Vec::new(),
        recommendations: Vec::new(),
        metrics: scope.metrics_digest(),
    };

    match backend.generate(scope, query).await {
        Ok(text) => {
            let sections = section_response(&text);
            InsightReport {
                summary: sections.summary,
                key_insights: sections.key_insights,
                trends: sections.trends,
                predictions: sections.predictions,
                recommendations: sections.recommendations,
                ..base
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "insight backend failed");
            InsightReport {
                summary: "Error generating insights. Please try again later.".to_string(),
                key_insights: vec!["Unable to generate insights at this time".to_string()],
                ..base
            }
        }
    }
}
