//! Aggregate analytics over stored generation records

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const TOP_STYLES: usize = 5;
const RECENT_ACTIVITY: usize = 10;

/// Reporting window selected by the `period` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl Period {
    /// Unknown or missing values fall back to 24 hours
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1h") => Period::Hour,
            Some("7d") => Period::Week,
            Some("30d") => Period::Month,
            _ => Period::Day,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Hour => "1h",
            Period::Day => "24h",
            Period::Week => "7d",
            Period::Month => "30d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Period::Hour => Duration::hours(1),
            Period::Day => Duration::hours(24),
            Period::Week => Duration::days(7),
            Period::Month => Duration::days(30),
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

/// A stored record as read back; older rows may lack any column
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogRow {
    pub client_ip: Option<String>,
    pub request_type: Option<String>,
    pub ingredients_count: Option<i64>,
    pub style_id: Option<String>,
    pub response_time_ms: Option<u64>,
    pub success: Option<bool>,
    pub error_message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleCount {
    pub style: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub success: bool,
    pub style: Option<String>,
    pub response_time: Option<u64>,
    pub ingredients_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub period: String,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub success_rate: String,
    pub average_response_time: String,
    pub popular_styles: Vec<StyleCount>,
    pub request_types: BTreeMap<String, usize>,
    pub recent_activity: Vec<ActivityEntry>,
}

impl AnalyticsReport {
    pub fn build(period: Period, rows: &[LogRow]) -> Self {
        let total = rows.len();
        let successful = rows.iter().filter(|r| r.success.unwrap_or(false)).count();

        let success_rate = if total > 0 {
            format!("{:.2}%", successful as f64 * 100.0 / total as f64)
        } else {
            "0%".to_string()
        };

        let average_ms = if total > 0 {
            let sum: u64 = rows.iter().filter_map(|r| r.response_time_ms).sum();
            (sum as f64 / total as f64).round() as u64
        } else {
            0
        };

        let mut styles: HashMap<&str, usize> = HashMap::new();
        let mut request_types = BTreeMap::new();
        for row in rows {
            *styles
                .entry(row.style_id.as_deref().unwrap_or("unknown"))
                .or_default() += 1;
            *request_types
                .entry(row.request_type.clone().unwrap_or_else(|| "unknown".to_string()))
                .or_default() += 1;
        }

        let mut popular_styles: Vec<StyleCount> = styles
            .into_iter()
            .map(|(style, count)| StyleCount {
                style: style.to_string(),
                count,
            })
            .collect();
        // Ties broken by name so the order is stable
        popular_styles.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.style.cmp(&b.style)));
        popular_styles.truncate(TOP_STYLES);

        let mut recent: Vec<&LogRow> = rows.iter().collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let recent_activity = recent
            .into_iter()
            .take(RECENT_ACTIVITY)
            .map(|row| ActivityEntry {
                timestamp: row.timestamp,
                success: row.success.unwrap_or(false),
                style: row.style_id.clone(),
                response_time: row.response_time_ms,
                ingredients_count: row.ingredients_count,
            })
            .collect();

        Self {
            period: period.as_str().to_string(),
            total_requests: total,
            successful_requests: successful,
            failed_requests: total - successful,
            success_rate,
            average_response_time: format!("{}ms", average_ms),
            popular_styles,
            request_types,
            recent_activity,
        }
    }
}
