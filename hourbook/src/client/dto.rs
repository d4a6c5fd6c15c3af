use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::{
    ComparisonStat, DailySnapshot, HourlyRecord, MetricField, RecordId, Screen, ScopeFilter,
    StorageHour,
};
use crate::ports::BackendError;

#[derive(Debug, Deserialize)]
pub struct ComparisonStatDto {
    pub period: String,
    pub change: Option<f64>,
}

impl From<ComparisonStatDto> for ComparisonStat {
    fn from(dto: ComparisonStatDto) -> Self {
        Self {
            period: dto.period,
            change_percent: dto.change,
        }
    }
}

fn comparison(stats: Vec<ComparisonStatDto>) -> Vec<ComparisonStat> {
    stats.into_iter().map(ComparisonStat::from).collect()
}

/// Builds one hourly record. Aggregate scopes never expose a record id.
fn hourly_record(
    hour: &str,
    editable_id: Option<i64>,
    scope: &ScopeFilter,
    metrics: &[(MetricField, f64)],
) -> Result<HourlyRecord, BackendError> {
    let hour: StorageHour = hour
        .parse()
        .map_err(|e| BackendError::Parse(format!("{e}")))?;
    let editable_id = if scope.is_aggregate() {
        None
    } else {
        editable_id.map(RecordId::new)
    };
    Ok(HourlyRecord {
        hour,
        metrics: metrics.iter().copied().collect(),
        editable_id,
    })
}

fn snapshot(
    screen: Screen,
    date: NaiveDate,
    scope: &ScopeFilter,
    records: Vec<HourlyRecord>,
) -> Result<DailySnapshot, BackendError> {
    DailySnapshot::new(screen, date, scope.clone(), records)
        .map_err(|e| BackendError::Parse(e.to_string()))
}

// Customer flow

#[derive(Debug, Deserialize)]
pub struct FlowDataResponse {
    #[serde(default)]
    pub data: BTreeMap<String, FlowDayDto>,
    #[serde(default)]
    pub comparison_stats: Option<FlowComparisonDto>,
    #[serde(default)]
    pub all_cameras: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlowDayDto {
    pub summary: FlowSummaryDto,
    #[serde(default)]
    pub hourly_data: BTreeMap<String, FlowHourDto>,
}

#[derive(Debug, Deserialize)]
pub struct FlowSummaryDto {
    pub total_entered: f64,
    pub total_exited: f64,
}

#[derive(Debug, Deserialize)]
pub struct FlowHourDto {
    #[serde(default)]
    pub entered: f64,
    #[serde(default)]
    pub exited: f64,
    pub editable_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FlowComparisonDto {
    #[serde(default)]
    pub entered: Vec<ComparisonStatDto>,
    #[serde(default)]
    pub exited: Vec<ComparisonStatDto>,
}

impl FlowDataResponse {
    /// Picks the requested day out of the date-keyed payload. A missing day is an empty snapshot.
    pub fn into_snapshot(
        mut self,
        date: NaiveDate,
        scope: &ScopeFilter,
    ) -> Result<DailySnapshot, BackendError> {
        let key = date.format("%Y-%m-%d").to_string();
        let Some(day) = self.data.remove(&key) else {
            let mut empty = DailySnapshot::empty(Screen::CustomerFlow, date, scope.clone());
            empty.available_scopes = self.all_cameras;
            return Ok(empty);
        };

        let records = day
            .hourly_data
            .iter()
            .map(|(hour, row)| {
                hourly_record(
                    hour,
                    row.editable_id,
                    scope,
                    &[
                        (MetricField::Entered, row.entered),
                        (MetricField::Exited, row.exited),
                    ],
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut snapshot = snapshot(Screen::CustomerFlow, date, scope, records)?;
        snapshot
            .overall_stats
            .insert(MetricField::Entered, day.summary.total_entered);
        snapshot
            .overall_stats
            .insert(MetricField::Exited, day.summary.total_exited);
        if let Some(stats) = self.comparison_stats {
            snapshot
                .comparison_stats
                .insert(MetricField::Entered, comparison(stats.entered));
            snapshot
                .comparison_stats
                .insert(MetricField::Exited, comparison(stats.exited));
        }
        snapshot.available_scopes = self.all_cameras;
        Ok(snapshot)
    }
}

// Heatmaps

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapSummaryResponse {
    pub overall_stats: HeatmapOverallDto,
    #[serde(default)]
    pub hourly_summary: Vec<HeatmapHourDto>,
    #[serde(default)]
    pub all_zones: Vec<String>,
    #[serde(default)]
    pub comparison_stats: Option<HeatmapComparisonDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapOverallDto {
    pub total_visitors: f64,
    pub avg_dwell_time: f64,
    pub busiest_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapHourDto {
    pub hour: String,
    #[serde(default)]
    pub total_visitors: f64,
    #[serde(default)]
    pub avg_dwell_time: f64,
    #[serde(rename = "editable_id")]
    pub editable_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapComparisonDto {
    #[serde(default)]
    pub total_visitors: Vec<ComparisonStatDto>,
}

impl HeatmapSummaryResponse {
    pub fn into_snapshot(
        self,
        date: NaiveDate,
        scope: &ScopeFilter,
    ) -> Result<DailySnapshot, BackendError> {
        let records = self
            .hourly_summary
            .iter()
            .map(|row| {
                hourly_record(
                    &row.hour,
                    row.editable_id,
                    scope,
                    &[
                        (MetricField::TotalVisitors, row.total_visitors),
                        (MetricField::AvgDwellTime, row.avg_dwell_time),
                    ],
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut snapshot = snapshot(Screen::Heatmap, date, scope, records)?;
        snapshot
            .overall_stats
            .insert(MetricField::TotalVisitors, self.overall_stats.total_visitors);
        snapshot
            .overall_stats
            .insert(MetricField::AvgDwellTime, self.overall_stats.avg_dwell_time);
        // the endpoint reports "N/A" when there were no visitors
        snapshot.busiest_zone = self
            .overall_stats
            .busiest_zone
            .filter(|zone| !zone.is_empty() && zone != "N/A");
        if let Some(stats) = self.comparison_stats {
            snapshot
                .comparison_stats
                .insert(MetricField::TotalVisitors, comparison(stats.total_visitors));
        }
        snapshot.available_scopes = self.all_zones;
        Ok(snapshot)
    }
}

// Queues

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummaryResponse {
    pub overall_stats: QueueOverallDto,
    #[serde(default)]
    pub hourly_summary: Vec<QueueHourDto>,
    #[serde(default)]
    pub all_cashiers: Vec<String>,
    #[serde(default)]
    pub available_cashiers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOverallDto {
    pub total_customers: f64,
    pub avg_wait_time: f64,
    #[serde(default)]
    pub max_wait_time: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueHourDto {
    pub hour: String,
    #[serde(default)]
    pub total_customers: f64,
    #[serde(default)]
    pub avg_wait_time: f64,
    #[serde(default)]
    pub min_wait_time: f64,
    #[serde(default)]
    pub max_wait_time: f64,
    #[serde(rename = "editable_id")]
    pub editable_id: Option<i64>,
}

impl QueueSummaryResponse {
    pub fn into_snapshot(
        self,
        date: NaiveDate,
        scope: &ScopeFilter,
    ) -> Result<DailySnapshot, BackendError> {
        let records = self
            .hourly_summary
            .iter()
            .map(|row| {
                hourly_record(
                    &row.hour,
                    row.editable_id,
                    scope,
                    &[
                        (MetricField::TotalCustomers, row.total_customers),
                        (MetricField::AvgWaitTime, row.avg_wait_time),
                        (MetricField::MinWaitTime, row.min_wait_time),
                        (MetricField::MaxWaitTime, row.max_wait_time),
                    ],
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut snapshot = snapshot(Screen::Queue, date, scope, records)?;
        let overall = &self.overall_stats;
        snapshot
            .overall_stats
            .insert(MetricField::TotalCustomers, overall.total_customers);
        snapshot
            .overall_stats
            .insert(MetricField::AvgWaitTime, overall.avg_wait_time);
        snapshot
            .overall_stats
            .insert(MetricField::MaxWaitTime, overall.max_wait_time);
        snapshot.available_scopes = self.available_cashiers.unwrap_or(self.all_cashiers);
        Ok(snapshot)
    }
}

/// Error body shape used by the analytics endpoints.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
    }

    fn hour(h: u8) -> StorageHour {
        StorageHour::new(h).unwrap()
    }

    #[test]
    fn flow_payload_picks_requested_day() {
        let body = json!({
            "data": {
                "2024-05-14": {
                    "summary": { "total_entered": 14, "total_exited": 6 },
                    "hourly_data": {
                        "07:00": { "entered": 10, "exited": 4, "editable_id": 70 },
                        "08:00": { "entered": 4, "exited": 2, "editable_id": null }
                    }
                },
                "2024-05-13": {
                    "summary": { "total_entered": 1, "total_exited": 1 },
                    "hourly_data": {}
                }
            },
            "comparison_stats": {
                "entered": [{ "period": "yesterday", "change": 12.5 }],
                "exited": [{ "period": "yesterday", "change": null }]
            }
        });
        let dto: FlowDataResponse = serde_json::from_value(body).unwrap();
        let snapshot = dto
            .into_snapshot(date(), &ScopeFilter::entity("cam-1"))
            .unwrap();

        assert_eq!(snapshot.records().len(), 2);
        let first = snapshot.record(hour(7)).unwrap();
        assert_eq!(first.value(MetricField::Entered), Some(10.0));
        assert_eq!(first.editable_id, Some(RecordId::new(70)));
        assert_eq!(snapshot.record(hour(8)).unwrap().editable_id, None);
        assert_eq!(snapshot.overall_stats[&MetricField::Entered], 14.0);
        assert_eq!(
            snapshot.comparison_stats[&MetricField::Exited][0].change_percent,
            None
        );
    }

    #[test]
    fn flow_payload_without_the_day_is_empty() {
        let dto: FlowDataResponse = serde_json::from_value(json!({ "data": {} })).unwrap();
        let snapshot = dto.into_snapshot(date(), &ScopeFilter::All).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn aggregate_scope_drops_record_ids() {
        let body = json!({
            "overallStats": { "totalVisitors": 30, "avgDwellTime": 41.5, "busiestZone": "N/A" },
            "hourlySummary": [
                { "hour": "10:00", "totalVisitors": 30, "avgDwellTime": 41.5, "editable_id": 5 }
            ],
            "allZones": ["entrance"],
            "comparisonStats": { "totalVisitors": [] }
        });
        let dto: HeatmapSummaryResponse = serde_json::from_value(body).unwrap();
        let snapshot = dto.into_snapshot(date(), &ScopeFilter::All).unwrap();

        assert_eq!(snapshot.record(hour(10)).unwrap().editable_id, None);
        assert_eq!(snapshot.busiest_zone, None);
        assert_eq!(snapshot.available_scopes, vec!["entrance"]);
    }

    #[test]
    fn queue_payload_parses_unpadded_hours() {
        let body = json!({
            "overallStats": { "totalCustomers": 12, "avgWaitTime": 50.2, "maxWaitTime": 180 },
            "hourlySummary": [
                {
                    "hour": "9:00",
                    "totalCustomers": 12,
                    "avgWaitTime": 50.2,
                    "minWaitTime": 10,
                    "maxWaitTime": 180,
                    "editable_id": 901
                }
            ],
            "allCashiers": ["k1", "k2"]
        });
        let dto: QueueSummaryResponse = serde_json::from_value(body).unwrap();
        let snapshot = dto
            .into_snapshot(date(), &ScopeFilter::entity("k1"))
            .unwrap();

        let record = snapshot.record(hour(9)).unwrap();
        assert_eq!(record.value(MetricField::AvgWaitTime), Some(50.2));
        assert_eq!(record.value(MetricField::MaxWaitTime), Some(180.0));
        assert_eq!(record.editable_id, Some(RecordId::new(901)));
        assert_eq!(snapshot.available_scopes, vec!["k1", "k2"]);
    }

    #[test]
    fn malformed_hour_is_a_parse_error() {
        let body = json!({
            "overallStats": { "totalCustomers": 0, "avgWaitTime": 0 },
            "hourlySummary": [{ "hour": "10:30", "editable_id": null }]
        });
        let dto: QueueSummaryResponse = serde_json::from_value(body).unwrap();
        let err = dto.into_snapshot(date(), &ScopeFilter::All).unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn duplicate_hours_are_rejected() {
        let body = json!({
            "overallStats": { "totalVisitors": 0, "avgDwellTime": 0 },
            "hourlySummary": [
                { "hour": "10:00", "editable_id": 1 },
                { "hour": "10", "editable_id": 2 }
            ]
        });
        let dto: HeatmapSummaryResponse = serde_json::from_value(body).unwrap();
        assert!(dto
            .into_snapshot(date(), &ScopeFilter::entity("z"))
            .is_err());
    }

    #[test]
    fn error_body_prefers_error_field() {
        let body: ErrorBody =
            serde_json::from_value(json!({ "error": "nope", "message": "other" })).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("nope"));
        let body: ErrorBody = serde_json::from_value(json!({ "msg": "x" })).unwrap();
        assert_eq!(body.into_message(), None);
    }
}
