//! HTTP adapter for the store analytics API.

mod dto;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::domain::{DailySnapshot, RecordId, Screen, ScopeFilter};
use crate::ports::{AnalyticsBackend, BackendError, RecordPatch};

use dto::{ErrorBody, FlowDataResponse, HeatmapSummaryResponse, QueueSummaryResponse};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn summary_path(screen: Screen) -> &'static str {
    match screen {
        Screen::CustomerFlow => "/api/analytics/customers/flow-data",
        Screen::Heatmap => "/api/analytics/heatmaps/daily-summary",
        Screen::Queue => "/api/analytics/queues/daily-summary",
    }
}

fn record_path(screen: Screen, id: RecordId) -> String {
    let resource = match screen {
        Screen::CustomerFlow => "customers",
        Screen::Heatmap => "heatmaps",
        Screen::Queue => "queues",
    };
    format!("/api/analytics/{resource}/record/{id}")
}

/// Query string for a daily summary fetch. Each endpoint names its parameters differently,
/// and only the flow endpoint expects an explicit `all`.
fn summary_query(
    screen: Screen,
    date: NaiveDate,
    scope: &ScopeFilter,
) -> Vec<(&'static str, String)> {
    let date = date.format(DATE_FORMAT).to_string();
    match screen {
        Screen::CustomerFlow => vec![
            ("date_from", date),
            ("camera_id", scope.as_query_value().to_string()),
        ],
        Screen::Heatmap | Screen::Queue => {
            let name = match screen {
                Screen::Heatmap => "zone_ids",
                _ => "cashier_ids",
            };
            let mut query = vec![("date", date)];
            if let Some(entity) = scope.entity_id() {
                query.push((name, entity.to_string()));
            }
            query
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpAnalyticsBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpAnalyticsBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| BackendError::other(format!("invalid API URL {base_url}: {e}")))?;
        let client = Client::builder()
            .user_agent(concat!("hourbook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::other(format!("failed to build URL for {path}: {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        call_name: &str,
    ) -> Result<Response, BackendError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| BackendError::Request(format!("{call_name}: {e}")))?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        debug!(call = call_name, status = status.as_u16(), "analytics call ok");
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        call_name: &str,
    ) -> Result<T, BackendError> {
        let response = self.send(request, call_name).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Parse(format!("{call_name}: {e}")))
    }
}

#[async_trait]
impl AnalyticsBackend for HttpAnalyticsBackend {
    #[instrument(skip_all, fields(%screen, %date, %scope))]
    async fn fetch_daily_summary(
        &self,
        screen: Screen,
        date: NaiveDate,
        scope: &ScopeFilter,
    ) -> Result<DailySnapshot, BackendError> {
        let path = summary_path(screen);
        let request = self
            .client
            .get(self.endpoint(path)?)
            .query(&summary_query(screen, date, scope));
        let call_name = format!("GET {path}");

        match screen {
            Screen::CustomerFlow => self
                .get_json::<FlowDataResponse>(request, &call_name)
                .await?
                .into_snapshot(date, scope),
            Screen::Heatmap => self
                .get_json::<HeatmapSummaryResponse>(request, &call_name)
                .await?
                .into_snapshot(date, scope),
            Screen::Queue => self
                .get_json::<QueueSummaryResponse>(request, &call_name)
                .await?
                .into_snapshot(date, scope),
        }
    }

    #[instrument(skip_all, fields(%screen, %id, fields = patch.len()))]
    async fn update_record(
        &self,
        screen: Screen,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<(), BackendError> {
        let path = record_path(screen, id);
        let request = self.client.put(self.endpoint(&path)?).json(patch);
        self.send(request, &format!("PUT {path}")).await?;
        Ok(())
    }
}
