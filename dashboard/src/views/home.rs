use super::ListRequest;
use crate::chart::{days_in_month, usage_datasets, ChartDataset, TimeWindow};
use crate::client::Upstream;
use crate::context::RequestContext;
use crate::devices::MeasurementQuery;
use crate::errors::Result;
use crate::model::{Alarm, Paged};
use crate::paging::{Paging, QueryParams};
use chrono::{DateTime, Utc};
use tracing::warn;

pub const ALARM_TABLE_URL: &str = "/components/tables/alarms";

/// Alarms shown on the start page.
pub const HOME_ALARM_LIMIT: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AlarmList {
    pub alarms: Vec<Alarm>,
    pub paging: Paging,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageChart {
    /// One dataset per month, labelled `YYYY-MM`.
    pub datasets: Vec<ChartDataset>,
    /// Longest month in the window, for the x axis.
    pub x_scale_max: u32,
}

/// Query for the start page: alarms come in pages of five.
pub fn home_request(query: &QueryParams) -> ListRequest {
    let mut query = query.clone();
    query.set("limit", &HOME_ALARM_LIMIT.to_string());
    ListRequest::from_query(&query)
}

/// A page of alarms. Failures show as an empty list.
pub async fn compose_alarms(
    upstream: &Upstream,
    ctx: &RequestContext,
    request: &ListRequest,
) -> AlarmList {
    let page = upstream
        .get_alarms(ctx, request.offset, request.limit, &request.filters)
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to fetch alarms: {}", e);
            Paged::new(Vec::new(), 0, request.offset, request.limit)
        });

    AlarmList {
        paging: request.paging(page.count, page.total_records, ALARM_TABLE_URL),
        alarms: page.items,
    }
}

pub async fn compose_usage(upstream: &Upstream, ctx: &RequestContext) -> Result<UsageChart> {
    compose_usage_at(upstream, ctx, Utc::now()).await
}

pub(crate) async fn compose_usage_at(
    upstream: &Upstream,
    ctx: &RequestContext,
    now: DateTime<Utc>,
) -> Result<UsageChart> {
    let window = TimeWindow::usage(now);
    let query = MeasurementQuery::new()
        .aggr_methods("rate")
        .time_unit("day")
        .between(window.start, window.end);

    let data = upstream.get_measurement_data(ctx, None, &query).await?;

    Ok(UsageChart {
        datasets: usage_datasets(&data.values),
        x_scale_max: days_in_month(window.start).max(days_in_month(window.end)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::views::testing::upstream;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> RequestContext {
        RequestContext::new("token")
    }

    #[test]
    fn test_home_request_pages_by_five() {
        let request = home_request(&QueryParams::parse("page=2&limit=50"));
        assert_eq!((request.offset, request.limit), (5, 5));
    }

    #[tokio::test]
    async fn test_compose_alarms() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/alarms"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"totalRecords": 12, "count": 1},
                "data": [{"deviceID": "dev-1", "observedAt": "2024-05-01T10:00:00Z", "alarms": ["low battery"]}]
            })))
            .mount(&server)
            .await;

        let list = compose_alarms(&upstream(&server), &ctx(), &home_request(&QueryParams::new())).await;

        assert_eq!(list.alarms[0].types, vec!["low battery"]);
        assert_eq!(list.paging.page_last, 3);
        assert_eq!(list.paging.target_url, ALARM_TABLE_URL);
    }

    #[tokio::test]
    async fn test_alarm_failure_is_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let list = compose_alarms(&upstream(&server), &ctx(), &home_request(&QueryParams::new())).await;

        assert!(list.alarms.is_empty());
        assert_eq!(list.paging.total, 0);
    }

    #[tokio::test]
    async fn test_usage_groups_by_month() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/measurements"))
            .and(query_param("aggrMethods", "rate"))
            .and(query_param("timeunit", "day"))
            .and(query_param("timeat", "2024-01-29T00:00:00Z"))
            .and(query_param("endTimeAt", "2024-02-01T23:59:59Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"values": [
                {"sum": 10.0, "timestamp": "2024-01-30T00:00:00Z"},
                {"sum": 12.0, "timestamp": "2024-01-31T00:00:00Z"},
                {"sum": 7.0, "timestamp": "2024-02-01T00:00:00Z"}
            ]}})))
            .mount(&server)
            .await;

        let now = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let usage = compose_usage_at(&upstream(&server), &ctx(), now).await.unwrap();

        assert_eq!(usage.x_scale_max, 31);
        assert_eq!(usage.datasets.len(), 2);
        assert_eq!(usage.datasets[0].label, "2024-01");
        assert_eq!(usage.datasets[1].data, vec![("1".to_string(), 7.0)]);
    }

    #[tokio::test]
    async fn test_usage_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = compose_usage(&upstream(&server), &ctx()).await;
        assert!(matches!(result, Err(Error::Unauthorized)));
    }
}
