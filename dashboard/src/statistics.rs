use crate::client::Upstream;
use crate::context::RequestContext;
use crate::metrics::STATISTICS_TIMEOUTS_TOTAL;
use crate::model::Statistics;
use crate::paging::QueryParams;
use std::time::Duration;
use tracing::{debug, warn};

const STATISTICS_DEADLINE: Duration = Duration::from_secs(5);

async fn count(upstream: &Upstream, ctx: &RequestContext, filter: Option<(&str, &str)>) -> u64 {
    let mut params = QueryParams::new();
    params.add("limit", "1");
    if let Some((key, value)) = filter {
        params.add(key, value);
    }

    match upstream
        .client
        .get(ctx, &upstream.urls.devices, "", &params)
        .await
    {
        Ok(envelope) => envelope.total_records(),
        Err(e) => {
            debug!(filter = ?filter, "Failed to count devices: {}", e);
            0
        }
    }
}

/// Device counts by category. Never fails: a failed query counts as zero and
/// the whole set is zero when the deadline passes.
pub async fn get_statistics(upstream: &Upstream, ctx: &RequestContext) -> Statistics {
    get_statistics_within(upstream, ctx, STATISTICS_DEADLINE).await
}

pub(crate) async fn get_statistics_within(
    upstream: &Upstream,
    ctx: &RequestContext,
    deadline: Duration,
) -> Statistics {
    let counts = async {
        futures::join!(
            count(upstream, ctx, None),
            count(upstream, ctx, Some(("online", "true"))),
            count(upstream, ctx, Some(("active", "true"))),
            count(upstream, ctx, Some(("active", "false"))),
            count(upstream, ctx, Some(("profilename", "unknown"))),
        )
    };

    match tokio::time::timeout(deadline, counts).await {
        Ok((total, online, active, inactive, unknown)) => Statistics {
            total,
            active,
            inactive,
            online,
            unknown,
        },
        Err(_) => {
            STATISTICS_TIMEOUTS_TOTAL.inc();
            warn!("Statistics queries did not finish within {:?}", deadline);
            Statistics::default()
        }
    }
}
