use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

fn event(name: &str, data: &str) -> Result<Event, Infallible> {
    Ok(Event::default().event(name).data(data))
}

/// Version handshake for open pages.
///
/// A client on another version is told to upgrade and the stream ends.
/// Otherwise it gets `hello`, then a `tick` per interval until it leaves or
/// the server shuts down, which ends the stream with `goodbye`.
pub async fn version_events(
    State(state): State<AppState>,
    Path(client_version): Path<String>,
) -> impl IntoResponse {
    info!(client = %client_version, mine = %state.version, "comparing versions");

    let events: EventStream = if client_version != state.version {
        warn!("client is out of date, sending upgrade and goodbye messages");
        stream::iter([
            event("upgrade", &state.version),
            event("goodbye", "see you soon"),
        ])
        .boxed()
    } else {
        info!("client connected, sending hello");
        stream::once(async { event("hello", "version handshake ok") })
            .chain(ticks(state.tick_interval, state.shutdown.subscribe()))
            .boxed()
    };

    ([("X-Accel-Buffering", "no")], Sse::new(events))
}

fn ticks(period: Duration, shutdown: watch::Receiver<bool>) -> EventStream {
    let timer = interval_at(Instant::now() + period, period);

    stream::unfold(Some((timer, shutdown)), |state| async move {
        let (mut timer, mut shutdown) = state?;

        let shut_down = *shutdown.borrow();
        let closing = shut_down
            || tokio::select! {
                _ = timer.tick() => false,
                _ = shutdown.changed() => true,
            };

        if closing {
            info!("we are closing down, sending goodbye to client");
            return Some((event("goodbye", "system closing down"), None));
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        Some((event("tick", &now), Some((timer, shutdown))))
    })
    .boxed()
}
