use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Map;

use crate::cache::{FetchGateway, TreeCache};

/// Parse the backend's launch-time formats: RFC 3339, or the
/// `str(datetime)` form a Python backend emits ("2024-01-01
/// 12:00:00+00:00").
fn parse_launch_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Uptime of a running instance as the largest two non-zero units:
/// "2d 3h", "1h 30m", or "45m". Anything not running, or without a
/// parseable launch time, is "N/A".
pub fn calculate_uptime(launch_time: Option<&str>, state: &str, now: DateTime<Utc>) -> String {
    if state != "running" {
        return "N/A".to_string();
    }
    let Some(launched) = launch_time.and_then(parse_launch_time) else {
        return "N/A".to_string();
    };
    let secs = (now - launched).num_seconds().max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Recomputes the `Uptime` attribute of every cached instance on a
/// fixed interval, without fetching anything and without touching any
/// node's fetch status. One refresher serves every view; the views
/// just read the attribute.
pub struct UptimeRefresher<G: FetchGateway> {
    cache: Arc<TreeCache<G>>,
    interval: Duration,
}

impl<G: FetchGateway> UptimeRefresher<G> {
    pub fn new(cache: Arc<TreeCache<G>>, interval: Duration) -> Self {
        UptimeRefresher { cache, interval }
    }

    /// One recomputation pass over the cached instances. Updates merge
    /// into each node's attributes, so concurrently hydrated fields
    /// are left alone.
    pub fn tick(&self, now: DateTime<Utc>) {
        for key in self.cache.instance_keys() {
            let Some(node) = self.cache.get(&key) else {
                continue;
            };
            let uptime = calculate_uptime(
                node.attr_str("LaunchTime"),
                node.attr_str("State").unwrap_or(""),
                now,
            );
            let mut patch = Map::new();
            patch.insert("Uptime".to_string(), uptime.into());
            self.cache.update_attributes(&key, patch);
        }
    }

    /// Run the repeating timer. Never returns; spawn it.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick of a tokio interval fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.tick(Utc::now());
        }
    }
}
