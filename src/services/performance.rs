use log::{debug, warn};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, Serialize, JsonSchema)]
pub struct RouteStats {
    pub route: String,
    pub count: u64,
    pub errors: u64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

#[derive(Default)]
struct RouteTotals {
    count: u64,
    errors: u64,
    total: Duration,
    max: Duration,
}

/// Per-route request timings, kept in process.
#[derive(Clone)]
pub struct PerformanceMonitor {
    slow_threshold: Duration,
    routes: Arc<Mutex<HashMap<String, RouteTotals>>>,
}

/// Request start, stashed in request-local state.
struct RequestStart(Option<Instant>);

impl PerformanceMonitor {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            slow_threshold,
            routes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RouteTotals>> {
        self.routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records one request. Returns true when it crossed the slow threshold.
    pub fn record(&self, route: &str, elapsed: Duration, failed: bool) -> bool {
        let mut routes = self.lock();
        let totals = routes.entry(route.to_string()).or_default();
        totals.count += 1;
        totals.total += elapsed;
        totals.max = totals.max.max(elapsed);
        if failed {
            totals.errors += 1;
        }
        elapsed >= self.slow_threshold
    }

    /// Routes ordered by average latency, slowest first.
    pub fn snapshot(&self) -> Vec<RouteStats> {
        let routes = self.lock();
        let mut stats: Vec<RouteStats> = routes
            .iter()
            .map(|(route, totals)| RouteStats {
                route: route.clone(),
                count: totals.count,
                errors: totals.errors,
                avg_ms: if totals.count == 0 {
                    0.0
                } else {
                    totals.total.as_secs_f64() * 1000.0 / totals.count as f64
                },
                max_ms: totals.max.as_secs_f64() * 1000.0,
            })
            .collect();
        stats.sort_by(|a, b| b.avg_ms.total_cmp(&a.avg_ms));
        stats
    }
}

#[rocket::async_trait]
impl Fairing for PerformanceMonitor {
    fn info(&self) -> Info {
        Info {
            name: "Performance Monitor",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(|| RequestStart(Some(Instant::now())));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let Some(started) = request.local_cache(|| RequestStart(None)).0 else {
            return;
        };
        let elapsed = started.elapsed();
        let route = match request.route() {
            Some(route) => format!("{} {}", request.method(), route.uri),
            None => format!("{} <unmatched>", request.method()),
        };
        let failed = response.status().code >= 500;

        if self.record(&route, elapsed, failed) {
            warn!("Slow request: {} took {} ms", route, elapsed.as_millis());
        } else {
            debug!("{} took {} ms", route, elapsed.as_millis());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_per_route() {
        let monitor = PerformanceMonitor::new(Duration::from_millis(100));
        assert!(!monitor.record("GET /api/v1/jobs", Duration::from_millis(10), false));
        assert!(!monitor.record("GET /api/v1/jobs", Duration::from_millis(30), true));
        assert!(monitor.record("POST /api/v1/jobs/post", Duration::from_millis(150), false));

        let stats = monitor.snapshot();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].route, "POST /api/v1/jobs/post");

        let browse = &stats[1];
        assert_eq!(browse.count, 2);
        assert_eq!(browse.errors, 1);
        assert!((browse.avg_ms - 20.0).abs() < 0.5);
        assert!((browse.max_ms - 30.0).abs() < 0.5);
    }

    #[test]
    fn clones_share_the_same_totals() {
        let monitor = PerformanceMonitor::new(Duration::from_secs(1));
        let fairing = monitor.clone();
        fairing.record("GET /x", Duration::from_millis(1), false);
        assert_eq!(monitor.snapshot()[0].count, 1);
    }
}
