//! `/health` response.

use std::time::Instant;

use serde::Serialize;

/// Body of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server answers.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered sessions.
    pub connections: usize,
    /// Sessions that have joined the peer stream.
    pub active_peers: usize,
}

/// Build a health snapshot.
pub fn health_check(start_time: Instant, connections: usize, active_peers: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_peers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_counts() {
        let resp = health_check(Instant::now(), 3, 1);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.connections, 3);
        assert_eq!(resp.active_peers, 1);
        assert!(resp.uptime_secs < 5);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_value(health_check(Instant::now(), 0, 0)).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].is_u64());
        assert_eq!(json["connections"], 0);
        assert_eq!(json["active_peers"], 0);
    }
}
