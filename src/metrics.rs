//! Prometheus-compatible metrics endpoint
//!
//! Counters for every role of the netcode plus controller timings.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
#[cfg(feature = "metrics")]
use std::sync::Arc;
#[cfg(feature = "metrics")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};
#[cfg(feature = "metrics")]
use tokio::net::TcpListener;
#[cfg(feature = "metrics")]
use tracing::{debug, info};

const TICK_HISTORY: usize = 1000;

/// Metrics registry shared by owner, authority and observer loops
#[derive(Debug)]
pub struct Metrics {
    // Ticks simulated per role
    pub owner_ticks: AtomicU64,
    pub authority_ticks: AtomicU64,
    pub observer_ticks: AtomicU64,

    // Command flow
    pub commands_sent: AtomicU64,
    pub commands_received: AtomicU64,
    pub commands_dropped: AtomicU64,
    pub broadcasts_sent: AtomicU64,
    pub states_received: AtomicU64,
    pub decode_errors: AtomicU64,

    // Locomotion
    pub ragdoll_transitions: AtomicU64,

    // Reconciliation (drift stored in millimetres)
    pub drift_last_mm: AtomicU64,
    pub drift_max_mm: AtomicU64,
    pub drift_mismatches: AtomicU64,
    pub resimulated_ticks: AtomicU64,

    // Controller step timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            owner_ticks: AtomicU64::new(0),
            authority_ticks: AtomicU64::new(0),
            observer_ticks: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            commands_received: AtomicU64::new(0),
            commands_dropped: AtomicU64::new(0),
            broadcasts_sent: AtomicU64::new(0),
            states_received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            ragdoll_transitions: AtomicU64::new(0),
            drift_last_mm: AtomicU64::new(0),
            drift_max_mm: AtomicU64::new(0),
            drift_mismatches: AtomicU64::new(0),
            resimulated_ticks: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame's tick processing time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us
                .store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Record a predicted-vs-authoritative position error in world units
    pub fn record_drift(&self, error: f32, mismatch: bool) {
        let mm = if error.is_finite() {
            (error.max(0.0) * 1000.0) as u64
        } else {
            u64::MAX
        };
        self.drift_last_mm.store(mm, Ordering::Relaxed);
        self.drift_max_mm.fetch_max(mm, Ordering::Relaxed);
        if mismatch {
            self.drift_mismatches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("ragdoll_owner_ticks_total", "Ticks predicted by owners", "counter",
            self.owner_ticks.load(Ordering::Relaxed));
        metric!("ragdoll_authority_ticks_total", "Ticks run by the authority", "counter",
            self.authority_ticks.load(Ordering::Relaxed));
        metric!("ragdoll_observer_ticks_total", "Ticks dead-reckoned by observers", "counter",
            self.observer_ticks.load(Ordering::Relaxed));

        metric!("ragdoll_commands_sent_total", "Commands sent by owners", "counter",
            self.commands_sent.load(Ordering::Relaxed));
        metric!("ragdoll_commands_received_total", "Commands queued at the authority", "counter",
            self.commands_received.load(Ordering::Relaxed));
        metric!("ragdoll_commands_dropped_total", "Commands dropped on a full queue", "counter",
            self.commands_dropped.load(Ordering::Relaxed));
        metric!("ragdoll_broadcasts_total", "State broadcasts sent", "counter",
            self.broadcasts_sent.load(Ordering::Relaxed));
        metric!("ragdoll_states_received_total", "State broadcasts received", "counter",
            self.states_received.load(Ordering::Relaxed));
        metric!("ragdoll_decode_errors_total", "Undecodable messages", "counter",
            self.decode_errors.load(Ordering::Relaxed));

        metric!("ragdoll_ragdoll_transitions_total", "Balanced to ragdoll transitions", "counter",
            self.ragdoll_transitions.load(Ordering::Relaxed));

        metric!("ragdoll_drift_last_millimeters", "Last predicted vs authoritative position error", "gauge",
            self.drift_last_mm.load(Ordering::Relaxed));
        metric!("ragdoll_drift_max_millimeters", "Largest predicted vs authoritative position error", "gauge",
            self.drift_max_mm.load(Ordering::Relaxed));
        metric!("ragdoll_drift_mismatches_total", "Drifts beyond tolerance", "counter",
            self.drift_mismatches.load(Ordering::Relaxed));
        metric!("ragdoll_resimulated_ticks_total", "Ticks replayed after a mismatch", "counter",
            self.resimulated_ticks.load(Ordering::Relaxed));

        metric!("ragdoll_tick_time_microseconds", "Last frame tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("ragdoll_tick_time_p95_microseconds", "95th percentile frame tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("ragdoll_tick_time_p99_microseconds", "99th percentile frame tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("ragdoll_tick_time_max_microseconds", "Maximum frame tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("ragdoll_frames_total", "Frames processed", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("ragdoll_uptime_seconds", "Uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same counters
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "ticks": {
                "owner": self.owner_ticks.load(Ordering::Relaxed),
                "authority": self.authority_ticks.load(Ordering::Relaxed),
                "observer": self.observer_ticks.load(Ordering::Relaxed),
            },
            "network": {
                "commands_sent": self.commands_sent.load(Ordering::Relaxed),
                "commands_received": self.commands_received.load(Ordering::Relaxed),
                "commands_dropped": self.commands_dropped.load(Ordering::Relaxed),
                "broadcasts": self.broadcasts_sent.load(Ordering::Relaxed),
                "states_received": self.states_received.load(Ordering::Relaxed),
                "decode_errors": self.decode_errors.load(Ordering::Relaxed),
            },
            "reconcile": {
                "drift_last_mm": self.drift_last_mm.load(Ordering::Relaxed),
                "drift_max_mm": self.drift_max_mm.load(Ordering::Relaxed),
                "mismatches": self.drift_mismatches.load(Ordering::Relaxed),
                "resimulated_ticks": self.resimulated_ticks.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "frames": self.tick_count.load(Ordering::Relaxed),
                "ragdoll_transitions": self.ragdoll_transitions.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `/metrics`, `/metrics/json` and `/health` over plain HTTP
#[cfg(feature = "metrics")]
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

/// Build the HTTP response for one request
#[cfg_attr(not(feature = "metrics"), allow(dead_code))]
fn respond(metrics: &Metrics, request: &str) -> String {
    let (content_type, body) = if request.starts_with("GET /metrics/json") {
        ("application/json", metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ("text/plain; version=0.0.4", metrics.to_prometheus())
    } else if request.starts_with("GET /health") {
        ("text/plain", "OK".to_string())
    } else {
        return "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string();
    };

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}
