//! Synthetic latency probe.
//!
//! Issues sequential HTTP GETs against the load-balancer-fronted URL and
//! reduces the response times to one percentile figure.

use std::time::{Duration, Instant};

use http_body_util::BodyExt;
use tracing::debug;

use fleetscale_core::MetricsConfig;

use crate::percentile::exclusive_quantile;
use crate::round2;

/// Result of a single probe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The endpoint answered 200 and the body was read in full.
    Ok,
    /// The endpoint answered with another status.
    Status(u16),
    /// The request could not complete (connect, handshake, I/O, timeout).
    Failed,
}

/// Perform one GET against `uri` bounded by `timeout`.
pub async fn http_probe(uri: &http::Uri, timeout: Duration) -> ProbeResult {
    let Some(authority) = uri.authority() else {
        debug!(%uri, "probe uri has no authority");
        return ProbeResult::Failed;
    };
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(&address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "probe connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "probe handshake failed");
                return ProbeResult::Failed;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let req = match http::Request::builder()
            .method("GET")
            .uri(path)
            .header("host", authority.as_str())
            .header("user-agent", "fleetscale-probe/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %uri, "probe request build failed");
                return ProbeResult::Failed;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) => {
                let status = resp.status();
                if let Err(e) = resp.into_body().collect().await {
                    debug!(error = %e, %uri, "probe body read failed");
                    return ProbeResult::Failed;
                }
                if status == http::StatusCode::OK {
                    ProbeResult::Ok
                } else {
                    debug!(%status, %uri, "probe non-200");
                    ProbeResult::Status(status.as_u16())
                }
            }
            Err(e) => {
                debug!(error = %e, %uri, "probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%uri, "probe timed out");
            ProbeResult::Failed
        }
    }
}

/// Runs a fixed number of sequential probes and reports one percentile.
#[derive(Debug, Clone)]
pub struct LatencyProber {
    uri: http::Uri,
    probe_count: u32,
    timeout: Duration,
    percentile: u32,
}

impl LatencyProber {
    pub fn new(uri: http::Uri, probe_count: u32, timeout: Duration, percentile: u32) -> Self {
        Self {
            uri,
            probe_count,
            timeout,
            percentile,
        }
    }

    pub fn from_config(config: &MetricsConfig) -> Result<Self, http::uri::InvalidUri> {
        Ok(Self::new(
            config.probe_url.parse()?,
            config.probe_count,
            Duration::from_secs(config.probe_timeout_secs),
            config.percentile,
        ))
    }

    /// Probe latency percentile in milliseconds, rounded to 2 decimals.
    ///
    /// A 200 records the elapsed time. A failed request records the full
    /// timeout as a worst-case penalty. Any other status is dropped. `None`
    /// when nothing was recorded.
    pub async fn sample_latency(&self) -> Option<f64> {
        let mut samples = Vec::with_capacity(self.probe_count as usize);

        for attempt in 0..self.probe_count {
            let start = Instant::now();
            match http_probe(&self.uri, self.timeout).await {
                ProbeResult::Ok => samples.push(start.elapsed().as_secs_f64()),
                ProbeResult::Failed => samples.push(self.timeout.as_secs_f64()),
                ProbeResult::Status(status) => {
                    debug!(attempt, status, "probe sample dropped");
                }
            }
        }

        samples.sort_by(f64::total_cmp);
        let seconds = exclusive_quantile(&samples, self.percentile)?;
        Some(round2(seconds * 1000.0))
    }
}
