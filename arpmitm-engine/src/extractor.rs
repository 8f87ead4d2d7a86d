//! HTTP event extraction from intercepted frames

use arpmitm_capture::StatsAccumulator;
use arpmitm_core::RawFrame;
use arpmitm_packet::{CapturedFrame, FrameLayer, TcpFlow};
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpDirection {
    Request,
    Response,
}

/// One HTTP message seen on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpEvent {
    Request {
        method: String,
        host: Option<String>,
        path: String,
        /// Message body, if the segment carried one
        payload: Option<Vec<u8>>,
    },
    Response {
        status: u16,
        reason: String,
        payload: Option<Vec<u8>>,
    },
}

impl HttpEvent {
    pub fn direction(&self) -> HttpDirection {
        match self {
            HttpEvent::Request { .. } => HttpDirection::Request,
            HttpEvent::Response { .. } => HttpDirection::Response,
        }
    }

    /// Host and path of a request; `None` for responses
    pub fn url(&self) -> Option<String> {
        match self {
            HttpEvent::Request { host, path, .. } => Some(match host {
                Some(host) => format!("{}{}", host, path),
                None => path.clone(),
            }),
            HttpEvent::Response { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            HttpEvent::Request { payload, .. } | HttpEvent::Response { payload, .. } => {
                payload.as_deref()
            }
        }
    }
}

impl fmt::Display for HttpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpEvent::Request { method, .. } => {
                write!(f, "{} {}", method, self.url().unwrap_or_default())
            }
            HttpEvent::Response { status, reason, .. } => write!(f, "{} {}", status, reason),
        }
    }
}

fn non_empty(body: &[u8]) -> Option<Vec<u8>> {
    (!body.is_empty()).then(|| body.to_vec())
}

/// Turns captured frames into [`HttpEvent`]s and reports them
#[derive(Clone, Default)]
pub struct ProtocolExtractor {
    stats: Option<StatsAccumulator>,
}

impl ProtocolExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count ARP and HTTP frames into a capture's statistics
    pub fn with_stats(mut self, stats: StatsAccumulator) -> Self {
        self.stats = Some(stats);
        self
    }

    /// The HTTP event carried by `frame`, if any
    pub fn extract(&self, frame: &CapturedFrame) -> Option<HttpEvent> {
        match &frame.layer {
            FrameLayer::HttpRequest(req) => Some(HttpEvent::Request {
                method: req.method.clone(),
                host: req.host().map(str::to_string),
                path: req.path.clone(),
                payload: non_empty(&req.body),
            }),
            FrameLayer::HttpResponse(resp) => Some(HttpEvent::Response {
                status: resp.status_code,
                reason: resp.reason.clone(),
                payload: non_empty(&resp.body),
            }),
            FrameLayer::Arp(_) | FrameLayer::Unrecognized => None,
        }
    }

    /// Classify, count and report one raw frame
    pub fn process(&self, raw: RawFrame) -> Option<HttpEvent> {
        let frame = CapturedFrame::parse(raw);

        if let Some(stats) = &self.stats {
            match frame.layer {
                FrameLayer::Arp(_) => stats.record_arp(),
                FrameLayer::HttpRequest(_) => stats.record_http_request(),
                FrameLayer::HttpResponse(_) => stats.record_http_response(),
                FrameLayer::Unrecognized => {}
            }
        }

        let event = self.extract(&frame)?;
        report(&event, frame.flow.as_ref());
        Some(event)
    }
}

fn report(event: &HttpEvent, flow: Option<&TcpFlow>) {
    let flow = flow.map(ToString::to_string).unwrap_or_default();

    match event {
        HttpEvent::Request { method, .. } => {
            let url = event.url().unwrap_or_default();
            info!(%flow, method = %method, url = %url, "HTTP Request >> {}", url);
        }
        HttpEvent::Response { status, .. } => {
            info!(%flow, status, "HTTP Response << {}", status);
        }
    }

    if let Some(payload) = event.payload() {
        info!(len = payload.len(), "Raw payload: {}", payload.escape_ascii());
    } else {
        debug!("No payload");
    }
}
