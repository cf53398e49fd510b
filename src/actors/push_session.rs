use actix::prelude::*;
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::notifications::{PushFrame, PushHub};

// ============================================================================
// Push Session Actor - one per connected WebSocket client
// ============================================================================
//
// Forwards frames from the client's PushHub queue to the socket and keeps
// the connection honest with a ping/pong heartbeat. Stopping the actor,
// for any reason, removes the client from the hub.
//
// ============================================================================

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

fn heartbeat_expired(last_heartbeat: Instant, now: Instant) -> bool {
    now.duration_since(last_heartbeat) > CLIENT_TIMEOUT
}

pub struct PushSession {
    client_id: Uuid,
    hub: Arc<PushHub>,
    metrics: Arc<Metrics>,
    frames: Option<mpsc::Receiver<Arc<PushFrame>>>,
    last_heartbeat: Instant,
}

impl PushSession {
    pub fn new(
        client_id: Uuid,
        frames: mpsc::Receiver<Arc<PushFrame>>,
        hub: Arc<PushHub>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client_id,
            hub,
            metrics,
            frames: Some(frames),
            last_heartbeat: Instant::now(),
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if heartbeat_expired(act.last_heartbeat, Instant::now()) {
                tracing::info!(client_id = %act.client_id, "Push client heartbeat timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for PushSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
        if let Some(frames) = self.frames.take() {
            ctx.add_stream(ReceiverStream::new(frames));
        }
        self.metrics.push_clients.set(self.hub.client_count() as i64);
        tracing::info!(client_id = %self.client_id, "Push client connected");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.hub.unregister(self.client_id);
        self.metrics.push_clients.set(self.hub.client_count() as i64);
        tracing::info!(client_id = %self.client_id, "Push client disconnected");
    }
}

/// Frames queued by the hub. The stream ends when the hub drops the
/// client's sender, which stops the session.
impl StreamHandler<Arc<PushFrame>> for PushSession {
    fn handle(&mut self, frame: Arc<PushFrame>, ctx: &mut Self::Context) {
        match serde_json::to_string(frame.as_ref()) {
            Ok(text) => ctx.text(text),
            Err(e) => tracing::warn!(client_id = %self.client_id, error = %e, "Failed to encode push frame"),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PushSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) | Ok(ws::Message::Text(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(client_id = %self.client_id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}
