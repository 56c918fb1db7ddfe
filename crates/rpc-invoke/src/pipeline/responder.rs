//! Single-assignment response sending.

use crate::domain::{
    Compression, MsgType, RequestEnvelope, ResponseEnvelope, ResponsePayload, RpcError,
};
use crate::invoker::Exporter;
use crate::pipeline::PipelineStats;
use crate::ports::{Channel, ResponseInjector};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Sends at most one response for a request.
///
/// The first caller wins the compare-and-set; later calls are dropped.
/// Injectors run only for the response actually sent.
pub struct Responder {
    channel: Arc<dyn Channel>,
    injections: Arc<[Arc<dyn ResponseInjector>]>,
    stats: Arc<PipelineStats>,
    sent: AtomicBool,
}

impl Responder {
    pub fn new(
        channel: Arc<dyn Channel>,
        injections: Arc<[Arc<dyn ResponseInjector>]>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            channel,
            injections,
            stats,
            sent: AtomicBool::new(false),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }

    /// Error response; always uncompressed
    pub fn send_error(
        &self,
        request: &RequestEnvelope,
        error: RpcError,
        exporter: Option<&Exporter>,
    ) -> bool {
        let header = request.header.response(MsgType::BizResp, Compression::None);
        self.respond(
            request,
            ResponseEnvelope::new(header, ResponsePayload::Exception(error)),
            exporter,
        )
    }

    /// Result response; compressed like the session
    pub fn send_result(
        &self,
        request: &RequestEnvelope,
        result: Result<Value, RpcError>,
        exporter: Option<&Exporter>,
    ) -> bool {
        let compression = request
            .session
            .as_ref()
            .map(|s| s.compression())
            .unwrap_or_default();
        let header = request.header.response(MsgType::BizResp, compression);
        self.respond(
            request,
            ResponseEnvelope::new(header, ResponsePayload::from_result(result)),
            exporter,
        )
    }

    fn respond(
        &self,
        request: &RequestEnvelope,
        mut response: ResponseEnvelope,
        exporter: Option<&Exporter>,
    ) -> bool {
        if self
            .sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(msg_id = request.header.msg_id, "Response already sent, dropping");
            self.stats.record_duplicate();
            return false;
        }

        for injection in self.injections.iter() {
            injection.inject(request, &mut response, exporter);
        }

        match self.channel.send(response) {
            Ok(()) => self.stats.record_sent(),
            Err(e) => {
                error!(
                    msg_id = request.header.msg_id,
                    channel = %format!("{}->{}", self.channel.remote_addr(), self.channel.local_addr()),
                    error = %e,
                    "Error occurs while sending response"
                );
                self.stats.record_send_failure();
            }
        }
        true
    }
}
