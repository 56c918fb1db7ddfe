//! Provider request handling.
//!
//! `handle` runs synchronously on the receiving task: admission, restoring the
//! invocation from the session, resolving class and method, and finding the
//! exporter. The filter chain and the completion run in a spawned task that
//! owns the request, so a slow call never blocks the connection.

use crate::domain::{
    codes, format_error, CallResult, Invocation, MethodLookupError, RequestEnvelope, RpcError,
};
use crate::invoker::Exporter;
use crate::pipeline::{AppIdTransmit, CallIdInjection, PipelineStats, Responder};
use crate::ports::{
    CancelSignal, Channel, ClassResolver, InvocationCallback, ResponseInjector, ServiceRegistry,
    Transmit,
};
use futures::FutureExt;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, field, info_span, warn, Instrument};

/// Why a request was dropped without a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The caller's timeout elapsed before the request was handled
    Timeout,
    /// The channel's outbound buffer is full
    Backpressure,
}

/// What `handle` did with a request
#[derive(Debug)]
pub enum Dispatch {
    /// Dropped silently; no response will be sent
    Discarded(DiscardReason),
    /// Failed before dispatch; the error response was already sent
    Rejected,
    /// Running; the task sends the response when the call completes
    Spawned(JoinHandle<()>),
}

impl Dispatch {
    pub fn is_spawned(&self) -> bool {
        matches!(self, Dispatch::Spawned(_))
    }

    /// Wait for the completion task, if any
    pub async fn finished(self) {
        if let Dispatch::Spawned(handle) = self {
            if let Err(e) = handle.await {
                error!(error = %e, "Completion task failed");
            }
        }
    }
}

/// Entry point of the provider pipeline
pub struct ProviderHandler {
    registry: Arc<dyn ServiceRegistry>,
    classes: Arc<dyn ClassResolver>,
    callback: Arc<dyn InvocationCallback>,
    transmits: Vec<Arc<dyn Transmit>>,
    injections: Arc<[Arc<dyn ResponseInjector>]>,
    stats: Arc<PipelineStats>,
}

impl ProviderHandler {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        classes: Arc<dyn ClassResolver>,
        callback: Arc<dyn InvocationCallback>,
    ) -> Self {
        Self {
            registry,
            classes,
            callback,
            transmits: Vec::new(),
            injections: Vec::new().into(),
            stats: Arc::new(PipelineStats::new()),
        }
    }

    /// Builder: add [`AppIdTransmit`] and [`CallIdInjection`]
    pub fn with_builtins(self) -> Self {
        self.with_transmit(Arc::new(AppIdTransmit))
            .with_injection(Arc::new(CallIdInjection))
    }

    pub fn with_transmit(mut self, transmit: Arc<dyn Transmit>) -> Self {
        self.transmits.push(transmit);
        self
    }

    pub fn with_injection(mut self, injection: Arc<dyn ResponseInjector>) -> Self {
        let mut injections = self.injections.to_vec();
        injections.push(injection);
        self.injections = injections.into();
        self
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Handle one decoded request. Must be called within a Tokio runtime.
    ///
    /// Every request that is not discarded gets exactly one response.
    pub fn handle(&self, channel: Arc<dyn Channel>, mut request: RequestEnvelope) -> Dispatch {
        self.stats.record_received();
        let msg_id = request.header.msg_id;

        if request.is_timeout() {
            warn!(
                code = codes::PROVIDER_DISCARD_TIMEOUT_MESSAGE,
                msg_id,
                timeout_ms = request.header.timeout.as_millis() as u64,
                "Discard request cause by timeout after receive the msg"
            );
            self.stats.record_discarded_timeout();
            return Dispatch::Discarded(DiscardReason::Timeout);
        }
        if !channel.is_writable() {
            error!(
                channel = %describe(channel.as_ref()),
                msg_id,
                "Discard request, because client is sending too fast, causing channel is not writable"
            );
            self.stats.record_discarded_backpressure();
            return Dispatch::Discarded(DiscardReason::Backpressure);
        }

        let span = info_span!(
            "rpc.provider",
            call_id = %request.context.call_id,
            msg_id,
            class = field::Empty,
            method = field::Empty,
            alias = field::Empty,
        );
        let _entered = span.enter();

        let responder = Responder::new(
            Arc::clone(&channel),
            Arc::clone(&self.injections),
            Arc::clone(&self.stats),
        );

        let prepared = self.prepare(channel.as_ref(), &mut request);
        span.record("class", request.payload.class_name.as_str());
        span.record("method", request.payload.method_name.as_str());
        span.record("alias", request.payload.alias.as_str());

        let exporter = match prepared {
            Ok(exporter) => exporter,
            Err(error) => {
                debug!(code = error.code(), error = %error, "Request rejected");
                self.stats.record_rejected();
                responder.send_error(&request, error, None);
                return Dispatch::Rejected;
            }
        };

        let cancel = self.callback.register(channel.as_ref(), &request);
        let completion = Completion {
            exporter,
            responder,
            callback: Arc::clone(&self.callback),
            channel_id: channel.id(),
            remote: channel.remote_addr(),
            local: channel.local_addr(),
        };
        let task = completion.run(request, cancel).instrument(span.clone());
        Dispatch::Spawned(tokio::spawn(task))
    }

    /// Restore the invocation and look up its exporter
    fn prepare(
        &self,
        channel: &dyn Channel,
        request: &mut RequestEnvelope,
    ) -> Result<Arc<Exporter>, RpcError> {
        self.restore(channel, request)?;
        let invocation = &request.payload;
        self.registry
            .exporter(
                &invocation.class_name,
                &invocation.alias,
                channel.local_addr().port(),
            )
            .ok_or_else(|| {
                // tells the consumer to drop this connection
                RpcError::Shutdown(diagnostic(
                    codes::PROVIDER_EXPORTER_NOT_FOUND,
                    invocation,
                    channel,
                    " exporter is not found",
                ))
            })
    }

    fn restore(&self, channel: &dyn Channel, request: &mut RequestEnvelope) -> Result<(), RpcError> {
        for transmit in &self.transmits {
            transmit.restore(request);
        }
        let session = request.session.clone();
        request.payload.apply(session.as_deref());

        if request.payload.class_name.is_empty() {
            return Err(RpcError::SessionExpired(diagnostic(
                codes::PROVIDER_TASK_SESSION_EXPIRED,
                &request.payload,
                channel,
                " session has been cleared, may be the session has expired",
            )));
        }
        self.resolve_interface_id(channel, &mut request.payload)?;

        let invocation = &mut request.payload;
        let class = match &invocation.class {
            Some(class) => Arc::clone(class),
            None => {
                let class = self.classes.resolve(&invocation.class_name).ok_or_else(|| {
                    RpcError::ClassNotFound(diagnostic(
                        codes::PROVIDER_CLASS_NOT_FOUND,
                        invocation,
                        channel,
                        &format!("class is not found: {}", invocation.class_name),
                    ))
                })?;
                invocation.class = Some(Arc::clone(&class));
                class
            }
        };
        if invocation.method.is_none() {
            let method = class
                .public_method(&invocation.method_name)
                .map_err(|e| match e {
                    MethodLookupError::NoSuchMethod { .. } => RpcError::NoSuchMethod(diagnostic(
                        codes::PROVIDER_NO_SUCH_METHOD,
                        invocation,
                        channel,
                        &e.to_string(),
                    )),
                    MethodLookupError::Overloaded { .. } => RpcError::MethodOverload(diagnostic(
                        codes::PROVIDER_METHOD_OVERLOAD,
                        invocation,
                        channel,
                        &e.to_string(),
                    )),
                })?;
            invocation.method = Some(method);
        }

        let (local, remote) = (channel.local_addr(), channel.remote_addr());
        request.local_addr = Some(local);
        request.remote_addr = Some(remote);
        request.context.local_addr = Some(local);
        request.context.remote_addr = Some(remote);
        Ok(())
    }

    /// Older clients send a numeric interface id instead of the name
    fn resolve_interface_id(
        &self,
        channel: &dyn Channel,
        invocation: &mut Invocation,
    ) -> Result<(), RpcError> {
        if !invocation.class_name.starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(());
        }
        let class_name = invocation
            .class_name
            .parse::<u64>()
            .ok()
            .and_then(|id| self.registry.class_name_by_id(id));
        match class_name {
            Some(class_name) => {
                debug!(interface_id = %invocation.class_name, class = %class_name, "Resolved legacy interface id");
                invocation.class_name = class_name;
                invocation.class = None;
                Ok(())
            }
            None => Err(RpcError::ClassNotFound(diagnostic(
                codes::PROVIDER_CLASS_NOT_FOUND,
                invocation,
                channel,
                &format!("class is not found by interfaceId {}", invocation.class_name),
            ))),
        }
    }
}

/// State moved into the completion task
struct Completion {
    exporter: Arc<Exporter>,
    responder: Responder,
    callback: Arc<dyn InvocationCallback>,
    channel_id: u64,
    remote: SocketAddr,
    local: SocketAddr,
}

impl Completion {
    /// Run the chain, racing it against the cancel signal, and respond once
    async fn run(self, mut request: RequestEnvelope, mut cancel: CancelSignal) {
        let msg_id = request.header.msg_id;

        let outcome = {
            let invocation = AssertUnwindSafe(self.exporter.invoke(&mut request)).catch_unwind();
            tokio::select! {
                biased;
                result = invocation => result.unwrap_or_else(|panic| Err(panicked(panic))),
                Ok(reason) = &mut cancel => Err(reason),
            }
        };

        let exporter = Some(self.exporter.as_ref());
        match outcome {
            Err(error) => {
                if !error.is_shutdown() {
                    error!(
                        code = error.code(),
                        "{}",
                        format_error(
                            codes::PROVIDER_TASK_FAIL,
                            &request.payload,
                            self.remote,
                            self.local,
                            &error.to_string()
                        )
                    );
                }
                self.responder.send_error(&request, error, exporter);
            }
            Ok(CallResult::Async(future)) => {
                let result = tokio::select! {
                    biased;
                    result = AssertUnwindSafe(future).catch_unwind() => {
                        result.unwrap_or_else(|panic| Err(panicked(panic)))
                    }
                    Ok(reason) = &mut cancel => Err(reason),
                };
                self.responder.send_result(&request, result, exporter);
            }
            Ok(CallResult::Value(value)) => {
                self.responder.send_result(&request, Ok(value), exporter);
            }
            Ok(CallResult::Exception(error)) => {
                self.responder.send_result(&request, Err(error), exporter);
            }
        }
        self.callback.remove(self.channel_id, msg_id);
    }
}

fn diagnostic(code: &str, invocation: &Invocation, channel: &dyn Channel, cause: &str) -> String {
    format_error(
        code,
        invocation,
        channel.remote_addr(),
        channel.local_addr(),
        cause,
    )
}

fn describe(channel: &dyn Channel) -> String {
    format!("{}->{}", channel.remote_addr(), channel.local_addr())
}

fn panicked(panic: Box<dyn Any + Send>) -> RpcError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    RpcError::TaskFailed(format!("method panicked: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LocalRegistry, MemoryChannel, MemorySession};
    use crate::domain::{
        InterfaceDescriptor, MessageHeader, MethodDescriptor, RequestContext, ResponseEnvelope,
        ServiceUrl,
    };
    use crate::filter::FilterChainFactory;
    use crate::invoker::MethodTable;
    use crate::pipeline::PendingCalls;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn answer(_: &Invocation, _: &RequestContext) -> CallResult {
        CallResult::Value(json!(42))
    }

    struct Fixture {
        handler: ProviderHandler,
        registry: Arc<LocalRegistry>,
        channel: Arc<MemoryChannel>,
        responses: mpsc::Receiver<ResponseEnvelope>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(LocalRegistry::new());
        registry.register_interface(Arc::new(
            InterfaceDescriptor::new("com.x.Foo")
                .with_method(MethodDescriptor::new("bar", &[]))
                .with_method(MethodDescriptor::new("dup", &["int"]))
                .with_method(MethodDescriptor::new("dup", &["string"])),
        ));
        registry.export(Arc::new(Exporter::new(
            ServiceUrl::new("joy", "127.0.0.1", 22000).with_path("com.x.Foo"),
            None,
            MethodTable::new().with("bar", answer),
            &FilterChainFactory::empty(),
        )));

        let handler = ProviderHandler::new(
            registry.clone(),
            registry.clone(),
            Arc::new(PendingCalls::new(Duration::from_secs(5))),
        )
        .with_builtins();
        let (channel, responses) = MemoryChannel::create(
            16,
            "127.0.0.1:22000".parse().unwrap(),
            "10.0.0.9:50000".parse().unwrap(),
        );
        Fixture {
            handler,
            registry,
            channel: Arc::new(channel),
            responses,
        }
    }

    fn request(class: &str, method: &str) -> RequestEnvelope {
        RequestEnvelope::new(
            MessageHeader::request(3, Duration::from_secs(5)),
            Invocation::new(class, method, ""),
        )
    }

    #[tokio::test]
    async fn test_session_supplies_interface() {
        let mut fx = fixture();
        let request = request("", "bar")
            .with_session(Arc::new(MemorySession::new().with_interface("com.x.Foo")));
        fx.handler.handle(fx.channel.clone(), request).finished().await;

        let response = fx.responses.recv().await.unwrap();
        assert_eq!(response.payload.value(), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_empty_class_is_session_expired() {
        let mut fx = fixture();
        let dispatch = fx.handler.handle(fx.channel.clone(), request("", "bar"));
        assert!(matches!(dispatch, Dispatch::Rejected));

        let response = fx.responses.recv().await.unwrap();
        let Some(RpcError::SessionExpired(message)) = response.payload.exception() else {
            panic!("expected session expired, got {:?}", response.payload);
        };
        assert!(message.starts_with("[130002]Error occurs while processing request /bar/"));
        assert!(message.contains("10.0.0.9:50000->127.0.0.1:22000"));
    }

    #[tokio::test]
    async fn test_legacy_interface_id() {
        let mut fx = fixture();
        fx.registry.register_legacy_id(12, "com.x.Foo");

        fx.handler
            .handle(fx.channel.clone(), request("12", "bar"))
            .finished()
            .await;
        assert_eq!(
            fx.responses.recv().await.unwrap().payload.value(),
            Some(&json!(42))
        );

        fx.handler.handle(fx.channel.clone(), request("13", "bar"));
        assert!(matches!(
            fx.responses.recv().await.unwrap().payload.exception(),
            Some(RpcError::ClassNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_method_resolution_errors() {
        let mut fx = fixture();
        fx.handler.handle(fx.channel.clone(), request("com.x.Foo", "missing"));
        assert!(matches!(
            fx.responses.recv().await.unwrap().payload.exception(),
            Some(RpcError::NoSuchMethod(_))
        ));

        fx.handler.handle(fx.channel.clone(), request("com.x.Foo", "dup"));
        assert!(matches!(
            fx.responses.recv().await.unwrap().payload.exception(),
            Some(RpcError::MethodOverload(_))
        ));

        fx.handler.handle(fx.channel.clone(), request("com.x.Bar", "bar"));
        assert!(matches!(
            fx.responses.recv().await.unwrap().payload.exception(),
            Some(RpcError::ClassNotFound(_))
        ));
        assert_eq!(fx.handler.stats().snapshot().rejected, 3);
    }

    #[test]
    fn test_panic_message() {
        let error = panicked(Box::new("boom"));
        assert_eq!(error, RpcError::TaskFailed("method panicked: boom".into()));
    }
}
