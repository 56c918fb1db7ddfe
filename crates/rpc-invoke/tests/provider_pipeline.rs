//! End-to-end provider pipeline tests over in-memory adapters.

use rpc_invoke::domain::{InterfaceDescriptor, MethodDescriptor, HIDDEN_KEY_CALL_ID};
use rpc_invoke::pipeline::{sweep_task, DiscardReason};
use rpc_invoke::{
    codes, CallResult, Dispatch, Exporter, FilterChainFactory, Invocation, LocalRegistry,
    MemoryChannel, MemorySession, MessageHeader, MethodTable, PendingCalls, ProviderHandler,
    RequestContext, RequestEnvelope, ResponseEnvelope, RpcError, ServiceUrl,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const LOCAL: &str = "127.0.0.1:22000";
const REMOTE: &str = "10.1.2.3:41000";

struct Provider {
    handler: ProviderHandler,
    registry: Arc<LocalRegistry>,
    pending: Arc<PendingCalls>,
    channel: Arc<MemoryChannel>,
    responses: mpsc::Receiver<ResponseEnvelope>,
}

fn methods() -> MethodTable {
    MethodTable::new()
        .with("answer", |_: &Invocation, _: &RequestContext| {
            CallResult::Value(json!(42))
        })
        .with("later", |_: &Invocation, _: &RequestContext| {
            CallResult::Async(Box::pin(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, RpcError>(json!("done"))
            }))
        })
        .with("never", |_: &Invocation, _: &RequestContext| {
            CallResult::Async(Box::pin(futures::future::pending::<Result<serde_json::Value, RpcError>>()))
        })
        .with("fail", |_: &Invocation, _: &RequestContext| {
            CallResult::Exception(RpcError::application("insufficient funds"))
        })
        .with("boom", |_: &Invocation, _: &RequestContext| -> CallResult {
            panic!("handler exploded")
        })
}

fn provider() -> Provider {
    rpc_telemetry::init_test_logging();

    let registry = Arc::new(LocalRegistry::new());
    let mut descriptor = InterfaceDescriptor::new("com.x.Account");
    for name in ["answer", "later", "never", "fail", "boom"] {
        descriptor = descriptor.with_method(MethodDescriptor::new(name, &[]));
    }
    registry.register_interface(Arc::new(descriptor));
    registry.export(Arc::new(Exporter::new(
        ServiceUrl::new("joy", "127.0.0.1", 22000).with_path("com.x.Account"),
        None,
        methods(),
        &FilterChainFactory::empty(),
    )));

    let pending = Arc::new(PendingCalls::new(Duration::from_secs(5)));
    let handler = ProviderHandler::new(registry.clone(), registry.clone(), pending.clone())
        .with_builtins();
    let (channel, responses) =
        MemoryChannel::create(16, LOCAL.parse().unwrap(), REMOTE.parse().unwrap());
    Provider {
        handler,
        registry,
        pending,
        channel: Arc::new(channel),
        responses,
    }
}

fn request(msg_id: u64, class: &str, method: &str, timeout: Duration) -> RequestEnvelope {
    RequestEnvelope::new(
        MessageHeader::request(msg_id, timeout),
        Invocation::new(class, method, ""),
    )
}

#[tokio::test]
async fn test_value_response_end_to_end() {
    let mut p = provider();
    let request = request(1, "com.x.Account", "answer", Duration::from_secs(1));
    let call_id = request.context.call_id.to_string();

    let dispatch = p.handler.handle(p.channel.clone(), request);
    assert!(dispatch.is_spawned());
    dispatch.finished().await;

    let response = p.responses.recv().await.unwrap();
    assert_eq!(response.header.msg_id, 1);
    assert_eq!(response.payload.value(), Some(&json!(42)));
    assert_eq!(response.attachments.get(HIDDEN_KEY_CALL_ID), Some(&call_id));
    assert_eq!(p.pending.pending_count(), 0);

    let stats = p.handler.stats().snapshot();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.responses_sent, 1);
}

#[tokio::test]
async fn test_deferred_and_business_results() {
    let mut p = provider();

    p.handler
        .handle(p.channel.clone(), request(1, "com.x.Account", "later", Duration::ZERO))
        .finished()
        .await;
    assert_eq!(
        p.responses.recv().await.unwrap().payload.value(),
        Some(&json!("done"))
    );

    p.handler
        .handle(p.channel.clone(), request(2, "com.x.Account", "fail", Duration::ZERO))
        .finished()
        .await;
    let response = p.responses.recv().await.unwrap();
    assert!(matches!(
        response.payload.exception(),
        Some(RpcError::Application { message, .. }) if message == "insufficient funds"
    ));
    assert!(!response.requires_close());
}

#[tokio::test]
async fn test_panicking_method_becomes_task_failure() {
    let mut p = provider();
    p.handler
        .handle(p.channel.clone(), request(7, "com.x.Account", "boom", Duration::ZERO))
        .finished()
        .await;

    let response = p.responses.recv().await.unwrap();
    let Some(RpcError::TaskFailed(message)) = response.payload.exception() else {
        panic!("expected task failure, got {:?}", response.payload);
    };
    assert!(message.contains("handler exploded"));
}

#[tokio::test]
async fn test_missing_exporter_asks_peer_to_close() {
    let mut p = provider();
    p.registry.unexport("com.x.Account", "", 22000);

    let dispatch = p.handler.handle(
        p.channel.clone(),
        request(3, "com.x.Account", "answer", Duration::ZERO),
    );
    assert!(matches!(dispatch, Dispatch::Rejected));

    let response = p.responses.recv().await.unwrap();
    assert!(response.requires_close());
    let Some(RpcError::Shutdown(message)) = response.payload.exception() else {
        panic!("expected shutdown, got {:?}", response.payload);
    };
    assert_eq!(
        message,
        &format!(
            "[{}]Error occurs while processing request com.x.Account/answer/ from channel {}->{}, caused by:  exporter is not found",
            codes::PROVIDER_EXPORTER_NOT_FOUND,
            REMOTE,
            LOCAL
        )
    );
}

#[tokio::test]
async fn test_expired_request_discarded_silently() {
    let mut p = provider();
    let stale = request(4, "com.x.Account", "answer", Duration::from_millis(10))
        .with_receive_time(Instant::now() - Duration::from_millis(50));

    let dispatch = p.handler.handle(p.channel.clone(), stale);
    assert!(matches!(dispatch, Dispatch::Discarded(DiscardReason::Timeout)));
    assert!(p.responses.try_recv().is_err());
    assert_eq!(p.handler.stats().snapshot().discarded_timeout, 1);
}

#[tokio::test]
async fn test_unwritable_channel_discards() {
    let mut p = provider();
    p.channel.set_writable(false);

    let dispatch = p.handler.handle(
        p.channel.clone(),
        request(5, "com.x.Account", "answer", Duration::ZERO),
    );
    assert!(matches!(
        dispatch,
        Dispatch::Discarded(DiscardReason::Backpressure)
    ));
    assert!(p.responses.try_recv().is_err());
    assert_eq!(p.pending.pending_count(), 0);
}

#[tokio::test]
async fn test_session_and_legacy_id_restore() {
    let mut p = provider();
    p.registry.register_legacy_id(1001, "com.x.Account");

    let compact = request(6, "", "answer", Duration::ZERO).with_session(Arc::new(
        MemorySession::new().with_interface("1001"),
    ));
    p.handler.handle(p.channel.clone(), compact).finished().await;
    assert_eq!(
        p.responses.recv().await.unwrap().payload.value(),
        Some(&json!(42))
    );
}

#[tokio::test]
async fn test_timeout_wins_race_exactly_once() {
    let mut p = provider();
    let sweeper = tokio::spawn(sweep_task(p.pending.clone(), Duration::from_millis(5)));

    let dispatch = p.handler.handle(
        p.channel.clone(),
        request(8, "com.x.Account", "never", Duration::from_millis(30)),
    );
    dispatch.finished().await;
    sweeper.abort();

    let response = p.responses.recv().await.unwrap();
    let Some(RpcError::Timeout(message)) = response.payload.exception() else {
        panic!("expected timeout, got {:?}", response.payload);
    };
    assert!(message.starts_with(&format!("[{}]", codes::COMMON_CALL_TIMEOUT)));
    assert!(p.responses.try_recv().is_err());
    assert_eq!(p.handler.stats().snapshot().responses_sent, 1);
    assert_eq!(p.pending.pending_count(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_each_answered_once() {
    let mut p = provider();
    let mut dispatches = Vec::new();
    for msg_id in 0..10 {
        let method = if msg_id % 2 == 0 { "answer" } else { "later" };
        dispatches.push(p.handler.handle(
            p.channel.clone(),
            request(msg_id, "com.x.Account", method, Duration::ZERO),
        ));
    }
    for dispatch in dispatches {
        dispatch.finished().await;
    }

    let mut seen = Vec::new();
    while let Ok(response) = p.responses.try_recv() {
        seen.push(response.header.msg_id);
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
    assert_eq!(p.handler.stats().snapshot().responses_sent, 10);
}

#[tokio::test]
async fn test_unbounded_client_timeout_is_served() {
    let mut p = provider();
    let dispatch = p.handler.handle(
        p.channel.clone(),
        request(11, "com.x.Account", "answer", Duration::MAX),
    );
    assert!(dispatch.is_spawned());
    dispatch.finished().await;

    assert_eq!(
        p.responses.recv().await.unwrap().payload.value(),
        Some(&json!(42))
    );
    assert_eq!(p.pending.pending_count(), 0);
}
