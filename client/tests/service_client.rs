//! End-to-end scenarios driven against `MockTransport`, covering unary and
//! streaming calls, dispatch rejection, concurrent call correlation, and
//! disconnect handling.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use replica_client::mock::{MockTransport, RecordedCall};
use replica_client::{
    ChannelSink, ClientError, Correlator, OperationId, RequestContext, ResponseContext,
    ServiceClient, ServiceId, StreamContext, StreamSink,
};
use replica_client_protocol::{
    decode_service_request, encode_service_response, CommandResponse, QueryResponse,
    ServiceRequestBody, ServiceResponse, ServiceResponseBody, StreamResponse,
};
use replica_client_std::traits::codec::{MessageDecoder, MessageEncoder};

#[derive(Clone, Copy)]
struct IdentityCodec;

impl MessageEncoder<Vec<u8>> for IdentityCodec {
    type Error = std::convert::Infallible;

    fn encode(&mut self, item: Vec<u8>) -> Result<Bytes, Self::Error> {
        Ok(Bytes::from(item))
    }
}

impl MessageDecoder<Vec<u8>> for IdentityCodec {
    type Error = std::convert::Infallible;

    fn decode(&mut self, bytes: &mut BytesMut) -> Result<Vec<u8>, Self::Error> {
        Ok(bytes.to_vec())
    }
}

fn make_client() -> (ServiceClient<MockTransport>, MockTransport) {
    let correlator = Arc::new(Correlator::new());
    let transport = MockTransport::new(correlator.clone());
    let id = ServiceId::new("orders", "map");
    let client = ServiceClient::new(id, transport.clone(), correlator);
    (client, transport)
}

async fn wait_for_calls(transport: &MockTransport, n: usize) -> Vec<RecordedCall> {
    for _ in 0..1000 {
        if transport.call_count() >= n {
            return transport.calls();
        }
        tokio::task::yield_now().await;
    }
    panic!("transport never recorded {n} call(s)");
}

fn command_ack(output: Vec<u8>) -> Vec<u8> {
    let response = ServiceResponse {
        body: ServiceResponseBody::Command(CommandResponse {
            context: ResponseContext {
                index: 1,
                output_sequence: 1,
            },
            output,
        }),
    };
    encode_service_response(&response).unwrap()
}

fn query_ack(output: Vec<u8>) -> Vec<u8> {
    let response = ServiceResponse {
        body: ServiceResponseBody::Query(QueryResponse {
            context: ResponseContext {
                index: 1,
                output_sequence: 1,
            },
            output,
        }),
    };
    encode_service_response(&response).unwrap()
}

#[tokio::test]
async fn command_round_trip() {
    let (client, transport) = make_client();
    transport.connect().await.unwrap();

    let handle = tokio::spawn(async move {
        let mut enc = IdentityCodec;
        let mut dec = IdentityCodec;
        client
            .execute::<Vec<u8>, Vec<u8>, _, _>(
                OperationId::command("put"),
                RequestContext::default(),
                vec![0x01, 0x02],
                &mut enc,
                &mut dec,
            )
            .await
    });

    let calls = wait_for_calls(&transport, 1).await;
    let (id, payload) = match &calls[0] {
        RecordedCall::Command(id, payload) => (*id, payload.clone()),
        other => panic!("expected Command, got {other:?}"),
    };

    let request = decode_service_request(&payload).unwrap();
    match request.body {
        ServiceRequestBody::Command(cmd) => assert_eq!(cmd.payload, vec![0x01, 0x02]),
        other => panic!("expected Command body, got {other:?}"),
    }

    transport.respond(id, command_ack(vec![0x03]));

    let (ctx, output) = handle.await.unwrap().unwrap();
    assert_eq!(output, vec![0x03]);
    assert_eq!(ctx.index, 1);
}

#[tokio::test]
async fn query_uses_query_path() {
    let (client, transport) = make_client();
    transport.connect().await.unwrap();

    let handle = tokio::spawn(async move {
        let mut enc = IdentityCodec;
        let mut dec = IdentityCodec;
        client
            .execute::<Vec<u8>, Vec<u8>, _, _>(
                OperationId::query("get"),
                RequestContext::default(),
                vec![0x01, 0x02],
                &mut enc,
                &mut dec,
            )
            .await
    });

    let calls = wait_for_calls(&transport, 1).await;
    let id = match &calls[0] {
        RecordedCall::Query(id, _) => *id,
        other => panic!("expected Query, got {other:?}"),
    };

    transport.respond(id, query_ack(vec![0x03]));
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn unsupported_kind_touches_no_transport() {
    let (client, transport) = make_client();
    transport.connect().await.unwrap();

    let mut enc = IdentityCodec;
    let mut dec = IdentityCodec;
    let err = client
        .execute::<Vec<u8>, Vec<u8>, _, _>(
            OperationId::new("put", "INVALID_SENTINEL"),
            RequestContext::default(),
            vec![0x01],
            &mut enc,
            &mut dec,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::UnsupportedOperation(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn concurrent_calls_match_responses_to_callers() {
    let (client, transport) = make_client();
    transport.connect().await.unwrap();

    let client_a = client.clone();
    let handle_a = tokio::spawn(async move {
        let mut enc = IdentityCodec;
        let mut dec = IdentityCodec;
        client_a
            .execute::<Vec<u8>, Vec<u8>, _, _>(
                OperationId::command("put"),
                RequestContext::default(),
                vec![0xAA],
                &mut enc,
                &mut dec,
            )
            .await
    });

    let calls = wait_for_calls(&transport, 1).await;
    let id_a = match &calls[0] {
        RecordedCall::Command(id, _) => *id,
        other => panic!("expected Command, got {other:?}"),
    };

    let client_b = client.clone();
    let handle_b = tokio::spawn(async move {
        let mut enc = IdentityCodec;
        let mut dec = IdentityCodec;
        client_b
            .execute::<Vec<u8>, Vec<u8>, _, _>(
                OperationId::command("put"),
                RequestContext::default(),
                vec![0xBB],
                &mut enc,
                &mut dec,
            )
            .await
    });

    let calls = wait_for_calls(&transport, 2).await;
    let id_b = match &calls[1] {
        RecordedCall::Command(id, _) => *id,
        other => panic!("expected Command, got {other:?}"),
    };

    // Server responds out of order: B before A.
    transport.respond(id_b, command_ack(vec![0xB0]));
    transport.respond(id_a, command_ack(vec![0xA0]));

    let (_, out_a) = handle_a.await.unwrap().unwrap();
    let (_, out_b) = handle_b.await.unwrap().unwrap();
    assert_eq!(out_a, vec![0xA0]);
    assert_eq!(out_b, vec![0xB0]);
}

struct RecordingSink {
    items: std::sync::Arc<parking_lot::Mutex<Vec<Vec<u8>>>>,
    completed: std::sync::Arc<parking_lot::Mutex<bool>>,
    errors: std::sync::Arc<parking_lot::Mutex<Vec<ClientError>>>,
}

impl StreamSink<(StreamContext, Vec<u8>)> for RecordingSink {
    fn next(&mut self, item: (StreamContext, Vec<u8>)) {
        self.items.lock().push(item.1);
    }

    fn complete(&mut self) {
        *self.completed.lock() = true;
    }

    fn error(&mut self, err: ClientError) {
        self.errors.lock().push(err);
    }
}

fn stream_frame(output: Vec<u8>) -> Vec<u8> {
    let response = ServiceResponse {
        body: ServiceResponseBody::Stream(StreamResponse {
            context: StreamContext::default(),
            output,
        }),
    };
    encode_service_response(&response).unwrap()
}

#[tokio::test]
async fn stream_delivers_frames_in_order_then_completes() {
    let (client, transport) = make_client();
    transport.connect().await.unwrap();

    let items = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let completed = std::sync::Arc::new(parking_lot::Mutex::new(false));
    let errors = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = RecordingSink {
        items: items.clone(),
        completed: completed.clone(),
        errors: errors.clone(),
    };

    let handle = tokio::spawn(async move {
        let mut enc = IdentityCodec;
        client
            .execute_stream::<Vec<u8>, Vec<u8>, _, _, _>(
                OperationId::query("watch"),
                RequestContext::default(),
                vec![0x00],
                &mut enc,
                IdentityCodec,
                sink,
            )
            .await
    });

    let calls = wait_for_calls(&transport, 1).await;
    let id = match &calls[0] {
        RecordedCall::Query(id, _) => *id,
        other => panic!("expected Query, got {other:?}"),
    };

    transport.respond(id, stream_frame(vec![0x10]));
    transport.respond(id, stream_frame(vec![0x11]));
    transport.respond(id, stream_frame(vec![0x12]));
    transport.end_stream(id);

    handle.await.unwrap().unwrap();

    assert_eq!(*items.lock(), vec![vec![0x10], vec![0x11], vec![0x12]]);
    assert!(*completed.lock());
    assert!(errors.lock().is_empty());
}

#[tokio::test]
async fn disconnect_fails_unary_and_stream_and_drains_correlator() {
    let correlator = Arc::new(Correlator::new());
    let transport = MockTransport::new(correlator.clone());
    transport.connect().await.unwrap();
    let client = ServiceClient::new(ServiceId::new("orders", "map"), transport.clone(), correlator.clone());

    let client_unary = client.clone();
    let unary_handle = tokio::spawn(async move {
        let mut enc = IdentityCodec;
        let mut dec = IdentityCodec;
        client_unary
            .execute::<Vec<u8>, Vec<u8>, _, _>(
                OperationId::command("put"),
                RequestContext::default(),
                vec![0x01],
                &mut enc,
                &mut dec,
            )
            .await
    });

    wait_for_calls(&transport, 1).await;

    let errors = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = RecordingSink {
        items: std::sync::Arc::new(parking_lot::Mutex::new(Vec::new())),
        completed: std::sync::Arc::new(parking_lot::Mutex::new(false)),
        errors: errors.clone(),
    };

    let client_stream = client.clone();
    let stream_handle = tokio::spawn(async move {
        let mut enc = IdentityCodec;
        client_stream
            .execute_stream::<Vec<u8>, Vec<u8>, _, _, _>(
                OperationId::query("watch"),
                RequestContext::default(),
                vec![0x00],
                &mut enc,
                IdentityCodec,
                sink,
            )
            .await
    });

    wait_for_calls(&transport, 2).await;

    transport.disconnect("simulated transport failure");

    let unary_result = unary_handle.await.unwrap();
    assert!(matches!(unary_result, Err(ClientError::TransportFailure(_))));

    stream_handle.await.unwrap().unwrap();
    assert_eq!(errors.lock().len(), 1);
    assert!(matches!(errors.lock()[0], ClientError::TransportFailure(_)));
}
