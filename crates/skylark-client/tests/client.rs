//! Client driver tests over an in-memory transport
//!
//! The mock transport is a pair of channels: the test plays the server,
//! reading the frames the client sends and injecting replies.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

use skylark_client::{
    Client, ClientConfig, ClientError, ClientState, Connection, JsonCodec, LoginMode,
    SessionEvents, Transport, TransportError,
};
use skylark_core::{
    Codec, Envelope, HelloPayload, HelloStage, MessageType, OpResult, OpStatus, Payload, UserInfo,
    UserOperation, UserOperationResult,
};

#[derive(Clone, Debug, PartialEq)]
enum Event {
    State(ClientState, Option<ClientState>),
    Error(String),
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl SessionEvents for Recorder {
    fn on_state_change(&mut self, state: ClientState, sub_state: Option<ClientState>) {
        self.events.lock().push(Event::State(state, sub_state));
    }

    fn on_error(&mut self, detail: &str) {
        self.events.lock().push(Event::Error(detail.to_string()));
    }
}

struct MockConnection {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::Send("test harness dropped".to_string()))
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) {}
}

/// Hands out one pre-built connection, then refuses.
struct MockTransport {
    connection: Mutex<Option<Arc<MockConnection>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<Arc<dyn Connection>, TransportError> {
        self.connection
            .lock()
            .take()
            .map(|c| c as Arc<dyn Connection>)
            .ok_or_else(|| TransportError::Connect("no connection available".to_string()))
    }
}

/// Connects fine but every send fails.
struct BrokenWireConnection;

#[async_trait]
impl Connection for BrokenWireConnection {
    async fn send(&self, _frame: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Send("wire down".to_string()))
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(None)
    }

    async fn close(&self) {}
}

struct BrokenWireTransport;

#[async_trait]
impl Transport for BrokenWireTransport {
    async fn connect(&self) -> Result<Arc<dyn Connection>, TransportError> {
        Ok(Arc::new(BrokenWireConnection))
    }
}

struct RefusingTransport;

#[async_trait]
impl Transport for RefusingTransport {
    async fn connect(&self) -> Result<Arc<dyn Connection>, TransportError> {
        Err(TransportError::Connect("refused".to_string()))
    }
}

/// The test's server end of the wire plus the client under test.
struct Harness {
    client: Arc<Client>,
    recorder: Recorder,
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
    codec: JsonCodec,
}

impl Harness {
    fn new(dir: &TempDir) -> Self {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let transport = MockTransport {
            connection: Mutex::new(Some(Arc::new(MockConnection {
                inbound: tokio::sync::Mutex::new(inbound),
                outbound,
            }))),
        };

        let recorder = Recorder::default();
        let config = ClientConfig {
            key_dir: dir.path().to_path_buf(),
            session_name: "test".to_string(),
            ..Default::default()
        };
        let client = Client::new(
            config,
            Arc::new(transport),
            Arc::new(JsonCodec::new()),
            Box::new(recorder.clone()),
        )
        .unwrap();

        Self {
            client: Arc::new(client),
            recorder,
            to_client,
            from_client,
            codec: JsonCodec::new(),
        }
    }

    fn inject(&self, envelope: &Envelope) {
        self.to_client
            .send(self.codec.encode(envelope).unwrap())
            .unwrap();
    }

    async fn next_sent(&mut self) -> Envelope {
        let frame = tokio::time::timeout(Duration::from_secs(5), self.from_client.recv())
            .await
            .expect("client sent nothing within 5s")
            .expect("client side closed");
        self.codec.decode(&frame).unwrap()
    }

    async fn wait_for_state(&self, state: ClientState) {
        for _ in 0..500 {
            if self.client.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "client never reached {state:?}, stuck at {:?}",
            self.client.state()
        );
    }
}

fn server_hello(stage: HelloStage) -> Envelope {
    Envelope::new(Payload::Hello(HelloPayload {
        stage,
        ..Default::default()
    }))
}

#[test_log::test(tokio::test)]
async fn start_sends_hello_and_stop_closes() {
    let dir = TempDir::new().unwrap();
    let mut harness = Harness::new(&dir);

    let client = harness.client.clone();
    let driver = tokio::spawn(async move { client.start().await });

    let hello = harness.next_sent().await;
    assert_eq!(hello.message_type, MessageType::Hello);
    let Payload::Hello(payload) = &hello.payload else {
        panic!("expected hello payload");
    };
    assert_eq!(payload.stage, HelloStage::ClientHello);
    assert_eq!(payload.fingerprint, 0);

    harness.inject(&server_hello(HelloStage::NeedLogin));
    harness.wait_for_state(ClientState::WaitLogin).await;

    harness.client.stop();
    driver.await.unwrap().unwrap();
    assert_eq!(harness.client.state(), ClientState::Closed);

    // Connecting, Connected, Hello, WaitLogin, Closing; Closed is silent
    let states: Vec<_> = harness
        .recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::State(state, _) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            ClientState::Connecting,
            ClientState::Connected,
            ClientState::Hello,
            ClientState::WaitLogin,
            ClientState::Closing,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn silent_server_times_out_the_handshake() {
    let dir = TempDir::new().unwrap();
    let mut harness = Harness::new(&dir);

    let client = harness.client.clone();
    let driver = tokio::spawn(async move { client.start().await });

    let _hello = harness.next_sent().await;
    // No reply ever arrives; paused time auto-advances to the deadline
    driver.await.unwrap().unwrap();

    assert_eq!(harness.client.state(), ClientState::ConnectionLost);
    let events = harness.recorder.events();
    assert!(events.contains(&Event::Error("Handshake timed out".to_string())));
    assert!(events.contains(&Event::State(
        ClientState::ConnectionLost,
        Some(ClientState::Error)
    )));
}

#[tokio::test]
async fn peer_close_is_reported_as_connection_lost() {
    let dir = TempDir::new().unwrap();
    let mut harness = Harness::new(&dir);

    let client = harness.client.clone();
    let driver = tokio::spawn(async move { client.start().await });

    let _hello = harness.next_sent().await;
    harness.inject(&server_hello(HelloStage::NeedLogin));
    harness.wait_for_state(ClientState::WaitLogin).await;

    drop(harness.to_client);
    driver.await.unwrap().unwrap();
    assert_eq!(harness.client.state(), ClientState::ConnectionLost);
}

#[tokio::test]
async fn refused_connect_fails_start() {
    let dir = TempDir::new().unwrap();
    let recorder = Recorder::default();
    let config = ClientConfig {
        key_dir: dir.path().to_path_buf(),
        session_name: "test".to_string(),
        ..Default::default()
    };
    let client = Client::new(
        config,
        Arc::new(RefusingTransport),
        Arc::new(JsonCodec::new()),
        Box::new(recorder.clone()),
    )
    .unwrap();

    let result = client.start().await;
    assert!(matches!(result, Err(ClientError::Transport(_))));
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn failed_hello_send_does_not_wedge_the_client() {
    let dir = TempDir::new().unwrap();
    let config = ClientConfig {
        key_dir: dir.path().to_path_buf(),
        session_name: "test".to_string(),
        ..Default::default()
    };
    let client = Client::new(
        config,
        Arc::new(BrokenWireTransport),
        Arc::new(JsonCodec::new()),
        Box::new(Recorder::default()),
    )
    .unwrap();

    let first = client.start().await;
    assert!(matches!(first, Err(ClientError::Transport(_))));

    // The next attempt must reach the transport again, not bounce off
    // a stale connection handle
    let second = client.start().await;
    assert!(matches!(second, Err(ClientError::Transport(_))));
}

#[tokio::test]
async fn stop_before_start_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(&dir);

    harness.client.stop();
    assert_eq!(harness.client.state(), ClientState::Initial);
    assert!(harness.recorder.events().is_empty());
}

#[tokio::test]
async fn login_before_start_is_rejected() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(&dir);

    let result = harness.client.login(LoginMode::Phone, "+15551234567", "").await;
    assert!(matches!(result, Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn login_round_trip_reaches_ready() {
    let dir = TempDir::new().unwrap();
    let mut harness = Harness::new(&dir);

    let client = harness.client.clone();
    let driver = tokio::spawn(async move { client.start().await });

    let _hello = harness.next_sent().await;
    harness.inject(&server_hello(HelloStage::NeedLogin));
    harness.wait_for_state(ClientState::WaitLogin).await;

    harness
        .client
        .login(LoginMode::Phone, "+15551234567", "")
        .await
        .unwrap();

    let request = harness.next_sent().await;
    assert_eq!(request.message_type, MessageType::UserOperation);
    let Payload::UserOperation(request) = &request.payload else {
        panic!("expected user operation payload");
    };
    assert_eq!(request.operation, UserOperation::Login);
    assert_eq!(request.user.phone, "+15551234567");

    let user = UserInfo::with_phone("+15551234567");
    harness.inject(&Envelope::new(Payload::UserOperationResult(
        UserOperationResult {
            operation: UserOperation::Login,
            result: OpResult::Ok,
            status: OpStatus::LoginOk,
            users: vec![user.clone()],
        },
    )));

    harness.wait_for_state(ClientState::Ready).await;
    assert_eq!(harness.client.user_info(), Some(user));

    harness.client.stop();
    driver.await.unwrap().unwrap();
}

#[tokio::test]
async fn garbage_frames_are_dropped_without_killing_the_session() {
    let dir = TempDir::new().unwrap();
    let mut harness = Harness::new(&dir);

    let client = harness.client.clone();
    let driver = tokio::spawn(async move { client.start().await });

    let _hello = harness.next_sent().await;
    harness.to_client.send(b"not an envelope".to_vec()).unwrap();
    harness.inject(&server_hello(HelloStage::NeedLogin));

    harness.wait_for_state(ClientState::WaitLogin).await;
    harness.client.stop();
    driver.await.unwrap().unwrap();
}
