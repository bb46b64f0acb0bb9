//! Behavioural tests for bridge command sessions over TCP.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use scenebridge_config::Config;
use serde_json::{Value, json};

use super::support::{TestBridge, TestClient, test_config};

struct BridgeWorld {
    bridge: Option<TestBridge>,
    client: Option<TestClient>,
    second: Option<TestClient>,
    responses: Vec<Value>,
}

impl BridgeWorld {
    fn new() -> Self {
        Self {
            bridge: None,
            client: None,
            second: None,
            responses: Vec::new(),
        }
    }

    fn start(&mut self, config: Config) {
        self.bridge = Some(TestBridge::start(config));
    }

    fn bridge(&self) -> &TestBridge {
        self.bridge.as_ref().expect("bridge should be running")
    }

    fn client(&mut self) -> &mut TestClient {
        if self.client.is_none() {
            self.client = Some(self.bridge().connect());
        }
        self.client.as_mut().expect("client connected")
    }

    fn collect(&mut self, count: usize) {
        for _ in 0..count {
            let response = self.client().read_response();
            self.responses.push(response);
        }
    }

    fn wait_for_active(&self, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.bridge().active_connections() == expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn only_message(&self) -> String {
        let [response] = self.responses.as_slice() else {
            panic!("expected one response, got {:?}", self.responses);
        };
        assert_eq!(response["status"], json!("error"), "response: {response}");
        response["message"]
            .as_str()
            .expect("error message")
            .to_owned()
    }
}

#[fixture]
fn world() -> RefCell<BridgeWorld> {
    RefCell::new(BridgeWorld::new())
}

#[given("a bridge serving the reference scene")]
fn given_bridge(world: &RefCell<BridgeWorld>) {
    world.borrow_mut().start(test_config());
}

#[given("a bridge with a message ceiling of {limit} bytes")]
fn given_message_ceiling(world: &RefCell<BridgeWorld>, limit: usize) {
    world.borrow_mut().start(Config {
        max_message_bytes: limit,
        ..test_config()
    });
}

#[given("a bridge that only admits a remote peer")]
fn given_remote_only(world: &RefCell<BridgeWorld>) {
    world.borrow_mut().start(Config {
        allowed_peers: vec!["10.0.0.1".to_owned()],
        ..test_config()
    });
}

#[given("a bridge limited to {limit} connection")]
fn given_connection_limit(world: &RefCell<BridgeWorld>, limit: usize) {
    world.borrow_mut().start(Config {
        max_connections: limit,
        ..test_config()
    });
}

#[when("a client pipelines {count} create_object commands in one write")]
fn when_pipelined(world: &RefCell<BridgeWorld>, count: usize) {
    let batch = r#"{"type": "create_object"}"#.repeat(count);
    let mut world = world.borrow_mut();
    world.client().send_raw(batch.as_bytes());
    world.collect(count);
}

#[when("a client sends help one byte at a time")]
fn when_byte_at_a_time(world: &RefCell<BridgeWorld>) {
    let mut world = world.borrow_mut();
    let client = world.client();
    for byte in br#"{"type": "help"}"#.iter() {
        client.send_raw(std::slice::from_ref(byte));
        std::thread::sleep(Duration::from_millis(2));
    }
    world.collect(1);
}

#[when("a client sends an unknown command")]
fn when_unknown(world: &RefCell<BridgeWorld>) {
    let mut world = world.borrow_mut();
    world.client().send(&json!({"type": "teleport"}));
    world.collect(1);
}

#[when("a client sends malformed JSON")]
fn when_malformed(world: &RefCell<BridgeWorld>) {
    let mut world = world.borrow_mut();
    world.client().send_raw(b"{\"type\": ]");
    world.collect(1);
}

#[when("a client sends {size} bytes of an unfinished command")]
fn when_oversized(world: &RefCell<BridgeWorld>, size: usize) {
    let prefix = r#"{"type": "create_object", "params": {"name": ""#;
    let padding = "x".repeat(size.saturating_sub(prefix.len()));
    let mut world = world.borrow_mut();
    world.client().send_raw(format!("{prefix}{padding}").as_bytes());
    world.collect(1);
}

#[when("a client connects")]
fn when_client_connects(world: &RefCell<BridgeWorld>) {
    world.borrow_mut().client();
}

#[when("a second client connects while the first is active")]
fn when_second_client(world: &RefCell<BridgeWorld>) {
    let mut world = world.borrow_mut();
    world.client();
    assert!(world.wait_for_active(1), "first client was not admitted");
    let second = world.bridge().connect();
    world.second = Some(second);
}

#[then("the client receives {count} ok responses")]
fn then_ok_responses(world: &RefCell<BridgeWorld>, count: usize) {
    let world = world.borrow();
    assert_eq!(world.responses.len(), count);
    for response in &world.responses {
        assert_eq!(response["status"], json!("ok"), "response: {response}");
        assert_eq!(response["protocol_version"], json!("2.0"));
    }
}

#[then("the objects are named Cube, Cube.001 and Cube.002")]
fn then_named_in_order(world: &RefCell<BridgeWorld>) {
    let world = world.borrow();
    let names: Vec<&Value> = world
        .responses
        .iter()
        .map(|response| &response["result"]["name"])
        .collect();
    assert_eq!(names, [&json!("Cube"), &json!("Cube.001"), &json!("Cube.002")]);
    assert_eq!(world.bridge().scene.objects().len(), 3);
}

#[then("the help result lists the reference commands")]
fn then_help_lists(world: &RefCell<BridgeWorld>) {
    let world = world.borrow();
    let result = &world.responses.first().expect("help response")["result"];
    let mut expected = vec![
        "assign_material",
        "clear_scene",
        "create_object",
        "delete_object",
        "list_objects",
    ];
    expected.extend_from_slice(scenebridge_protocol::reserved::ALL);
    assert_eq!(result, &json!(expected));
}

#[then("the client receives an unknown command error")]
fn then_unknown_error(world: &RefCell<BridgeWorld>) {
    assert_eq!(world.borrow().only_message(), "Unknown command type: teleport");
}

#[then("the client receives an invalid JSON error")]
fn then_invalid_json(world: &RefCell<BridgeWorld>) {
    let message = world.borrow().only_message();
    assert!(message.starts_with("Invalid JSON"), "message: {message}");
}

#[then("the client receives a message too large error")]
fn then_too_large(world: &RefCell<BridgeWorld>) {
    let message = world.borrow().only_message();
    assert!(message.starts_with("Message too large"), "message: {message}");
    assert!(message.ends_with("1024 byte limit"), "message: {message}");
}

#[then("the connection still answers protocol_version")]
fn then_still_usable(world: &RefCell<BridgeWorld>) {
    let mut world = world.borrow_mut();
    let response = world.client().request(&json!({"type": "protocol_version"}));
    assert_eq!(response["result"], json!("2.0"));
}

#[then("the bridge closes the connection")]
fn then_closed(world: &RefCell<BridgeWorld>) {
    assert!(world.borrow_mut().client().closed_by_peer());
}

#[then("the bridge closes the connection without a response")]
fn then_refused(world: &RefCell<BridgeWorld>) {
    let mut world = world.borrow_mut();
    assert!(
        world.client().closed_by_peer(),
        "refused client should see EOF"
    );
}

#[then("the second client is closed without a response")]
fn then_second_refused(world: &RefCell<BridgeWorld>) {
    let mut world = world.borrow_mut();
    let second = world.second.as_mut().expect("second client");
    assert!(second.closed_by_peer(), "second client should see EOF");
}

#[scenario(
    path = "tests/features/bridge_session.feature",
    name = "Pipelined commands are answered in order"
)]
fn pipelined_commands(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_session.feature",
    name = "A command split across writes is answered once"
)]
fn split_command(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_session.feature",
    name = "Unknown commands leave the connection usable"
)]
fn unknown_command(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_session.feature",
    name = "Malformed input is reported and discarded"
)]
fn malformed_input(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_session.feature",
    name = "Oversized messages close the connection"
)]
fn oversized_message(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_session.feature",
    name = "Peers outside the allow-list are refused"
)]
fn allow_list_refusal(world: RefCell<BridgeWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/bridge_session.feature",
    name = "Connections beyond the limit are refused"
)]
fn capacity_refusal(world: RefCell<BridgeWorld>) {
    drop(world);
}
