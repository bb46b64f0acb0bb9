//! Unit tests for command routing.

use std::sync::atomic::AtomicBool;
use std::thread;

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::registry::{ArgSpec, HandlerResult, ToolDescriptor};
use crate::uploads::{MemorySink, UploadLimits, UploadSink};

struct Harness {
    dispatcher: Dispatcher,
    jobs: Arc<JobQueue>,
    sink: Arc<MemorySink>,
}

fn build(mode: DispatchMode, job_timeout: Duration) -> Harness {
    let registry = CommandRegistry::builder()
        .register(
            ToolDescriptor::new("echo", "Returns its params")
                .arg(ArgSpec::new("value", "any").describe("Anything")),
            |params: &Params| -> HandlerResult { Ok(Value::Object(params.clone())) },
        )
        .register(ToolDescriptor::new("fail", "Always fails"), |_: &Params| -> HandlerResult {
            Err(HandlerError::new("nothing to delete"))
        })
        .register(ToolDescriptor::new("explode", "Always panics"), |_: &Params| -> HandlerResult {
            panic!("kaboom")
        })
        .build()
        .expect("registry");
    let sink = Arc::new(MemorySink::new());
    let uploads = Arc::new(UploadManager::new(
        UploadLimits {
            expiry: Duration::from_secs(60),
            max_bytes: 1024,
        },
        Arc::clone(&sink) as Arc<dyn UploadSink>,
    ));
    let jobs = Arc::new(JobQueue::new(job_timeout));
    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        uploads,
        Arc::clone(&jobs),
        ExecutionSettings {
            mode,
            job_timeout,
            poll_interval: Duration::from_millis(10),
        },
    );
    Harness {
        dispatcher,
        jobs,
        sink,
    }
}

#[fixture]
fn harness() -> Harness {
    build(DispatchMode::Direct, Duration::from_secs(5))
}

fn command(value: Value) -> Command {
    Command::from_value(value).expect("command")
}

#[rstest]
fn help_lists_registered_then_reserved_names(harness: Harness) {
    let response = harness.dispatcher.dispatch(&Command::bare("help"));
    let mut expected = vec!["echo", "explode", "fail"];
    expected.extend_from_slice(scenebridge_protocol::reserved::ALL);
    assert_eq!(response.result(), Some(&json!(expected)));
    let listed = response.result().and_then(Value::as_array).expect("help array");
    for name in ["get_job_status", "list_tools", "call_tool"] {
        assert!(listed.contains(&json!(name)), "{name} missing from help");
    }
}

#[rstest]
fn protocol_version_is_reported(harness: Harness) {
    let response = harness.dispatcher.dispatch(&Command::bare("protocol_version"));
    assert_eq!(response.result(), Some(&json!("2.0")));
}

#[rstest]
fn registered_handler_result_passes_through(harness: Harness) {
    let response = harness
        .dispatcher
        .dispatch(&command(json!({"type": "echo", "params": {"value": [1, 2]}})));
    assert_eq!(response.result(), Some(&json!({"value": [1, 2]})));
}

#[rstest]
#[case::failure("fail", "nothing to delete")]
#[case::panic("explode", "command 'explode' panicked: kaboom")]
fn handler_failures_become_error_responses(
    harness: Harness,
    #[case] name: &str,
    #[case] message: &str,
) {
    let response = harness.dispatcher.dispatch(&Command::bare(name));
    assert!(!response.is_ok());
    assert_eq!(response.message(), Some(message));
    assert!(response.traceback().is_some());
}

#[rstest]
fn unknown_commands_are_reported(harness: Harness) {
    let response = harness.dispatcher.dispatch(&Command::bare("teleport"));
    assert_eq!(response.message(), Some("Unknown command type: teleport"));
}

#[rstest]
fn list_tools_describes_commands(harness: Harness) {
    let response = harness.dispatcher.dispatch(&Command::bare("list_tools"));
    let tools = response.result().expect("result");
    assert_eq!(tools[0]["name"], json!("echo"));
    assert_eq!(tools[0]["args"][0]["type"], json!("any"));
    assert_eq!(tools.as_array().map(Vec::len), Some(3));
}

#[rstest]
#[case::forwarded(json!({"tool_name": "echo", "arguments": {"a": 1}}), Some(json!({"a": 1})))]
#[case::no_arguments(json!({"tool_name": "echo"}), Some(json!({})))]
#[case::bad_arguments(json!({"tool_name": "echo", "arguments": [1]}), None)]
#[case::missing_name(json!({"arguments": {}}), None)]
fn call_tool_forwards_to_registry(
    harness: Harness,
    #[case] params: Value,
    #[case] expected: Option<Value>,
) {
    let response = harness
        .dispatcher
        .dispatch(&command(json!({"type": "call_tool", "params": params})));
    assert_eq!(response.result(), expected.as_ref());
}

#[rstest]
fn upload_round_trip_through_dispatch(harness: Harness) {
    let init = harness.dispatcher.dispatch(&Command::bare("chunked_upload_init"));
    let upload_id = init.result().expect("result")["upload_id"]
        .as_str()
        .expect("upload id")
        .to_owned();

    for chunk in ["6162", "6364"] {
        let response = harness.dispatcher.dispatch(&command(json!({
            "type": "chunked_upload_chunk",
            "params": {"upload_id": upload_id, "chunk": chunk}
        })));
        assert_eq!(response.result(), Some(&json!({"received": 2})));
    }

    let finalize = command(json!({
        "type": "chunked_upload_finalize",
        "params": {"upload_id": upload_id}
    }));
    let response = harness.dispatcher.dispatch(&finalize);
    assert_eq!(response.result(), Some(&json!({"size": 4})));
    assert_eq!(harness.sink.payload(&upload_id), Some(b"abcd".to_vec()));

    let again = harness.dispatcher.dispatch(&finalize);
    assert_eq!(
        again.message(),
        Some(format!("Unknown upload_id: {upload_id}").as_str())
    );
}

#[test]
fn queued_commands_wait_for_the_drain_step() {
    let harness = build(DispatchMode::Queued, Duration::from_secs(5));
    let Harness {
        dispatcher, jobs, ..
    } = harness;
    let dispatcher = Arc::new(dispatcher);
    let stop = Arc::new(AtomicBool::new(false));

    let waiting = {
        let dispatcher = Arc::clone(&dispatcher);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            dispatcher.execute(
                &Command::new("echo", json!({"n": 7}).as_object().cloned().unwrap_or_default()),
                &stop,
            )
        })
    };

    let deadline = Instant::now() + Duration::from_secs(2);
    while jobs.depth() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    let job_id = jobs.pending_ids().first().copied().expect("queued job");
    assert!(jobs.drain_one().made_progress());

    let response = waiting.join().expect("join waiter");
    assert_eq!(response.result(), Some(&json!({"n": 7})));
    let snapshot = harness_status(&dispatcher, job_id);
    assert_eq!(snapshot["status"], json!("done"));
}

fn harness_status(dispatcher: &Dispatcher, job_id: JobId) -> Value {
    let response = dispatcher.dispatch(&command(json!({
        "type": "get_job_status",
        "params": {"job_id": job_id.to_string()}
    })));
    response.result().cloned().expect("status result")
}

#[test]
fn queued_command_times_out_without_a_drainer() {
    let harness = build(DispatchMode::Queued, Duration::from_millis(50));
    let stop = AtomicBool::new(false);
    let response = harness.dispatcher.execute(&Command::bare("echo"), &stop);
    let message = response.message().expect("error message");
    assert!(message.contains("did not complete"), "unexpected: {message}");
    assert_eq!(harness.jobs.depth(), 1);
}
