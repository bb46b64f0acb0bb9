//! Commands the bridge answers itself, without consulting the registry.

use scenebridge_protocol::{PROTOCOL_VERSION, Params, reserved};
use serde_json::{Value, json};

use super::Dispatcher;
use super::errors::DispatchError;

/// How a reserved command resolves.
pub(super) enum Reserved {
    /// Answered with a value.
    Answer(Value),
    /// Forwarded to a registry handler under another name.
    CallTool { tool_name: String, arguments: Params },
}

/// Handles `name` if it is reserved. Returns `None` for registry commands.
pub(super) fn answer(
    dispatcher: &Dispatcher,
    name: &str,
    params: &Params,
) -> Option<Result<Reserved, DispatchError>> {
    let outcome = match name {
        reserved::HELP => {
            let mut names = dispatcher.registry.names();
            names.extend_from_slice(reserved::ALL);
            Ok(Reserved::Answer(json!(names)))
        }
        reserved::PROTOCOL_VERSION => Ok(Reserved::Answer(json!(PROTOCOL_VERSION))),
        reserved::UPLOAD_INIT => {
            let upload_id = dispatcher.uploads.init();
            Ok(Reserved::Answer(json!({ "upload_id": upload_id })))
        }
        reserved::UPLOAD_CHUNK => upload_chunk(dispatcher, params),
        reserved::UPLOAD_FINALIZE => upload_finalize(dispatcher, params),
        reserved::JOB_STATUS => job_status(dispatcher, params),
        reserved::LIST_TOOLS => {
            let tools: Vec<_> = dispatcher.registry.descriptors().collect();
            serde_json::to_value(tools)
                .map(Reserved::Answer)
                .map_err(DispatchError::from)
        }
        reserved::CALL_TOOL => call_tool(params),
        _ => return None,
    };
    Some(outcome)
}

fn upload_chunk(dispatcher: &Dispatcher, params: &Params) -> Result<Reserved, DispatchError> {
    let upload_id = required_str(reserved::UPLOAD_CHUNK, params, "upload_id")?;
    let chunk = required_str(reserved::UPLOAD_CHUNK, params, "chunk")?;
    let received = dispatcher.uploads.append(upload_id, chunk)?;
    Ok(Reserved::Answer(json!({ "received": received })))
}

fn upload_finalize(dispatcher: &Dispatcher, params: &Params) -> Result<Reserved, DispatchError> {
    let upload_id = required_str(reserved::UPLOAD_FINALIZE, params, "upload_id")?;
    let size = dispatcher.uploads.finalize(upload_id)?;
    Ok(Reserved::Answer(json!({ "size": size })))
}

fn job_status(dispatcher: &Dispatcher, params: &Params) -> Result<Reserved, DispatchError> {
    let job_id = required_str(reserved::JOB_STATUS, params, "job_id")?;
    let snapshot = dispatcher.jobs.status_of(job_id);
    Ok(Reserved::Answer(serde_json::to_value(snapshot)?))
}

fn call_tool(params: &Params) -> Result<Reserved, DispatchError> {
    let tool_name = required_str(reserved::CALL_TOOL, params, "tool_name")?;
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => Params::new(),
        Some(Value::Object(arguments)) => arguments.clone(),
        Some(_) => {
            return Err(DispatchError::invalid_params(
                reserved::CALL_TOOL,
                "'arguments' must be an object",
            ));
        }
    };
    Ok(Reserved::CallTool {
        tool_name: tool_name.trim().to_owned(),
        arguments,
    })
}

fn required_str<'a>(command: &str, params: &'a Params, key: &str) -> Result<&'a str, DispatchError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DispatchError::invalid_params(command, format!("missing string '{key}'")))
}
