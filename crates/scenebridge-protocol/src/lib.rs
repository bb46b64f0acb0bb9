//! Wire types shared by the SceneBridge daemon and its clients.
//!
//! Clients send one JSON object per command and receive exactly one JSON
//! object back, in request order. Messages are not newline delimited: several
//! may arrive in one read and one may span many reads, so both sides use the
//! incremental [`FrameDecoder`] to pull complete values out of a byte stream.
//!
//! ```json
//! {"type":"create_object","params":{"name":"Cube","shape":"cube"}}
//! {"status":"ok","result":{"name":"Cube"},"protocol_version":"2.0"}
//! ```

mod command;
mod framing;
mod response;

pub use command::{Command, Params};
pub use framing::{Decoded, FrameDecoder, FrameError, decode_frame};
pub use response::{Response, ResponseStatus};

/// Protocol version stamped on every response the daemon sends.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Reserved command types answered by the bridge itself.
pub mod reserved {
    /// Lists the registered command names.
    pub const HELP: &str = "help";
    /// Echoes [`crate::PROTOCOL_VERSION`].
    pub const PROTOCOL_VERSION: &str = "protocol_version";
    /// Opens a chunked upload session.
    pub const UPLOAD_INIT: &str = "chunked_upload_init";
    /// Appends one hex-encoded chunk to an upload session.
    pub const UPLOAD_CHUNK: &str = "chunked_upload_chunk";
    /// Assembles an upload session and invalidates its identifier.
    pub const UPLOAD_FINALIZE: &str = "chunked_upload_finalize";
    /// Reports the recorded status of a queued job.
    pub const JOB_STATUS: &str = "get_job_status";
    /// Lists registered commands together with their metadata.
    pub const LIST_TOOLS: &str = "list_tools";
    /// Invokes a registered command by name with an argument map.
    pub const CALL_TOOL: &str = "call_tool";

    /// Every reserved command type, sorted.
    pub const ALL: &[&str] = &[
        CALL_TOOL,
        UPLOAD_CHUNK,
        UPLOAD_FINALIZE,
        UPLOAD_INIT,
        JOB_STATUS,
        HELP,
        LIST_TOOLS,
        PROTOCOL_VERSION,
    ];

    /// Returns true when `kind` is answered by the bridge rather than the
    /// command registry.
    #[must_use]
    pub fn is_reserved(kind: &str) -> bool {
        ALL.contains(&kind)
    }
}
