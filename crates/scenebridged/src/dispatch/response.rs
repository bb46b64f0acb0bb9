//! Response serialisation for the session loop.

use std::io::Write;

use scenebridge_protocol::{PROTOCOL_VERSION, Response};

use super::errors::DispatchError;

/// Writer that stamps and serialises response envelopes.
///
/// Each envelope is followed by a newline. The protocol does not require the
/// separator, but it keeps captured traffic readable.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps an output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Stamps the protocol version, writes the envelope and flushes.
    ///
    /// The envelope is serialised in full before anything reaches the
    /// stream, then handed over in a single `write_all`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub fn write_response(&mut self, response: Response) -> Result<(), DispatchError> {
        let mut frame = serde_json::to_vec(&response.stamp(PROTOCOL_VERSION))?;
        frame.push(b'\n');
        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the envelope for `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub fn write_error(&mut self, error: &DispatchError) -> Result<(), DispatchError> {
        self.write_response(error.to_response())
    }
}
