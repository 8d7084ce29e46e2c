//! Per-call reply handles for inbound method invocations

use tracing::error;
use zvariant::{OwnedObjectPath, OwnedValue};

// ----------------------------------------------------------------------------
// Well-known Error Names
// ----------------------------------------------------------------------------

/// Standard bus error name for calls naming an unknown method.
pub const ERROR_UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";

/// Standard bus error name for malformed call arguments.
pub const ERROR_INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";

/// Standard bus error name for handler-side failures.
pub const ERROR_FAILED: &str = "org.freedesktop.DBus.Error.Failed";

// ----------------------------------------------------------------------------
// Method Replies
// ----------------------------------------------------------------------------

/// Reply sent back to the originator of an inbound method call.
#[derive(Debug)]
pub enum MethodReply {
    /// Successful return with the reply body (possibly empty).
    Ok(Vec<OwnedValue>),
    /// Protocol-level error named and described for the caller.
    Err { name: String, message: String },
}

impl MethodReply {
    /// Whether this reply is a successful return.
    pub fn is_ok(&self) -> bool {
        matches!(self, MethodReply::Ok(_))
    }
}

/// Transport-supplied callback that carries one reply back to the caller.
pub type ReplySink = Box<dyn FnOnce(MethodReply) + Send>;

// ----------------------------------------------------------------------------
// Invocation Handle
// ----------------------------------------------------------------------------

/// Per-call context used to send exactly one reply to an inbound call.
///
/// `reply` and `reply_error` consume the handle, so a handler cannot answer
/// twice. A handler that drops the handle without answering still produces a
/// reply: the drop guard sends a generic failure so the caller is never left
/// waiting.
pub struct MethodInvocation {
    path: OwnedObjectPath,
    method: String,
    sink: Option<ReplySink>,
}

impl MethodInvocation {
    pub fn new(path: OwnedObjectPath, method: impl Into<String>, sink: ReplySink) -> Self {
        Self {
            path,
            method: method.into(),
            sink: Some(sink),
        }
    }

    /// Path of the object the call was addressed to.
    pub fn path(&self) -> &OwnedObjectPath {
        &self.path
    }

    /// Name of the invoked method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Sends a successful reply with the given body.
    pub fn reply(mut self, body: Vec<OwnedValue>) {
        self.send(MethodReply::Ok(body));
    }

    /// Sends an empty successful reply.
    pub fn reply_empty(self) {
        self.reply(Vec::new());
    }

    /// Sends a protocol-level error reply.
    pub fn reply_error(mut self, name: &str, message: &str) {
        self.send(MethodReply::Err {
            name: name.to_string(),
            message: message.to_string(),
        });
    }

    fn send(&mut self, reply: MethodReply) {
        if let Some(sink) = self.sink.take() {
            sink(reply);
        }
    }
}

impl Drop for MethodInvocation {
    fn drop(&mut self) {
        if self.sink.is_some() {
            error!(
                "Handler for {} on {} dropped its invocation without replying",
                self.method,
                self.path.as_str()
            );
            self.send(MethodReply::Err {
                name: ERROR_FAILED.to_string(),
                message: format!("no reply produced for {}", self.method),
            });
        }
    }
}
