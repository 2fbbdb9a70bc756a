//! Manager message parsing and construction
//!
//! Everything on the manager socket is a block of `Key: Value` lines ending
//! with a blank line: requests, responses, and events all share the shape.
//! `AmiMessage` is the decoded form, `AmiAction` builds outgoing requests.

use crate::constants;
use std::fmt;

/// A decoded manager message
///
/// Fields keep their wire order; `get` returns the first occurrence of a
/// key (duplicate keys are legal in the protocol and later occurrences are
/// preserved but never shadow the first).
#[derive(Debug, Clone, Default)]
pub struct AmiMessage {
    fields: Vec<(String, String)>,
}

impl AmiMessage {
    /// Create an empty message
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Parse a raw field block.
    ///
    /// Each line splits on the first `": "`; lines without the separator
    /// (like the greeting banner) are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut fields = Vec::new();

        for line in raw.lines() {
            if let Some((key, value)) = line.split_once(constants::KEY_VALUE_SEPARATOR) {
                fields.push((key.to_string(), value.trim_end().to_string()));
            }
        }

        Self { fields }
    }

    /// Append a field
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// First value for a key
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All fields in wire order
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Whether the block decoded to nothing recognizable
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// An event carries an `Event` field
    pub fn is_event(&self) -> bool {
        self.get("Event").is_some()
    }

    /// A query reply carries `Response` and/or `ActionID`
    pub fn is_response(&self) -> bool {
        self.get("Response").is_some() || self.get("ActionID").is_some()
    }

    /// `Response: Success`
    pub fn is_success(&self) -> bool {
        self.get("Response") == Some(constants::RESPONSE_SUCCESS)
    }

    /// `Response: Error`
    pub fn is_error(&self) -> bool {
        self.get("Response") == Some(constants::RESPONSE_ERROR)
    }

    /// Error detail from the `Message` field
    pub fn message_text(&self) -> Option<&str> {
        self.get("Message")
    }

    // Common event fields with convenient accessors

    /// Event name
    pub fn event_name(&self) -> Option<&str> {
        self.get("Event")
    }

    /// Correlation token echoed on replies
    pub fn action_id(&self) -> Option<&str> {
        self.get("ActionID")
    }

    /// Channel identifier of this leg
    pub fn unique_id(&self) -> Option<&str> {
        self.get("Uniqueid")
    }

    /// Call-group identifier shared by the call's channels
    pub fn linked_id(&self) -> Option<&str> {
        self.get("Linkedid")
    }

    /// Channel name, e.g. `SIP/1001-00000abc`
    pub fn channel(&self) -> Option<&str> {
        self.get("Channel")
    }

    /// Dialplan context
    pub fn context(&self) -> Option<&str> {
        self.get("Context")
    }

    /// Dialed extension
    pub fn exten(&self) -> Option<&str> {
        self.get("Exten")
    }

    /// Numeric channel-state code
    pub fn channel_state(&self) -> Option<i32> {
        self.get("ChannelState").and_then(|s| s.parse().ok())
    }

    /// Human channel-state description
    pub fn channel_state_desc(&self) -> Option<&str> {
        self.get("ChannelStateDesc")
    }

    /// Caller ID number
    pub fn caller_id_num(&self) -> Option<&str> {
        self.get("CallerIDNum")
    }

    /// Caller ID name
    pub fn caller_id_name(&self) -> Option<&str> {
        self.get("CallerIDName")
    }

    /// Connected line number
    pub fn connected_line_num(&self) -> Option<&str> {
        self.get("ConnectedLineNum")
    }

    /// Connected line name
    pub fn connected_line_name(&self) -> Option<&str> {
        self.get("ConnectedLineName")
    }

    /// Hangup cause code
    pub fn cause(&self) -> Option<&str> {
        self.get("Cause")
    }

    /// Dial status on DialEnd
    pub fn dial_status(&self) -> Option<&str> {
        self.get("DialStatus")
    }

    /// Raw dial string on DialBegin, e.g. `PJSIP/999888777@trunk-out`
    pub fn dial_string(&self) -> Option<&str> {
        self.get("DialString")
    }

    /// Destination caller ID number on dial events
    pub fn dest_caller_id_num(&self) -> Option<&str> {
        self.get("DestCallerIDNum")
    }

    /// Bridge instance identifier
    pub fn bridge_unique_id(&self) -> Option<&str> {
        self.get("BridgeUniqueid")
    }

    /// Extension-status numeric code
    pub fn status_code(&self) -> Option<i32> {
        self.get("Status").and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for AmiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmiMessage {{")?;

        if let Some(event) = self.event_name() {
            write!(f, " Event: {}", event)?;
        }
        if let Some(response) = self.get("Response") {
            write!(f, " Response: {}", response)?;
        }
        if let Some(uid) = self.unique_id() {
            write!(f, ", Uniqueid: {}", uid)?;
        }
        if let Some(lid) = self.linked_id() {
            write!(f, ", Linkedid: {}", lid)?;
        }

        write!(f, ", fields: {} }}", self.fields.len())
    }
}

/// An outgoing manager action
///
/// Built fluently and serialized by the codec's encoder:
///
/// ```
/// use vigia_ami::AmiAction;
///
/// let login = AmiAction::new("Login")
///     .field("Username", "monitor")
///     .field("Secret", "secret")
///     .field("Events", "on");
/// assert!(login.to_wire().ends_with("\r\n\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct AmiAction {
    fields: Vec<(String, String)>,
}

impl AmiAction {
    /// Create an action with the given `Action` name
    pub fn new(action: &str) -> Self {
        Self {
            fields: vec![("Action".to_string(), action.to_string())],
        }
    }

    /// Append a field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Attach the correlation token
    pub fn with_action_id(self, id: u64) -> Self {
        self.field("ActionID", id.to_string())
    }

    /// The action name
    pub fn name(&self) -> &str {
        self.fields
            .first()
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    /// All fields in send order
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Serialize to the wire format
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(constants::KEY_VALUE_SEPARATOR);
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}
