//! Manager frame parsing and the parsed message type

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    constants::{END_COMMAND, EVENT_LIST_COMPLETE, EVENT_LIST_START, LINE_TERMINATOR},
    error::{AmiError, AmiResult},
    fields::{AmiField, ResponseStatus},
};

/// Kind of a manager frame, taken from the name of its first field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// `Response: <status>` frame answering an action
    Response,
    /// `Event: <name>` frame
    Event,
    /// No frame was available (end-of-stream or read timeout)
    Timeout,
    /// Any other first field; kept so the caller still sees the fields
    Unknown(String),
}

impl MessageKind {
    /// Classify from the first field name (case-insensitive).
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name
            .to_ascii_lowercase()
            .as_str()
        {
            "response" => MessageKind::Response,
            "event" => MessageKind::Event,
            "" => MessageKind::Timeout,
            _ => MessageKind::Unknown(type_name.to_string()),
        }
    }
}

/// Ordered `key: value` fields of a frame.
///
/// Keys are stored as received. Setting an existing key replaces its value in
/// place, so a repeated field keeps the last value and the first position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Set a field, replacing an existing value with the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(k, _)| *k == key)
        {
            Some((_, existing)) => *existing = value,
            None => self
                .0
                .push((key, value)),
        }
    }

    /// Look up a field, preferring an exact key match and falling back to a
    /// case-insensitive one.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
            })
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key)
            .is_some()
    }

    /// Fields in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.0
            .is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// A parsed manager frame.
///
/// `data` carries multi-line command output, either the inline payload of a
/// `Follows` response or the joined `Output:` lines. `events` is only set on
/// the head response of an event list and holds the list members in arrival
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiMessage {
    kind: MessageKind,
    fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    events: Option<Vec<AmiMessage>>,
}

impl AmiMessage {
    pub fn new(kind: MessageKind, fields: Fields) -> Self {
        Self {
            kind,
            fields,
            data: None,
            events: None,
        }
    }

    /// The degenerate message produced when no frame was available.
    pub fn timeout() -> Self {
        Self::new(MessageKind::Timeout, Fields::new())
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn is_response(&self) -> bool {
        self.kind == MessageKind::Response
    }

    pub fn is_event(&self) -> bool {
        self.kind == MessageKind::Event
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == MessageKind::Timeout
    }

    /// All fields in arrival order.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Look up a field by name. See [`Fields::get`] for case handling.
    pub fn field(&self, name: impl AsRef<str>) -> Option<&str> {
        self.fields
            .get(name.as_ref())
    }

    /// `ActionID` field.
    pub fn action_id(&self) -> Option<&str> {
        self.field(AmiField::ActionId)
    }

    /// Raw `Response` field (`Success`, `Error`, `Follows`, ...).
    pub fn status(&self) -> Option<&str> {
        self.field(AmiField::Response)
    }

    /// `Response` field parsed into a [`ResponseStatus`].
    pub fn response_status(&self) -> Option<ResponseStatus> {
        self.status()?
            .parse()
            .ok()
    }

    /// `true` for `Response: Success` and `Response: Follows`.
    pub fn is_success(&self) -> bool {
        matches!(
            self.response_status(),
            Some(ResponseStatus::Success | ResponseStatus::Follows)
        )
    }

    /// `Message` field, the human-readable outcome of an action.
    pub fn message(&self) -> Option<&str> {
        self.field(AmiField::Message)
    }

    /// `Event` field.
    pub fn event_name(&self) -> Option<&str> {
        self.field(AmiField::Event)
    }

    /// Multi-line command output.
    pub fn data(&self) -> Option<&str> {
        self.data
            .as_deref()
    }

    /// Members of an aggregated event list.
    pub fn events(&self) -> Option<&[AmiMessage]> {
        self.events
            .as_deref()
    }

    pub(crate) fn set_events(&mut self, events: Vec<AmiMessage>) {
        self.events = Some(events);
    }

    /// Head of an event list (`EventList: start`).
    pub fn is_event_list_start(&self) -> bool {
        self.field(AmiField::EventList)
            .is_some_and(|v| v.eq_ignore_ascii_case(EVENT_LIST_START))
    }

    /// Terminal frame of an event list (`EventList: Complete`).
    pub fn is_event_list_complete(&self) -> bool {
        self.field(AmiField::EventList)
            .is_some_and(|v| v.eq_ignore_ascii_case(EVENT_LIST_COMPLETE))
    }

    /// Convert to a result based on the response status.
    ///
    /// ```
    /// # use asterisk_ami_tokio::parse_message;
    /// let ok = parse_message("Response: Success\r\nActionID: A1\r\nMessage: Pong");
    /// assert!(ok.into_result().is_ok());
    ///
    /// let err = parse_message("Response: Error\r\nActionID: A2\r\nMessage: No such channel");
    /// assert!(err.into_result().is_err());
    /// ```
    pub fn into_result(self) -> AmiResult<Self> {
        if self.is_success() || self.response_status() == Some(ResponseStatus::Goodbye) {
            return Ok(self);
        }
        let message = self
            .message()
            .or_else(|| self.status())
            .unwrap_or("no response status")
            .to_string();
        Err(AmiError::ActionFailed { message })
    }
}

/// Parse one frame (terminator already stripped) into a message.
///
/// Never fails: malformed lines degrade to empty values, and an unrecognized
/// first field yields [`MessageKind::Unknown`].
pub fn parse_message(frame: &str) -> AmiMessage {
    let mut lines: Vec<&str> = frame
        .split(LINE_TERMINATOR)
        .collect();
    // A stray CRLF between frames lands at the front of the next one.
    let leading = lines
        .iter()
        .take_while(|line| {
            line.trim()
                .is_empty()
        })
        .count();
    lines.drain(..leading);

    let (type_name, status) = lines
        .first()
        .map(|first| split_field(first))
        .unwrap_or(("", ""));
    let kind = MessageKind::from_type_name(type_name);

    let mut data = None;
    if kind == MessageKind::Response && ResponseStatus::carries_inline_output(status) && lines.len() > 1 {
        if let Some(last) = lines.last() {
            if let Some(end) = last.find(END_COMMAND) {
                data = Some(strip_line_break(&last[..end]).to_string());
                lines.pop();
            }
        }
    }

    let have_data = data.is_some();
    let mut output = Vec::new();
    let mut fields = Fields::new();
    for line in lines {
        if line
            .trim()
            .is_empty()
        {
            continue;
        }
        let (key, value) = split_field(line);
        if !have_data && key.eq_ignore_ascii_case(AmiField::Output.as_str()) {
            output.push(value);
            continue;
        }
        fields.insert(key, value);
    }
    if !have_data && !output.is_empty() {
        data = Some(output.join("\n"));
    }

    trace!("[RECV] Parsed {:?} frame with {} fields", kind, fields.len());

    AmiMessage {
        kind,
        fields,
        data,
        events: None,
    }
}

/// Split on the first colon; both halves trimmed, missing colon gives an empty value.
fn split_field(line: &str) -> (&str, &str) {
    match line.split_once(':') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line.trim(), ""),
    }
}

fn strip_line_break(s: &str) -> &str {
    let s = s
        .strip_suffix('\n')
        .unwrap_or(s);
    s.strip_suffix('\r')
        .unwrap_or(s)
}
