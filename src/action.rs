//! Action requests and their wire format

use std::fmt;
use std::fmt::Write as _;

use crate::{
    constants::{ACTION_ID_PREFIX, LINE_TERMINATOR},
    error::{AmiError, AmiResult},
    fields::AmiField,
};

/// Reject CR and LF: requests are line-delimited and an embedded line break
/// would let a value inject further fields or a whole second action.
fn validate_no_line_breaks(s: &str, context: &str) -> AmiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AmiError::invalid_field(context));
    }
    Ok(())
}

/// A named manager action with its fields.
///
/// Fields keep their order and may repeat (multi-valued fields such as
/// `Variable`). The `ActionID` is an ordinary field; when absent, the
/// connection generates one before sending.
///
/// ```
/// use asterisk_ami_tokio::Action;
///
/// let action = Action::new("Originate")
///     .field("Channel", "SIP/100")
///     .field("Exten", "200")
///     .field_values("Variable", ["A=1", "B=2"])
///     .with_action_id("call-1");
///
/// let wire = action.to_wire_format().unwrap();
/// assert!(wire.starts_with("Action: Originate\r\n"));
/// assert!(wire.contains("Variable: A=1\r\nVariable: B=2\r\n"));
/// assert!(wire.ends_with("ActionID: call-1\r\n\r\n"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    fields: Vec<(String, String)>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field. Repeating a name sends it once per value.
    pub fn field(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields
            .push((name.into(), value.to_string()));
        self
    }

    /// Append one line per value for a multi-valued field.
    pub fn field_values<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: fmt::Display,
    {
        for value in values {
            self.fields
                .push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Set the action identifier, replacing any existing one.
    pub fn with_action_id(mut self, id: impl Into<String>) -> Self {
        self.set_action_id(id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in send order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First value of a field, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Caller-supplied identifier, if any. An empty value counts as absent.
    pub fn action_id(&self) -> Option<&str> {
        self.get(AmiField::ActionId.as_str())
            .filter(|id| !id.is_empty())
    }

    fn set_action_id(&mut self, id: String) {
        let key = AmiField::ActionId.as_str();
        match self
            .fields
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some((_, value)) => *value = id,
            None => self
                .fields
                .push((key.to_string(), id)),
        }
    }

    /// Return the action's identifier, generating and appending one first
    /// when the caller did not supply it.
    pub(crate) fn ensure_action_id(&mut self, ids: &mut ActionIdGenerator) -> String {
        if let Some(id) = self.action_id() {
            return id.to_string();
        }
        let id = ids.next_id();
        self.set_action_id(id.clone());
        id
    }

    /// Serialize as `Action: <name>`, one line per field, then a blank line.
    pub fn to_wire_format(&self) -> AmiResult<String> {
        validate_no_line_breaks(&self.name, "action name")?;
        let mut wire = String::new();
        let _ = write!(wire, "Action: {}{}", self.name, LINE_TERMINATOR);
        for (key, value) in &self.fields {
            validate_no_line_breaks(key, "field name")?;
            validate_no_line_breaks(value, "field value")?;
            let _ = write!(wire, "{}: {}{}", key, value, LINE_TERMINATOR);
        }
        wire.push_str(LINE_TERMINATOR);
        Ok(wire)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case(AmiField::Secret.as_str()) {
                    (k.as_str(), "[REDACTED]")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("fields", &fields)
            .finish()
    }
}

/// Per-connection source of action identifiers: `A1`, `A2`, ...
///
/// Identifiers never repeat within a connection. Caller-supplied
/// identifiers are not checked against the sequence.
#[derive(Debug, Default)]
pub struct ActionIdGenerator {
    last: u64,
}

impl ActionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.last += 1;
        format!("{}{}", ACTION_ID_PREFIX, self.last)
    }
}
