//! Table of known manager actions and their fields
//!
//! Each entry names the fields an action needs and the ones it accepts.
//! [`AmiConnection::invoke`](crate::AmiConnection::invoke) checks required
//! fields against this table before sending. Every action also accepts
//! `ActionID`, which is not listed.

use crate::{
    action::Action,
    error::{AmiError, AmiResult},
};

/// Fields of one manager action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl ActionSpec {
    const fn new(
        name: &'static str,
        required: &'static [&'static str],
        optional: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            required,
            optional,
        }
    }

    /// Whether `field` is one this action understands.
    pub fn accepts(&self, field: &str) -> bool {
        self.required
            .iter()
            .chain(self.optional)
            .any(|f| f.eq_ignore_ascii_case(field))
    }

    /// First required field missing from `action`.
    pub fn missing_field(&self, action: &Action) -> Option<&'static str> {
        self.required
            .iter()
            .copied()
            .find(|field| {
                action
                    .get(field)
                    .is_none()
            })
    }

    /// Fail with [`AmiError::MissingField`] unless every required field is
    /// present.
    pub fn check(&self, action: &Action) -> AmiResult<()> {
        match self.missing_field(action) {
            Some(field) => Err(AmiError::MissingField {
                action: self
                    .name
                    .to_string(),
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }
}

const ORIGINATE_OPTIONAL: &[&str] = &[
    "Exten",
    "Context",
    "Priority",
    "Application",
    "Data",
    "Timeout",
    "CallerID",
    "Variable",
    "Account",
    "Async",
];

/// Known manager actions.
pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec::new("AbsoluteTimeout", &["Channel", "Timeout"], &[]),
    ActionSpec::new("Atxfer", &["Channel", "Exten", "Context", "Priority"], &[]),
    ActionSpec::new("ChangeMonitor", &["Channel", "File"], &[]),
    ActionSpec::new("Command", &["Command"], &[]),
    ActionSpec::new("DBGet", &["Family", "Key"], &[]),
    ActionSpec::new("Events", &["EventMask"], &[]),
    ActionSpec::new("ExtensionState", &["Exten", "Context"], &[]),
    ActionSpec::new("GetVar", &["Channel", "Variable"], &[]),
    ActionSpec::new("Hangup", &["Channel"], &[]),
    ActionSpec::new("IAXPeers", &[], &[]),
    ActionSpec::new("ListCommands", &[], &[]),
    ActionSpec::new("Login", &["Username", "Secret"], &["Events"]),
    ActionSpec::new("Logoff", &[], &[]),
    ActionSpec::new("MailboxCount", &["Mailbox"], &[]),
    ActionSpec::new("MailboxStatus", &["Mailbox"], &[]),
    ActionSpec::new("Monitor", &["Channel"], &["File", "Format", "Mix"]),
    ActionSpec::new("Originate", &["Channel"], ORIGINATE_OPTIONAL),
    ActionSpec::new("ParkedCalls", &[], &[]),
    ActionSpec::new("Ping", &[], &[]),
    ActionSpec::new("QueueAdd", &["Queue", "Interface"], &["Penalty", "MemberName"]),
    ActionSpec::new("QueueRemove", &["Queue", "Interface"], &[]),
    ActionSpec::new("QueueReload", &[], &[]),
    ActionSpec::new("Queues", &[], &[]),
    ActionSpec::new("QueueStatus", &[], &["Queue", "Member"]),
    ActionSpec::new(
        "Redirect",
        &["Channel", "ExtraChannel", "Exten", "Context", "Priority"],
        &[],
    ),
    ActionSpec::new("SetCDRUserField", &["UserField", "Channel"], &["Append"]),
    ActionSpec::new("SetVar", &["Channel", "Variable", "Value"], &[]),
    ActionSpec::new("Status", &["Channel"], &[]),
    ActionSpec::new("StopMonitor", &["Channel"], &[]),
    ActionSpec::new("ZapDialOffhook", &["ZapChannel", "Number"], &[]),
    ActionSpec::new("ZapDNDoff", &["ZapChannel"], &[]),
    ActionSpec::new("ZapDNDon", &["ZapChannel"], &[]),
    ActionSpec::new("ZapHangup", &["ZapChannel"], &[]),
    ActionSpec::new("ZapShowChannels", &[], &[]),
    ActionSpec::new("ZapTransfer", &["ZapChannel"], &[]),
];

/// Look up an action by name, ignoring ASCII case.
pub fn lookup(name: &str) -> Option<&'static ActionSpec> {
    ACTIONS
        .iter()
        .find(|spec| {
            spec.name
                .eq_ignore_ascii_case(name)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        let spec = lookup("originate").unwrap();
        assert_eq!(spec.name, "Originate");
        assert!(spec.accepts("callerid"));
        assert!(!spec.accepts("Queue"));
        assert!(lookup("NoSuchAction").is_none());
    }

    #[test]
    fn test_names_unique() {
        for (i, a) in ACTIONS
            .iter()
            .enumerate()
        {
            for b in &ACTIONS[i + 1..] {
                assert!(!a
                    .name
                    .eq_ignore_ascii_case(b.name));
            }
        }
    }

    #[test]
    fn test_check_reports_first_missing_field() {
        let spec = lookup("Redirect").unwrap();
        let action = Action::new("Redirect")
            .field("Channel", "SIP/100-01")
            .field("ExtraChannel", "SIP/200-02");

        let err = spec
            .check(&action)
            .unwrap_err();
        assert!(matches!(
            err,
            AmiError::MissingField { ref action, ref field } if action == "Redirect" && field == "Exten"
        ));
    }

    #[test]
    fn test_check_matches_field_names_case_insensitively() {
        let spec = lookup("Hangup").unwrap();
        let action = Action::new("Hangup").field("channel", "SIP/100-01");
        assert!(spec
            .check(&action)
            .is_ok());
    }

    #[test]
    fn test_actions_without_required_fields() {
        for name in ["Ping", "Logoff", "ParkedCalls", "Queues", "ZapShowChannels"] {
            let spec = lookup(name).unwrap();
            assert!(spec
                .check(&Action::new(name))
                .is_ok());
        }
    }
}
