//! Typed field names and response statuses of manager frames.

define_wire_enum! {
    parse_error: ParseAmiFieldError => "manager field",
    /// Field names with protocol meaning or in common use across events.
    ///
    /// Use with [`AmiMessage::field()`](crate::AmiMessage::field) for typed
    /// lookups. Lookups through this enum ignore case.
    pub enum AmiField {
        Response => "Response",
        Event => "Event",
        Action => "Action",
        ActionId => "ActionID",
        EventList => "EventList",
        Message => "Message",
        Output => "Output",
        Privilege => "Privilege",
        Username => "Username",
        Secret => "Secret",
        Channel => "Channel",
        Uniqueid => "Uniqueid",
        Linkedid => "Linkedid",
        ChannelState => "ChannelState",
        ChannelStateDesc => "ChannelStateDesc",
        CallerIdNum => "CallerIDNum",
        CallerIdName => "CallerIDName",
        Context => "Context",
        Exten => "Exten",
        Priority => "Priority",
        Queue => "Queue",
        Cause => "Cause",
        Val => "Val",
    }
}

define_wire_enum! {
    parse_error: ParseResponseStatusError => "response status",
    /// Value of the `Response` field.
    pub enum ResponseStatus {
        Success => "Success",
        Error => "Error",
        /// Command output follows inline, ended by `--END COMMAND--`.
        Follows => "Follows",
        /// Reply to `Logoff`.
        Goodbye => "Goodbye",
    }
}

impl ResponseStatus {
    /// Statuses whose frame may end with inline command output.
    ///
    /// Matched exactly (case-sensitive) against the wire value.
    pub(crate) fn carries_inline_output(status: &str) -> bool {
        status == ResponseStatus::Success.as_str() || status == ResponseStatus::Follows.as_str()
    }
}
