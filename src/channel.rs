//! Channel state carried in manager events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{fields::AmiField, message::AmiMessage};

/// Channel state as reported in the `ChannelState` (number) and
/// `ChannelStateDesc` (text) fields of `Newstate`, `Newchannel`, `Status`
/// and similar events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[repr(u8)]
pub enum ChannelState {
    /// Channel is down and available
    Down = 0,
    /// Channel is down, but reserved
    Reserved = 1,
    /// Channel is off hook
    OffHook = 2,
    /// Digits (or equivalent) have been dialed
    Dialing = 3,
    /// Line is ringing
    Ring = 4,
    /// Remote end is ringing
    Ringing = 5,
    /// Line is up
    Up = 6,
    /// Line is busy
    Busy = 7,
    /// Digits have been dialed while offhook
    DialingOffhook = 8,
    /// Channel has detected an incoming call and is waiting for ring
    PreRing = 9,
}

impl ChannelState {
    /// Parse from the numeric `ChannelState` field.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Down),
            1 => Some(Self::Reserved),
            2 => Some(Self::OffHook),
            3 => Some(Self::Dialing),
            4 => Some(Self::Ring),
            5 => Some(Self::Ringing),
            6 => Some(Self::Up),
            7 => Some(Self::Busy),
            8 => Some(Self::DialingOffhook),
            9 => Some(Self::PreRing),
            _ => None,
        }
    }

    pub fn as_number(&self) -> u8 {
        *self as u8
    }

    /// `true` once the call is answered.
    pub fn is_up(&self) -> bool {
        *self == Self::Up
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match self {
            Self::Down => "Down",
            Self::Reserved => "Rsrvd",
            Self::OffHook => "OffHook",
            Self::Dialing => "Dialing",
            Self::Ring => "Ring",
            Self::Ringing => "Ringing",
            Self::Up => "Up",
            Self::Busy => "Busy",
            Self::DialingOffhook => "Dialing Offhook",
            Self::PreRing => "Pre-ring",
        };
        f.write_str(desc)
    }
}

/// Error returned when parsing an invalid channel state description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseChannelStateError(pub String);

impl fmt::Display for ParseChannelStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown channel state: {}", self.0)
    }
}

impl std::error::Error for ParseChannelStateError {}

impl FromStr for ChannelState {
    type Err = ParseChannelStateError;

    /// Accepts the `ChannelStateDesc` text (case-insensitive) or the number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<u8>() {
            return Self::from_number(n).ok_or_else(|| ParseChannelStateError(s.to_string()));
        }
        match s
            .to_ascii_lowercase()
            .as_str()
        {
            "down" => Ok(Self::Down),
            "rsrvd" | "reserved" => Ok(Self::Reserved),
            "offhook" => Ok(Self::OffHook),
            "dialing" => Ok(Self::Dialing),
            "ring" => Ok(Self::Ring),
            "ringing" => Ok(Self::Ringing),
            "up" => Ok(Self::Up),
            "busy" => Ok(Self::Busy),
            "dialing offhook" => Ok(Self::DialingOffhook),
            "pre-ring" => Ok(Self::PreRing),
            _ => Err(ParseChannelStateError(s.to_string())),
        }
    }
}

impl AmiMessage {
    /// Channel state from `ChannelState`, falling back to `ChannelStateDesc`.
    pub fn channel_state(&self) -> Option<ChannelState> {
        self.field(AmiField::ChannelState)
            .and_then(|v| v.parse().ok())
            .or_else(|| {
                self.field(AmiField::ChannelStateDesc)?
                    .parse()
                    .ok()
            })
    }
}
