//! Canonical stream events pushed to connected subscribers.
//!
//! The wire format stays untyped (`event: <name>` plus a JSON `data:` line)
//! so arbitrary event names remain possible, but every event the server
//! emits itself goes through [`StreamEvent`]. Sender and handler then share
//! one payload definition per event name.
//!
//! # Wire Names
//!
//! | variant | event name |
//! |---|---|
//! | `Connected` | `connected` |
//! | `Control` | `control` |
//! | `PlaylistUpdated` | `playlist-updated` |
//! | `DisplayStatus` | `display-status` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, FrameError};
use crate::ports::CoreError;

/// Acknowledgement written to a channel right after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    /// Registry id of the new channel.
    pub client_id: String,
    /// Target echoed back; `null` for controller channels.
    pub display_id: Option<String>,
}

/// Playback commands a controller can send to a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Play,
    Pause,
    Next,
    Previous,
    /// Jump to a playlist position; needs an index.
    Skip,
}

impl ControlCommand {
    pub const ALL: [Self; 5] = [Self::Play, Self::Pause, Self::Next, Self::Previous, Self::Skip];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Skip => "skip",
        }
    }

    pub const fn requires_index(self) -> bool {
        matches!(self, Self::Skip)
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlCommand {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Invalid command: {s}")))
    }
}

/// Payload of the `control` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPayload {
    pub command: ControlCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Unvalidated control request as it arrives from a controller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlRequest {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub index: Option<i64>,
}

impl ControlRequest {
    /// Check the command name and the index rule for `skip`.
    pub fn validate(&self) -> Result<ControlPayload, CoreError> {
        let command: ControlCommand = self.command.parse()?;

        let index = match self.index {
            Some(raw) => Some(u32::try_from(raw).map_err(|_| {
                CoreError::Validation(format!("Index out of range: {raw}"))
            })?),
            None => None,
        };

        if command.requires_index() && index.is_none() {
            return Err(CoreError::Validation(
                "Index required for skip command".to_string(),
            ));
        }

        Ok(ControlPayload { command, index })
    }
}

/// Payload of the `playlist-updated` event. Displays re-fetch the playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistUpdatedPayload {
    pub playlist_id: String,
}

/// Playback status reported by a display and relayed to controllers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayStatusPayload {
    /// Filled from the route when a display reports its own status.
    #[serde(default)]
    pub display_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_video_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Every event the server pushes on its own behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Connected(ConnectedPayload),
    Control(ControlPayload),
    PlaylistUpdated(PlaylistUpdatedPayload),
    DisplayStatus(DisplayStatusPayload),
}

impl StreamEvent {
    pub const CONNECTED: &'static str = "connected";
    pub const CONTROL: &'static str = "control";
    pub const PLAYLIST_UPDATED: &'static str = "playlist-updated";
    pub const DISPLAY_STATUS: &'static str = "display-status";

    /// Get the event name used on the `event:` line.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => Self::CONNECTED,
            Self::Control(_) => Self::CONTROL,
            Self::PlaylistUpdated(_) => Self::PLAYLIST_UPDATED,
            Self::DisplayStatus(_) => Self::DISPLAY_STATUS,
        }
    }

    /// Encode as a wire frame (payload only, no envelope).
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let name = self.event_name();
        match self {
            Self::Connected(payload) => Frame::event(name, payload),
            Self::Control(payload) => Frame::event(name, payload),
            Self::PlaylistUpdated(payload) => Frame::event(name, payload),
            Self::DisplayStatus(payload) => Frame::event(name, payload),
        }
    }

    /// Decode a received frame. Unknown event names yield `Ok(None)`.
    pub fn decode(name: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            Self::CONNECTED => Self::Connected(serde_json::from_str(data)?),
            Self::CONTROL => Self::Control(serde_json::from_str(data)?),
            Self::PLAYLIST_UPDATED => Self::PlaylistUpdated(serde_json::from_str(data)?),
            Self::DISPLAY_STATUS => Self::DisplayStatus(serde_json::from_str(data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

impl From<ControlPayload> for StreamEvent {
    fn from(payload: ControlPayload) -> Self {
        Self::Control(payload)
    }
}

impl From<PlaylistUpdatedPayload> for StreamEvent {
    fn from(payload: PlaylistUpdatedPayload) -> Self {
        Self::PlaylistUpdated(payload)
    }
}

impl From<DisplayStatusPayload> for StreamEvent {
    fn from(payload: DisplayStatusPayload) -> Self {
        Self::DisplayStatus(payload)
    }
}
