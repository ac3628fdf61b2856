//! Notifications pushed after a write elsewhere in the application.
//!
//! CRUD handlers call these once their database write has succeeded. The
//! plain `notify_*` calls are fire-and-forget and never fail; the
//! `send_control`/`report_status`/`notify_playlist_displays` calls consult
//! the display directory first and report lookup problems to the caller.

use std::sync::Arc;

use tracing::{debug, info};

use crate::events::{
    ControlCommand, ControlPayload, ControlRequest, DisplayStatusPayload, PlaylistUpdatedPayload,
    StreamEvent,
};
use crate::ports::{CoreError, DisplayDirectory};
use crate::registry::{BroadcastRegistry, Delivery};

/// Bridges application writes to stream events.
#[derive(Clone)]
pub struct Notifier {
    registry: Arc<BroadcastRegistry>,
    directory: Arc<dyn DisplayDirectory>,
}

impl Notifier {
    pub fn new(registry: Arc<BroadcastRegistry>, directory: Arc<dyn DisplayDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Tell one display to run a playback command.
    pub fn notify_control(
        &self,
        display_id: &str,
        command: ControlCommand,
        index: Option<u32>,
    ) -> Delivery {
        let event = StreamEvent::Control(ControlPayload { command, index });
        let delivery = self.registry.emit_to_target(display_id, &event);
        if delivery.delivered == 0 {
            debug!(display_id, %command, "Control command sent to offline display");
        }
        delivery
    }

    /// Tell one display its playlist changed so it re-fetches it.
    pub fn notify_playlist_changed(&self, display_id: &str, playlist_id: &str) -> Delivery {
        let event = StreamEvent::PlaylistUpdated(PlaylistUpdatedPayload {
            playlist_id: playlist_id.to_string(),
        });
        self.registry.emit_to_target(display_id, &event)
    }

    /// Relay a display's playback status to every connected client.
    pub fn broadcast_display_status(&self, status: DisplayStatusPayload) -> Delivery {
        self.registry.emit_all(&StreamEvent::DisplayStatus(status))
    }

    /// Validate and forward a control request from a controller.
    pub async fn send_control(
        &self,
        display_id: &str,
        request: &ControlRequest,
    ) -> Result<Delivery, CoreError> {
        self.ensure_display(display_id).await?;
        let payload = request.validate()?;

        info!(display_id, command = %payload.command, index = ?payload.index, "Sending control command");
        Ok(self.notify_control(display_id, payload.command, payload.index))
    }

    /// Record a status report from a display and relay it.
    ///
    /// The display id from the route wins over any id in the body.
    pub async fn report_status(
        &self,
        display_id: &str,
        mut status: DisplayStatusPayload,
    ) -> Result<Delivery, CoreError> {
        self.ensure_display(display_id).await?;
        self.directory.touch_last_seen(display_id).await?;

        status.display_id = display_id.to_string();
        Ok(self.broadcast_display_status(status))
    }

    /// Notify every display the playlist is assigned to.
    ///
    /// Returns the number of displays notified (online or not).
    pub async fn notify_playlist_displays(&self, playlist_id: &str) -> Result<usize, CoreError> {
        let displays = self.directory.displays_for_playlist(playlist_id).await?;
        for display_id in &displays {
            self.notify_playlist_changed(display_id, playlist_id);
        }

        debug!(playlist_id, displays = displays.len(), "Playlist change notified");
        Ok(displays.len())
    }

    async fn ensure_display(&self, display_id: &str) -> Result<(), CoreError> {
        if self.directory.display_exists(display_id).await? {
            Ok(())
        } else {
            Err(CoreError::NotFound {
                entity: "Display",
                id: display_id.to_string(),
            })
        }
    }
}
