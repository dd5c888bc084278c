//! Event system for editor notifications.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! The renderer, a form wrapper and tests all want to hear about changes,
//! but none of them should be borrowed by the editor. A
//! `tokio::sync::broadcast` channel turns notifications into values: each
//! subscriber gets its own clone and a slow one never blocks the sender.

use gridedit_model::{AreaId, SectionId};
use tokio::sync::broadcast;

use crate::ingest::FileRejection;

/// Events emitted by the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    // Value events
    /// The section value was replaced
    ValueChanged,
    /// The debounced emptiness scan finished
    EmptinessChanged { empty: bool, invalid: bool },

    // Selection events
    /// The set of active areas changed
    ActiveAreasChanged(Vec<AreaId>),

    // Interaction events
    /// A resize gesture started (`true`) or ended (`false`)
    ResizeChanged(bool),
    /// A drag gesture started (`true`) or ended (`false`)
    DragChanged(bool),
    /// Content landed in a section the host should scroll to
    ScrollToSection(SectionId),

    // Ingestion events
    /// A file drop would replace content that warns on remove
    DropPendingConfirmation(AreaId),
    /// Some dropped files were not accepted
    FilesRejected(Vec<FileRejection>),
}

/// Event bus for broadcasting editor events.
pub struct EventBus {
    sender: broadcast::Sender<EditorEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: EditorEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Helper for processing events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(editor.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let EditorEvent::ScrollToSection(id) = event {
///             // Scroll the renderer
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<EditorEvent>,
}

impl EventHandler {
    /// Creates a new event handler.
    pub fn new(receiver: broadcast::Receiver<EditorEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns every event already queued, without waiting.
    pub fn drain(&mut self) -> Vec<EditorEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                }
                Err(_) => return events,
            }
        }
    }
}
