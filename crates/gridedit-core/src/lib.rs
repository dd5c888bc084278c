//! # Gridedit Core
//!
//! Everything between raw input and the layout model: ingestion of pasted
//! HTML and dropped files, the active-area and drag/resize state machine,
//! and the [`Editor`] that owns the ordered section value.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Editor                            │
//! │  ┌───────────┐ ┌───────────┐ ┌──────────┐ ┌────────────┐  │
//! │  │ Selection │ │ Interact. │ │  Ingest  │ │  EventBus  │  │
//! │  └─────┬─────┘ └─────┬─────┘ └────┬─────┘ └────────────┘  │
//! │        └─────────────┼────────────┘                       │
//! │                ┌─────┴──────┐                             │
//! │                │ LayoutIndex│  id → section / area        │
//! │                └─────┬──────┘                             │
//! │               Vec<Section>  (gridedit-model)              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Learning: Explicit Input Instead of Listeners
//!
//! The editor never registers callbacks on a UI toolkit. The host calls
//! `on_pointer_down`, `on_click`, `on_key_combo` and `poll` with plain values
//! (a [`HitTarget`], a [`KeyCombo`], an `Instant`), which keeps the whole
//! state machine testable without a window.

pub mod config;
pub mod editor;
pub mod event;
pub mod index;
pub mod ingest;
pub mod interaction;
pub mod keymap;
pub mod selection;
pub mod timing;

pub use config::Config;
pub use editor::{Direction, DropOutcome, Editor};
pub use event::{EditorEvent, EventBus, EventHandler};
pub use index::LayoutIndex;
pub use ingest::{
    DroppedFile, EmbedResolver, FileRejection, Incoming, MediaProbe, RejectionReason,
    UploadPipeline,
};
pub use interaction::{Grip, Handle, Point, ResizeSession};
pub use keymap::{Key, KeyCombo, KeyOrigin, Modifiers, Platform, Shortcut};
pub use selection::{HitTarget, PointerKind, Selection};
pub use timing::{Debouncer, Throttle};

use gridedit_model::{AreaId, ModelError, SectionId};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Area not found: {0}")]
    AreaNotFound(AreaId),

    #[error("Section not found: {0}")]
    SectionNotFound(SectionId),

    #[error("No content types registered")]
    NoContentTypes,

    #[error("No section types registered")]
    NoSectionTypes,

    #[error("No files accepted, {} rejected", .0.len())]
    FilesNotAccepted(Vec<FileRejection>),

    #[error("Ingestion failed: {0}")]
    Ingest(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}
