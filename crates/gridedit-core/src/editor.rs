//! The editor: owns the section value and routes input into it.
//!
//! ## Learning: One Writer
//!
//! Every change to the value goes through [`Editor::commit`], which swaps in
//! the new vector, rebuilds the [`LayoutIndex`], emits
//! [`EditorEvent::ValueChanged`] and schedules the emptiness scan. Nothing
//! else holds a mutable reference to the sections, so the index can never
//! go stale.
//!
//! ## Learning: Host-Driven Time
//!
//! The editor never sleeps and never reads the wall clock after it is
//! built. Debounced and throttled work is released by [`Editor::poll`],
//! called by the host from its own event loop, and a change is scheduled
//! from the last instant the host passed in.

use gridedit_model::{
    Area, AreaId, ContentData, ContentKind, ContentTypeRegistry, Dimensions, IdGenerator,
    MediaReference, Section, SectionId, SectionTypeRegistry,
};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::event::{EditorEvent, EventBus, EventHandler};
use crate::index::LayoutIndex;
use crate::ingest::{
    self, DragPayload, DroppedFile, EmbedResolver, FileRejection, HtmlIngestor, Incoming,
    MediaProbe, NoProbe, PassthroughResolver, PlacementContext, UploadPipeline,
};
use crate::interaction::{self, Grip, Handle, Point, ResizeSession};
use crate::keymap::{Key, KeyCombo, KeyOrigin, Platform, Shortcut};
use crate::selection::{self, HitTarget, PointerKind, Selection};
use crate::timing::{Debouncer, Throttle};
use crate::{CoreError, CoreResult};

/// Result of dropping files onto an area.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// The target holds content that warns on remove; call
    /// [`Editor::confirm_drop`] to go on
    Pending,
    /// The files were placed; some may have been rejected
    Placed { rejected: Vec<FileRejection> },
}

/// Direction a section moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone)]
struct PendingDrop {
    target: AreaId,
    files: Vec<DroppedFile>,
}

/// The grid editor.
pub struct Editor {
    config: Config,
    sections: Vec<Section>,
    index: LayoutIndex,
    ids: IdGenerator,
    section_types: SectionTypeRegistry,
    content_types: ContentTypeRegistry,
    selection: Selection,
    copied: Vec<Area>,
    events: EventBus,
    empty_check: Debouncer<()>,
    pointer: Throttle<Point>,
    clock: Instant,
    resize: Option<ResizeSession>,
    dragging: Option<AreaId>,
    pending_drop: Option<PendingDrop>,
    is_empty: bool,
    is_invalid: bool,
    interacted: bool,
    probe: Arc<dyn MediaProbe>,
    resolver: Arc<dyn EmbedResolver>,
    upload: Option<Arc<dyn UploadPipeline>>,
}

impl Editor {
    /// Creates an empty editor from `config`.
    pub fn new(config: Config) -> CoreResult<Self> {
        let section_types = config.section_registry()?;
        let content_types = config.content_registry()?;
        if section_types.is_empty() {
            return Err(CoreError::NoSectionTypes);
        }
        if content_types.is_empty() {
            return Err(CoreError::NoContentTypes);
        }

        Ok(Self {
            empty_check: Debouncer::new(config.timing.empty_check_debounce()),
            pointer: Throttle::new(config.timing.pointer_throttle()),
            clock: Instant::now(),
            config,
            sections: Vec::new(),
            index: LayoutIndex::default(),
            ids: IdGenerator::new(),
            section_types,
            content_types,
            selection: Selection::new(),
            copied: Vec::new(),
            events: EventBus::new(),
            resize: None,
            dragging: None,
            pending_drop: None,
            is_empty: true,
            is_invalid: false,
            interacted: false,
            probe: Arc::new(NoProbe),
            resolver: Arc::new(PassthroughResolver),
            upload: None,
        })
    }

    pub fn with_media_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_embed_resolver(mut self, resolver: Arc<dyn EmbedResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_upload_pipeline(mut self, upload: Arc<dyn UploadPipeline>) -> Self {
        self.upload = Some(upload);
        self
    }

    /// Subscribes to editor events.
    pub fn subscribe(&self) -> EventHandler {
        EventHandler::new(self.events.subscribe())
    }

    // ==================== Accessors ====================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn value(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_types(&self) -> &SectionTypeRegistry {
        &self.section_types
    }

    pub fn content_types(&self) -> &ContentTypeRegistry {
        &self.content_types
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.index.section(&self.sections, id)
    }

    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.index.area(&self.sections, id)
    }

    pub fn active_areas(&self) -> &[AreaId] {
        self.selection.active()
    }

    pub fn copied_areas(&self) -> &[Area] {
        &self.copied
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// True when the value is empty, required and the user has interacted.
    pub fn is_invalid(&self) -> bool {
        self.is_invalid
    }

    /// True once the user clicked or changed the value.
    pub fn has_interacted(&self) -> bool {
        self.interacted
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    pub fn has_pending_drop(&self) -> bool {
        self.pending_drop.is_some()
    }

    /// Media and embeds referenced by the value.
    pub fn collect_media(&self) -> Vec<MediaReference> {
        gridedit_model::collect_media(&self.sections, &self.content_types)
    }

    /// Serializes the value.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(gridedit_model::to_json_value(&self.sections)?)
    }

    fn placement_context(&self) -> PlacementContext<'_> {
        PlacementContext {
            ids: &self.ids,
            section_types: &self.section_types,
            content_types: &self.content_types,
            margin: self.config.editor.margin,
        }
    }

    // ==================== Value ====================

    /// Replaces the value with one loaded from JSON.
    ///
    /// The id generator skips past every id in the value. Legacy HTML values
    /// load as empty here; use [`Editor::load_unknown`] for those.
    pub fn load(&mut self, value: &str) -> CoreResult<()> {
        let sections = gridedit_model::from_json_value(value)?;
        if let Some(max) = gridedit_model::max_id(&sections) {
            self.ids.reserve_through(max);
        }

        self.sections = gridedit_model::parse(sections, self.config.editor.narrow_view);
        self.index = LayoutIndex::build(&self.sections);
        self.selection.retain(|id| self.index.contains_area(id));
        self.is_empty = gridedit_model::is_value_empty(&self.sections);
        tracing::info!("Loaded {} section(s)", self.sections.len());
        Ok(())
    }

    /// Loads any stored value: JSON directly, legacy HTML through
    /// ingestion. A converted value is committed as a change.
    pub async fn load_unknown(&mut self, value: &str) -> CoreResult<()> {
        if !gridedit_model::is_unknown_value(value) {
            return self.load(value);
        }

        let probe = Arc::clone(&self.probe);
        let resolver = Arc::clone(&self.resolver);
        let sections = ingest::parse_unknown(
            value,
            &self.placement_context(),
            probe.as_ref(),
            resolver.as_ref(),
            self.config.editor.narrow_view,
        )
        .await?;

        tracing::info!("Converted legacy value into {} section(s)", sections.len());
        self.store(sections);
        Ok(())
    }

    /// Stores a change made by the user.
    fn commit(&mut self, sections: Vec<Section>) {
        self.interacted = true;
        self.store(sections);
    }

    fn store(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        self.index = LayoutIndex::build(&self.sections);
        self.events.emit(EditorEvent::ValueChanged);
        self.empty_check.call(self.clock, ());
    }

    fn replace_section(&mut self, section: Section) {
        let sections = self
            .sections
            .iter()
            .map(|s| if s.id == section.id { section.clone() } else { s.clone() })
            .collect();
        self.commit(sections);
    }

    /// Releases throttled pointer moves and runs the emptiness scan once
    /// its quiet period has passed.
    pub fn poll(&mut self, now: Instant) {
        self.clock = now;
        if let Some(point) = self.pointer.poll(now) {
            self.apply_resize(point);
        }
        if self.empty_check.poll(now).is_some() {
            self.update_emptiness();
        }
    }

    /// Runs a scheduled emptiness scan immediately.
    pub fn flush(&mut self) {
        if self.empty_check.flush().is_some() {
            self.update_emptiness();
        }
    }

    fn update_emptiness(&mut self) {
        let empty = gridedit_model::is_value_empty(&self.sections);
        let invalid = empty && self.config.editor.required && self.interacted;
        if empty != self.is_empty || invalid != self.is_invalid {
            self.is_empty = empty;
            self.is_invalid = invalid;
            self.events.emit(EditorEvent::EmptinessChanged { empty, invalid });
        }
    }

    /// Merges changed and new sections into the value.
    ///
    /// New ids are inserted at their order, pushing later sections down.
    /// Known ids are replaced; when one changed its order it swaps places
    /// with the section that held that order. A type change deactivates
    /// areas beyond the new type's slot count.
    pub fn on_section_change_or_create(&mut self, batch: Vec<Section>) {
        let incoming: Vec<SectionId> = batch.iter().map(|s| s.id).collect();
        let mut merged: Vec<Section> = self
            .sections
            .iter()
            .filter(|s| !incoming.contains(&s.id))
            .cloned()
            .collect();

        for section in batch {
            let Some(old) = self.index.section(&self.sections, section.id) else {
                for other in merged.iter_mut().filter(|s| s.order >= section.order) {
                    other.order += 1;
                }
                merged.push(section);
                continue;
            };

            if old.type_name != section.type_name {
                let slots = self
                    .section_types
                    .get(&section.type_name)
                    .map_or(0, |d| d.area_count());
                let changed = self.selection.retain(|id| {
                    section
                        .area(id)
                        .is_none_or(|area| (area.order as usize) < slots)
                });
                if changed {
                    self.events
                        .emit(EditorEvent::ActiveAreasChanged(self.selection.active().to_vec()));
                }
            }

            if old.order != section.order {
                let displaced = self
                    .sections
                    .iter()
                    .find(|s| s.order == section.order && s.id != section.id && !incoming.contains(&s.id));
                if let Some(displaced) = displaced {
                    merged.retain(|s| s.id != displaced.id);
                    merged.push(displaced.with_order(old.order));
                }
            }

            merged.push(section);
        }

        merged.sort_by_key(|s| s.order);
        self.commit(merged);
    }

    /// Removes a section and renumbers the rest.
    pub fn on_section_remove(&mut self, id: SectionId) {
        let Some(section) = self.section(id).cloned() else {
            tracing::debug!("Section {} already gone", id);
            return;
        };

        let remaining = self.sections.iter().filter(|s| s.id != id).cloned().collect();
        if self.selection.retain(|area| section.area(area).is_none()) {
            self.events
                .emit(EditorEvent::ActiveAreasChanged(self.selection.active().to_vec()));
        }
        self.commit(gridedit_model::renumber(remaining));
    }

    // ==================== Ingestion ====================

    /// Places content, copied areas first into the active and empty areas,
    /// then into new sections. Returns the sections that received content.
    pub fn on_contents_received(&mut self, incoming: Vec<Incoming>) -> CoreResult<Vec<SectionId>> {
        if incoming.is_empty() {
            return Ok(Vec::new());
        }

        let placement = ingest::place(
            &self.sections,
            self.selection.active(),
            incoming,
            &self.placement_context(),
        )?;
        self.commit(placement.sections);

        if let Some(last) = placement.affected.last() {
            self.events.emit(EditorEvent::ScrollToSection(*last));
        }
        Ok(placement.affected)
    }

    /// Ingests raw strings (pasted or inserted HTML) and places the result.
    pub async fn on_something_received(&mut self, datas: &[String]) -> CoreResult<Vec<SectionId>> {
        let probe = Arc::clone(&self.probe);
        let resolver = Arc::clone(&self.resolver);
        let ingestor = HtmlIngestor::new(&self.content_types, probe.as_ref(), resolver.as_ref());

        let mut records = Vec::new();
        for data in datas {
            records.extend(ingestor.records(data).await);
        }

        let incoming = records.into_iter().map(Incoming::from).collect();
        self.on_contents_received(incoming)
    }

    /// Drops files onto `target`, which becomes the active area.
    ///
    /// When the target's content warns on remove the drop waits for
    /// [`Editor::confirm_drop`].
    pub async fn drop_files(&mut self, target: AreaId, files: Vec<DroppedFile>) -> CoreResult<DropOutcome> {
        let area = self.area(target).ok_or(CoreError::AreaNotFound(target))?;

        let warns = area.content.as_ref().is_some_and(|record| {
            self.content_types
                .get(&record.type_name)
                .is_some_and(|d| d.warn_on_remove(&record.data))
        });
        if warns {
            self.pending_drop = Some(PendingDrop { target, files });
            self.events.emit(EditorEvent::DropPendingConfirmation(target));
            return Ok(DropOutcome::Pending);
        }

        self.place_files(target, files).await
    }

    /// Resolves a pending file drop. Returns `None` when nothing was pending
    /// or the drop was cancelled.
    pub async fn confirm_drop(&mut self, confirmed: bool) -> CoreResult<Option<DropOutcome>> {
        let Some(pending) = self.pending_drop.take() else {
            return Ok(None);
        };
        if !confirmed {
            tracing::debug!("File drop on {} cancelled", pending.target);
            return Ok(None);
        }
        self.place_files(pending.target, pending.files).await.map(Some)
    }

    async fn place_files(&mut self, target: AreaId, files: Vec<DroppedFile>) -> CoreResult<DropOutcome> {
        let Some(upload) = self.upload.clone() else {
            return Err(CoreError::Ingest("no upload pipeline configured".into()));
        };

        let (records, rejected) = match ingest::ingest_files(&files, &self.content_types, upload.as_ref()).await {
            Ok(accepted) => accepted,
            Err(CoreError::FilesNotAccepted(rejected)) => {
                self.events.emit(EditorEvent::FilesRejected(rejected.clone()));
                return Err(CoreError::FilesNotAccepted(rejected));
            }
            Err(e) => return Err(e),
        };
        if !rejected.is_empty() {
            self.events.emit(EditorEvent::FilesRejected(rejected.clone()));
        }

        let mut records = records.into_iter();
        if let Some(first) = records.next() {
            let section = self
                .index
                .section_of(&self.sections, target)
                .ok_or(CoreError::AreaNotFound(target))?;
            let area = section.area(target).ok_or(CoreError::AreaNotFound(target))?;

            self.run_on_remove(area);
            let filled = area.add_content_type(&self.content_types, &first.type_name, Some(&first.data))?;
            let section = section.with_area(filled).adjusted_to_areas();
            self.replace_section(section);
        }

        self.on_contents_received(records.map(Incoming::from).collect())?;
        if self.index.contains_area(target) {
            self.activate_area(target);
        }
        Ok(DropOutcome::Placed { rejected })
    }

    // ==================== Drag ====================

    /// Starts dragging an area. Returns the payload, or `None` for empty
    /// areas, which cannot be dragged.
    pub fn drag_start(&mut self, area_id: AreaId) -> Option<String> {
        let area = self.area(area_id)?;
        if area.is_empty() {
            return None;
        }
        self.dragging = Some(area_id);
        self.events.emit(EditorEvent::DragChanged(true));
        Some(DragPayload::new(area_id).encode())
    }

    pub fn drag_end(&mut self) {
        if self.dragging.take().is_some() {
            self.events.emit(EditorEvent::DragChanged(false));
        }
    }

    /// Drops a drag payload onto `target`, swapping the two areas' content.
    pub fn drop_payload(&mut self, target: AreaId, payload: &str) {
        self.drag_end();
        let Some(payload) = DragPayload::decode(payload) else {
            return;
        };
        self.swap_areas(payload.area_id, target);
    }

    /// Swaps the content of two areas. Unknown ids are ignored.
    pub fn swap_areas(&mut self, first: AreaId, second: AreaId) {
        match interaction::swap_contents(&self.sections, first, second) {
            Some(sections) => self.commit(sections),
            None => tracing::debug!("Nothing to swap between {} and {}", first, second),
        }
    }

    // ==================== Selection ====================

    /// Records where a click started.
    pub fn on_pointer_down(&mut self, target: HitTarget) {
        self.selection.pointer_down(target);
    }

    /// Handles a click.
    ///
    /// A click on an inactive area activates it alone. Clicking the bare
    /// surface of an active empty area with a fine pointer gives it the
    /// first content type; a touch on an active area that cannot be edited
    /// in place deactivates it. Other clicks deactivate what they do not
    /// shelter.
    pub fn on_click(&mut self, target: HitTarget, pointer: PointerKind) -> CoreResult<()> {
        self.interacted = true;

        let Some(area_id) = target.area().filter(|id| self.index.contains_area(*id)) else {
            let dropped = self
                .selection
                .click_outside(target, |id| self.index.section_of(&self.sections, id).map(|s| s.id));
            if !dropped.is_empty() {
                self.events
                    .emit(EditorEvent::ActiveAreasChanged(self.selection.active().to_vec()));
                self.run_empty_check(&dropped);
            }
            return Ok(());
        };
        self.selection.clear_pointer_down();

        let is_active = self.selection.is_active(area_id);

        if is_active && pointer == PointerKind::Fine && matches!(target, HitTarget::AreaSurface(_)) {
            let is_empty = self.area(area_id).is_some_and(Area::is_empty);
            if is_empty {
                let first = self.content_types.first().ok_or(CoreError::NoContentTypes)?;
                let name = first.name.clone();
                self.change_content_type(area_id, &name)?;
            }
        }

        if !is_active {
            self.activate_area(area_id);
        } else if pointer == PointerKind::Coarse
            && !matches!(target, HitTarget::AreaControl(_))
            && !self.is_content_editable(area_id)
        {
            self.deactivate_area(area_id);
        }
        Ok(())
    }

    fn is_content_editable(&self, area_id: AreaId) -> bool {
        self.area(area_id)
            .and_then(|a| a.content.as_ref())
            .and_then(|c| self.content_types.get(&c.type_name))
            .is_some_and(|d| matches!(d.kind, ContentKind::Html | ContentKind::Text))
    }

    /// Makes `area_id` the sole active area. Areas losing activity go
    /// through the empty check.
    pub fn activate_area(&mut self, area_id: AreaId) {
        let was_active = self.selection.activate(area_id);
        self.events
            .emit(EditorEvent::ActiveAreasChanged(self.selection.active().to_vec()));
        self.run_empty_check(&was_active);
    }

    /// Deactivates an area and runs the empty check on it.
    pub fn deactivate_area(&mut self, area_id: AreaId) {
        if self.selection.deactivate(area_id) {
            self.events
                .emit(EditorEvent::ActiveAreasChanged(self.selection.active().to_vec()));
        }
        self.run_empty_check(&[area_id]);
    }

    /// Replaces the active set, for multi-select.
    pub fn set_active_areas(&mut self, ids: Vec<AreaId>) {
        let known = ids.into_iter().filter(|id| self.index.contains_area(*id)).collect();
        if self.selection.set_active(known) {
            self.events
                .emit(EditorEvent::ActiveAreasChanged(self.selection.active().to_vec()));
        }
    }

    fn run_empty_check(&mut self, area_ids: &[AreaId]) {
        if area_ids.is_empty() {
            return;
        }
        if let Some(sections) = selection::check_empty(&self.sections, area_ids) {
            self.commit(sections);
            self.selection.retain(|id| self.index.contains_area(id));
        }
    }

    // ==================== Keyboard ====================

    /// Handles copy and paste. Returns true when the combo was used.
    ///
    /// Keys typed into text inputs belong to the input; they only clear the
    /// copied areas.
    pub fn on_key_combo(&mut self, combo: KeyCombo, origin: KeyOrigin, platform: Platform) -> CoreResult<bool> {
        if origin == KeyOrigin::TextInput {
            self.copied.clear();
            return Ok(false);
        }

        match combo.shortcut(platform) {
            Some(Shortcut::Copy) => {
                self.copied = self
                    .sections
                    .iter()
                    .flat_map(|s| s.areas.iter())
                    .filter(|a| self.selection.is_active(a.id) && !a.is_empty())
                    .cloned()
                    .collect();
                tracing::debug!("Copied {} area(s)", self.copied.len());
                Ok(true)
            }
            Some(Shortcut::Paste) if !self.copied.is_empty() => {
                let incoming = self.copied.iter().cloned().map(Incoming::Area).collect();
                self.on_contents_received(incoming)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ==================== Resize ====================

    /// Starts resizing `area_id` from `handle`. Returns false for gestures
    /// that do nothing.
    pub fn begin_resize(&mut self, area_id: AreaId, handle: Handle, start: Point, rendered: Dimensions) -> bool {
        let Some(section) = self.index.section_of(&self.sections, area_id) else {
            return false;
        };
        let Some(definition) = self.section_types.get(&section.type_name) else {
            return false;
        };

        let session = ResizeSession::begin(
            section,
            definition,
            &self.content_types,
            Grip::new(area_id, handle, start, rendered),
            self.config.resize.min_area_size,
        );
        let Some(session) = session else {
            return false;
        };

        self.pointer.reset();
        self.resize = Some(session);
        self.events.emit(EditorEvent::ResizeChanged(true));
        true
    }

    /// Offers a pointer move; it is applied now or on a later
    /// [`Editor::poll`].
    pub fn resize_move(&mut self, now: Instant, point: Point) {
        self.clock = now;
        if self.resize.is_none() {
            return;
        }
        if let Some(point) = self.pointer.call(now, point) {
            self.apply_resize(point);
        }
    }

    /// Steps the active resize with an arrow key.
    pub fn resize_key(&mut self, key: Key) -> bool {
        let step = self.config.resize.keyboard_step_px;
        let Some(point) = self.resize.as_mut().and_then(|s| s.key_step(key, step)) else {
            return false;
        };
        self.apply_resize(point);
        true
    }

    /// Applies the last pending move and ends the gesture.
    pub fn end_resize(&mut self) {
        if let Some(point) = self.pointer.flush() {
            self.apply_resize(point);
        }
        if self.resize.take().is_some() {
            self.events.emit(EditorEvent::ResizeChanged(false));
        }
    }

    fn apply_resize(&mut self, point: Point) {
        let Some(session) = &self.resize else {
            return;
        };
        let Some(section) = self.section(session.section_id) else {
            return;
        };
        let resized = session.apply(section, point);
        self.replace_section(resized);
    }

    // ==================== Area Tools ====================

    fn run_on_remove(&self, area: &Area) {
        let Some(record) = &area.content else {
            return;
        };
        if let Some(definition) = self.content_types.get(&record.type_name) {
            definition.on_remove(&record.data);
        }
    }

    /// Removes an area's content. In a single-slot section the whole
    /// section goes.
    pub fn remove_area(&mut self, area_id: AreaId) -> CoreResult<()> {
        let section = self
            .index
            .section_of(&self.sections, area_id)
            .ok_or(CoreError::AreaNotFound(area_id))?
            .clone();
        let area = section.area(area_id).ok_or(CoreError::AreaNotFound(area_id))?;
        self.run_on_remove(area);

        let slots = self
            .section_types
            .get(&section.type_name)
            .map_or(section.areas.len(), |d| d.area_count());

        if slots == 1 {
            self.on_section_remove(section.id);
        } else {
            let reset = area.reset(section.height);
            self.replace_section(section.with_area(reset));
            if self.selection.deactivate(area_id) {
                self.events
                    .emit(EditorEvent::ActiveAreasChanged(self.selection.active().to_vec()));
            }
        }
        Ok(())
    }

    /// Switches an area to another content type, carrying text over between
    /// textual types.
    pub fn change_content_type(&mut self, area_id: AreaId, type_name: &str) -> CoreResult<()> {
        let section = self
            .index
            .section_of(&self.sections, area_id)
            .ok_or(CoreError::AreaNotFound(area_id))?;
        let area = section.area(area_id).ok_or(CoreError::AreaNotFound(area_id))?;
        let to = self.content_types.require(type_name)?;

        let carried = area.content.as_ref().and_then(|record| {
            let from = self.content_types.get(&record.type_name)?;
            ingest::convert_text(from, to, &record.data)
        });

        let changed = area.add_content_type(&self.content_types, type_name, carried.as_ref())?;
        let section = section.with_area(changed).adjusted_to_areas();
        self.replace_section(section);
        Ok(())
    }

    /// Merges data from the renderer into an area's current content.
    pub fn set_content_value(&mut self, area_id: AreaId, data: ContentData) -> CoreResult<()> {
        let section = self
            .index
            .section_of(&self.sections, area_id)
            .ok_or(CoreError::AreaNotFound(area_id))?;
        let area = section.area(area_id).ok_or(CoreError::AreaNotFound(area_id))?;
        let record = area
            .content
            .as_ref()
            .ok_or_else(|| CoreError::Ingest(format!("area {} holds no content", area_id)))?;
        let definition = self.content_types.require(&record.type_name)?;

        let data = definition.on_type_change(data);
        let changed = area.set_content_value(&self.content_types, &record.type_name, &data)?;
        let section = section.with_area(changed).adjusted_to_areas();
        self.replace_section(section);
        Ok(())
    }

    /// Moves a section one place up or down.
    pub fn move_section(&mut self, id: SectionId, direction: Direction) -> CoreResult<()> {
        let section = self.section(id).ok_or(CoreError::SectionNotFound(id))?;
        let order = match direction {
            Direction::Up => section.order.checked_sub(1),
            Direction::Down => Some(section.order + 1).filter(|o| (*o as usize) < self.sections.len()),
        };
        let Some(order) = order else {
            tracing::debug!("Section {} is already at the edge", id);
            return Ok(());
        };

        let moved = section.with_order(order);
        self.on_section_change_or_create(vec![moved]);
        self.events.emit(EditorEvent::ScrollToSection(id));
        Ok(())
    }

    /// Inserts an empty section of `type_name` at `order`.
    pub fn create_section(&mut self, type_name: &str, order: u32) -> CoreResult<SectionId> {
        let definition = self.section_types.require(type_name)?;
        let order = order.min(self.sections.len() as u32);
        let section = Section::create(&self.ids, type_name, definition, order, self.config.editor.margin, vec![]);
        let id = section.id;

        self.on_section_change_or_create(vec![section]);
        self.events.emit(EditorEvent::ScrollToSection(id));
        Ok(id)
    }

    /// Switches a section to another type, keeping its areas.
    pub fn change_section_type(&mut self, id: SectionId, type_name: &str) -> CoreResult<()> {
        let section = self.section(id).ok_or(CoreError::SectionNotFound(id))?;
        let definition = self.section_types.require(type_name)?;
        let changed = section.with_type(&self.ids, type_name, definition);
        self.on_section_change_or_create(vec![changed]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RejectionReason;
    use async_trait::async_trait;
    use gridedit_model::ContentRecord;
    use serde_json::json;
    use std::time::Duration;

    struct FixedProbe;

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn probe(&self, _url: &str) -> CoreResult<Dimensions> {
            Ok(Dimensions::new(200.0, 100.0))
        }
    }

    struct EchoUpload;

    #[async_trait]
    impl UploadPipeline for EchoUpload {
        async fn upload(&self, _type_name: &str, files: Vec<DroppedFile>) -> CoreResult<Vec<ContentData>> {
            Ok(files
                .into_iter()
                .map(|f| {
                    json!({"url": f.name, "width": 400, "height": 300})
                        .as_object()
                        .cloned()
                        .unwrap()
                })
                .collect())
        }
    }

    fn editor() -> Editor {
        Editor::new(Config::default()).unwrap()
    }

    fn text(src: &str) -> Incoming {
        Incoming::from(ContentRecord::new(
            "text",
            json!({"src": src}).as_object().cloned().unwrap(),
        ))
    }

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    const STORED: &str = r#"[{"id":1,"order":0,"type":"bunny","width":100,"height":28.125,"data":{"margin":1},
        "areas":[{"id":2,"order":0,"width":50,"height":100,"contents":[{"type":"text","data":{"src":"<p>a</p>"}}]},
                 {"id":3,"order":1,"width":50,"height":100,"contents":[]}]}]"#;

    /// A required editor holding [`STORED`], untouched by the user.
    fn stored_editor() -> Editor {
        let mut config = Config::default();
        config.editor.required = true;
        let mut editor = Editor::new(config).unwrap();
        editor.load(STORED).unwrap();
        assert!(!editor.has_interacted());
        editor
    }

    #[test]
    fn test_rejects_empty_registries() {
        let config = Config {
            section_types: Vec::new(),
            ..Config::default()
        };
        assert!(matches!(Editor::new(config), Err(CoreError::NoSectionTypes)));
    }

    #[test]
    fn test_load_reserves_ids() {
        let mut editor = editor();
        let value = r#"[{"id":40,"order":3,"type":"single","width":100.0,"height":55.0,"data":{"margin":1.0},
            "areas":[{"id":41,"order":0,"width":100.0,"height":100.0,"contents":[]}]}]"#;
        editor.load(value).unwrap();

        assert_eq!(editor.value()[0].order, 3);
        let id = editor.create_section("single", 0).unwrap();
        assert!(id.0 > 41);
        assert_eq!(editor.value().len(), 2);
        assert_eq!(editor.value()[0].id, id);
    }

    #[test]
    fn test_deactivating_empty_section_removes_it() {
        let mut editor = editor();
        editor.on_contents_received(vec![text("a"), text("b"), text("c")]).unwrap();
        let middle = editor.create_section("single", 1).unwrap();
        assert_eq!(editor.value().len(), 4);

        let area = editor.section(middle).unwrap().areas[0].id;
        editor.on_click(HitTarget::Area(area), PointerKind::Fine).unwrap();
        assert_eq!(editor.active_areas(), &[area]);

        editor.on_click(HitTarget::Page, PointerKind::Fine).unwrap();
        assert!(editor.active_areas().is_empty());
        assert_eq!(editor.value().len(), 3);
        assert!(editor.section(middle).is_none());
        assert!(gridedit_model::has_dense_order(editor.value()));
    }

    #[test]
    fn test_clicking_surface_adds_first_type() {
        let mut editor = editor();
        let id = editor.create_section("bunny", 0).unwrap();
        let area = editor.section(id).unwrap().areas[1].id;

        editor.on_click(HitTarget::AreaSurface(area), PointerKind::Fine).unwrap();
        assert!(editor.area(area).unwrap().is_empty());

        editor.on_click(HitTarget::AreaSurface(area), PointerKind::Fine).unwrap();
        assert_eq!(editor.area(area).unwrap().types(), vec!["text"]);
    }

    #[test]
    fn test_coarse_click_deactivates_media() {
        let mut editor = editor();
        let media = ContentRecord::new(
            "media",
            json!({"url": "a.jpg", "width": 100, "height": 100}).as_object().cloned().unwrap(),
        );
        let affected = editor.on_contents_received(vec![media.into()]).unwrap();
        let area = editor.section(affected[0]).unwrap().areas[0].id;

        editor.on_click(HitTarget::Area(area), PointerKind::Coarse).unwrap();
        assert_eq!(editor.active_areas(), &[area]);
        editor.on_click(HitTarget::AreaControl(area), PointerKind::Coarse).unwrap();
        assert_eq!(editor.active_areas(), &[area]);
        editor.on_click(HitTarget::Area(area), PointerKind::Coarse).unwrap();
        assert!(editor.active_areas().is_empty());
        // The area holds media, so its section survives.
        assert_eq!(editor.value().len(), 1);
    }

    #[test]
    fn test_section_insert_and_reorder() {
        let mut editor = editor();
        let first = editor.create_section("single", 0).unwrap();
        let second = editor.create_section("bunny", 1).unwrap();
        let third = editor.create_section("triple", 1).unwrap();

        let orders: Vec<SectionId> = editor.value().iter().map(|s| s.id).collect();
        assert_eq!(orders, vec![first, third, second]);

        editor.move_section(first, Direction::Down).unwrap();
        let orders: Vec<SectionId> = editor.value().iter().map(|s| s.id).collect();
        assert_eq!(orders, vec![third, first, second]);
        assert!(gridedit_model::has_dense_order(editor.value()));

        editor.move_section(third, Direction::Up).unwrap();
        assert_eq!(editor.value()[0].id, third);

        editor.on_section_remove(first);
        assert_eq!(editor.value().len(), 2);
        assert!(gridedit_model::has_dense_order(editor.value()));
    }

    #[test]
    fn test_type_change_deactivates_hidden_areas() {
        let mut editor = editor();
        let id = editor.create_section("triple", 0).unwrap();
        let areas: Vec<AreaId> = editor.section(id).unwrap().areas.iter().map(|a| a.id).collect();
        editor.set_active_areas(areas.clone());

        editor.change_section_type(id, "bunny").unwrap();
        assert_eq!(editor.active_areas(), &areas[..2]);
        assert_eq!(editor.section(id).unwrap().areas.len(), 3);
    }

    #[test]
    fn test_copy_paste() {
        let mut editor = editor();
        editor.on_contents_received(vec![text("copy me")]).unwrap();
        let area = editor.value()[0].areas[0].id;
        editor.set_active_areas(vec![area]);

        let ctrl_c = KeyCombo::parse("ctrl+c").unwrap();
        let ctrl_v = KeyCombo::parse("ctrl+v").unwrap();
        assert!(editor.on_key_combo(ctrl_c, KeyOrigin::Editor, Platform::Other).unwrap());
        assert_eq!(editor.copied_areas().len(), 1);

        assert!(editor.on_key_combo(ctrl_v, KeyOrigin::Editor, Platform::Other).unwrap());
        assert_eq!(editor.value().len(), 2);
        assert_eq!(editor.value()[1].areas[0].content, editor.value()[0].areas[0].content);
        assert_ne!(editor.value()[1].areas[0].id, area);

        assert!(!editor.on_key_combo(ctrl_v, KeyOrigin::TextInput, Platform::Other).unwrap());
        assert!(editor.copied_areas().is_empty());
    }

    #[test]
    fn test_swap_through_drag() {
        let mut editor = editor();
        editor.on_contents_received(vec![text("a")]).unwrap();
        let id = editor.create_section("bunny", 1).unwrap();
        let source = editor.value()[0].areas[0].id;
        let target = editor.section(id).unwrap().areas[1].id;

        assert!(editor.drag_start(target).is_none());
        let payload = editor.drag_start(source).unwrap();
        assert!(editor.is_dragging());

        editor.drop_payload(target, &payload);
        assert!(!editor.is_dragging());
        assert!(editor.area(source).unwrap().is_empty());
        assert_eq!(editor.area(target).unwrap().types(), vec!["text"]);

        editor.drop_payload(source, "garbage");
        assert!(editor.area(source).unwrap().is_empty());
    }

    #[test]
    fn test_resize_is_throttled() {
        let mut editor = editor();
        let id = editor.create_section("bunny", 0).unwrap();
        let area = editor.section(id).unwrap().areas[0].id;
        let start = Instant::now();

        assert!(!editor.begin_resize(area, Handle::Top, Point::new(0.0, 0.0), Dimensions::new(1000.0, 300.0)));
        assert!(editor.begin_resize(area, Handle::Right, Point::new(500.0, 0.0), Dimensions::new(1000.0, 300.0)));
        assert!(editor.is_resizing());

        editor.resize_move(start, Point::new(550.0, 0.0));
        assert!((editor.area(area).unwrap().width - 55.0).abs() < 1e-9);

        editor.resize_move(start + Duration::from_millis(5), Point::new(600.0, 0.0));
        assert!((editor.area(area).unwrap().width - 55.0).abs() < 1e-9);

        editor.end_resize();
        assert!(!editor.is_resizing());
        assert!((editor.area(area).unwrap().width - 60.0).abs() < 1e-9);
        let sibling = &editor.section(id).unwrap().areas[1];
        assert!((sibling.width - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_keyboard_resize() {
        let mut editor = editor();
        let id = editor.create_section("single", 0).unwrap();
        let area = editor.section(id).unwrap().areas[0].id;

        assert!(!editor.resize_key(Key::Left));
        assert!(editor.begin_resize(area, Handle::Bottom, Point::new(0.0, 0.0), Dimensions::new(1000.0, 550.0)));
        assert!(editor.resize_key(Key::Down));
        editor.end_resize();

        let height = editor.section(id).unwrap().height;
        assert!(height > 55.0);
    }

    #[test]
    fn test_emptiness_is_debounced() {
        let mut config = Config::default();
        config.editor.required = true;
        let mut editor = Editor::new(config).unwrap();
        let mut events = editor.subscribe();

        let id = editor.create_section("single", 0).unwrap();
        let area = editor.section(id).unwrap().areas[0].id;
        editor.on_click(HitTarget::Area(area), PointerKind::Fine).unwrap();
        editor.poll(Instant::now());
        assert!(!editor.is_invalid());

        editor.poll(later());
        assert!(editor.is_empty());
        assert!(editor.is_invalid());
        assert!(events.drain().contains(&EditorEvent::EmptinessChanged {
            empty: true,
            invalid: true
        }));

        editor.on_contents_received(vec![text("x")]).unwrap();
        editor.flush();
        assert!(!editor.is_empty());
        assert!(!editor.is_invalid());
    }

    #[test]
    fn test_emptiness_follows_host_clock() {
        let mut editor = editor();
        let base = Instant::now() + Duration::from_secs(3600);
        editor.poll(base);

        editor.on_contents_received(vec![text("x")]).unwrap();
        editor.poll(base + Duration::from_millis(100));
        assert!(editor.is_empty());

        editor.poll(base + Duration::from_millis(500));
        assert!(!editor.is_empty());
    }

    #[test]
    fn test_removing_last_content_invalidates_required_editor() {
        let mut editor = stored_editor();
        editor.remove_area(AreaId(2)).unwrap();
        editor.flush();

        assert!(editor.has_interacted());
        assert!(editor.is_empty());
        assert!(editor.is_invalid());
    }

    #[test]
    fn test_keyboard_resize_and_drag_count_as_interaction() {
        let mut editor = stored_editor();
        editor.set_active_areas(vec![AreaId(2)]);
        let ctrl_c = KeyCombo::parse("ctrl+c").unwrap();
        let ctrl_v = KeyCombo::parse("ctrl+v").unwrap();
        assert!(editor.on_key_combo(ctrl_c, KeyOrigin::Editor, Platform::Other).unwrap());
        assert!(!editor.has_interacted());
        assert!(editor.on_key_combo(ctrl_v, KeyOrigin::Editor, Platform::Other).unwrap());
        assert!(editor.has_interacted());

        let mut editor = stored_editor();
        assert!(editor.begin_resize(AreaId(2), Handle::Right, Point::new(500.0, 0.0), Dimensions::new(1000.0, 300.0)));
        editor.resize_move(Instant::now(), Point::new(550.0, 0.0));
        editor.end_resize();
        assert!(editor.has_interacted());

        let mut editor = stored_editor();
        let payload = editor.drag_start(AreaId(2)).unwrap();
        assert!(!editor.has_interacted());
        editor.drop_payload(AreaId(3), &payload);
        assert!(editor.has_interacted());
    }

    #[tokio::test]
    async fn test_paste_and_file_drop_count_as_interaction() {
        let mut editor = stored_editor();
        editor.on_something_received(&["<p>b</p>".to_string()]).await.unwrap();
        assert!(editor.has_interacted());

        let mut editor = stored_editor().with_upload_pipeline(Arc::new(EchoUpload));
        let files = vec![DroppedFile::new("a.png", "image/png", vec![1])];
        editor.drop_files(AreaId(3), files).await.unwrap();
        assert!(editor.has_interacted());
    }

    #[test]
    fn test_area_tools() {
        let mut editor = editor();
        let id = editor.create_section("bunny", 0).unwrap();
        let area = editor.section(id).unwrap().areas[0].id;

        editor.change_content_type(area, "text").unwrap();
        let mut data = ContentData::new();
        data.insert("src".into(), json!("<p>Hi <b>there</b></p>"));
        editor.set_content_value(area, data.clone()).unwrap();

        data.insert("bogus".into(), json!(1));
        assert!(editor.set_content_value(area, data).is_err());

        editor.remove_area(area).unwrap();
        assert!(editor.area(area).unwrap().is_empty());
        assert_eq!(editor.value().len(), 1);

        let single = editor.create_section("single", 1).unwrap();
        let solo = editor.section(single).unwrap().areas[0].id;
        editor.change_content_type(solo, "text").unwrap();
        editor.remove_area(solo).unwrap();
        assert_eq!(editor.value().len(), 1);
        assert!(matches!(editor.remove_area(solo), Err(CoreError::AreaNotFound(_))));
    }

    #[tokio::test]
    async fn test_html_paste() {
        let mut editor = editor().with_media_probe(Arc::new(FixedProbe));
        let affected = editor
            .on_something_received(&["<p>Hello</p><img src='x.jpg'>".to_string()])
            .await
            .unwrap();

        assert_eq!(affected.len(), 2);
        let value = editor.value();
        assert_eq!(value[0].areas[0].types(), vec!["text"]);
        assert_eq!(value[1].areas[0].types(), vec!["media"]);
        assert!((value[1].height - 50.01).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_html_paste_without_media_probe() {
        let mut editor = editor();
        let affected = editor
            .on_something_received(&["<p>Hello</p><img src='x.jpg'>".to_string()])
            .await
            .unwrap();

        assert_eq!(affected.len(), 2);
        let value = editor.value();
        assert_eq!(value[0].areas[0].types(), vec!["text"]);
        assert_eq!(value[1].areas[0].types(), vec!["media"]);

        let media = value[1].areas[0].content.as_ref().unwrap();
        assert_eq!(media.text("url"), Some("x.jpg"));
        assert_eq!(value[1].areas[0].content_dimensions(), (None, None));
        assert!(!editor.to_json().unwrap().contains("<img"));
    }

    #[tokio::test]
    async fn test_load_legacy_html() {
        let mut editor = editor();
        editor.load_unknown("<p>Legacy</p>").await.unwrap();
        assert_eq!(editor.value().len(), 1);
        assert_eq!(editor.value()[0].areas[0].types(), vec!["text"]);
        assert!(!editor.has_interacted());
    }

    #[tokio::test]
    async fn test_file_drop_with_confirmation() {
        let mut editor = editor().with_upload_pipeline(Arc::new(EchoUpload));
        editor.on_contents_received(vec![text("keep?")]).unwrap();
        let target = editor.value()[0].areas[0].id;

        let files = vec![
            DroppedFile::new("a.png", "image/png", vec![1]),
            DroppedFile::new("b.png", "image/png", vec![2]),
            DroppedFile::new("c.zip", "application/zip", vec![3]),
        ];
        let outcome = editor.drop_files(target, files).await.unwrap();
        assert_eq!(outcome, DropOutcome::Pending);
        assert!(editor.has_pending_drop());

        let outcome = editor.confirm_drop(true).await.unwrap().unwrap();
        let DropOutcome::Placed { rejected } = outcome else {
            panic!("expected placed files");
        };
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].reason, RejectionReason::WrongType);

        assert_eq!(editor.area(target).unwrap().types(), vec!["media"]);
        assert_eq!(editor.active_areas(), &[target]);
        assert_eq!(editor.value().len(), 2);
        assert!((editor.value()[0].height - 75.01).abs() < 1e-9);
        assert!(editor.confirm_drop(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_drop_activates_target() {
        let mut editor = editor().with_upload_pipeline(Arc::new(EchoUpload));
        let id = editor.create_section("bunny", 0).unwrap();
        let target = editor.section(id).unwrap().areas[1].id;
        let mut events = editor.subscribe();

        let files = vec![DroppedFile::new("a.png", "image/png", vec![1])];
        let outcome = editor.drop_files(target, files).await.unwrap();
        assert_eq!(outcome, DropOutcome::Placed { rejected: vec![] });
        assert_eq!(editor.active_areas(), &[target]);
        assert!(events.drain().contains(&EditorEvent::ActiveAreasChanged(vec![target])));
    }

    #[tokio::test]
    async fn test_drop_without_accepted_files() {
        let mut editor = editor().with_upload_pipeline(Arc::new(EchoUpload));
        let id = editor.create_section("single", 0).unwrap();
        let target = editor.section(id).unwrap().areas[0].id;
        let mut events = editor.subscribe();

        let files = vec![DroppedFile::new("c.zip", "application/zip", vec![])];
        let err = editor.drop_files(target, files).await.unwrap_err();
        assert!(matches!(err, CoreError::FilesNotAccepted(_)));
        assert!(matches!(events.drain().as_slice(), [EditorEvent::FilesRejected(_)]));
    }
}
