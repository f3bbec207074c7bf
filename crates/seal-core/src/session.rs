//! Stamping session
//!
//! [`SealSession`] owns everything that changes while a user works on a
//! document: the loaded pages with their coordinate spaces and stores,
//! the global zoom, the viewport, straddle groups, the selection and the
//! id counters. Every operation takes the session by reference; there is
//! no global state.

use crate::backend::{OutputWriter, PageRasterizer};
use crate::bake::{bake, bake_bytes, BakedSeal};
use crate::config::SealConfig;
use crate::coords::{usable_viewport, CoordinateSpace};
use crate::error::SealError;
use crate::export::{composite, render, ExportBatch};
use crate::pdf::{PdfPageSource, PdfWriter};
use crate::store::{Anchor, AnnotationObject, AnnotationStore, Geometry, StampKind};
use crate::straddle::{plan_fragments, FragmentPlan, FragmentRef, GroupState, StraddleGroup};
use crate::surface::{GeometryChanged, SetGeometry};
use image::RgbaImage;
use seal_types::{DisplayPixels, DocumentUnits, Extent, GroupId, Length, ObjectId, PageId, Point};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// An initialized page: fitted space, placed stamps, rendered background
#[derive(Debug)]
pub struct Page {
    space: CoordinateSpace,
    store: AnnotationStore,
    background: RgbaImage,
}

impl Page {
    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Page raster at the configured background scale
    pub fn background(&self) -> &RgbaImage {
        &self.background
    }
}

struct LoadedDocument {
    generation: u64,
    rasterizer: Box<dyn PageRasterizer>,
    original: Vec<u8>,
    page_count: u32,
}

/// Straddle fragments laid out against one version of the document
#[derive(Debug, Clone)]
pub struct StraddlePlan {
    generation: u64,
    fragments: Vec<FragmentPlan>,
}

impl StraddlePlan {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fragments(&self) -> &[FragmentPlan] {
        &self.fragments
    }
}

/// A placement requested before the viewport was measured
enum Pending {
    Normal {
        id: ObjectId,
        page: PageId,
        baked: BakedSeal,
        center: Option<Point<DocumentUnits>>,
    },
    Straddle {
        group: GroupId,
        baked: BakedSeal,
    },
}

pub struct SealSession {
    config: SealConfig,
    zoom: f64,
    viewport: Extent<DisplayPixels>,
    current_page: PageId,
    generation: u64,
    document: Option<LoadedDocument>,
    pages: BTreeMap<PageId, Page>,
    groups: BTreeMap<GroupId, StraddleGroup>,
    selection: Option<ObjectId>,
    pending: Vec<Pending>,
    next_object: u64,
    next_group: u64,
}

impl fmt::Debug for SealSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealSession")
            .field("zoom", &self.zoom)
            .field("viewport", &self.viewport)
            .field("current_page", &self.current_page)
            .field("generation", &self.generation)
            .field("page_count", &self.page_count())
            .field("initialized_pages", &self.pages.len())
            .field("groups", &self.groups.len())
            .field("selection", &self.selection)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl SealSession {
    pub fn new(config: SealConfig) -> Result<Self, SealError> {
        config.validate()?;
        Ok(Self {
            config,
            zoom: 1.0,
            viewport: Extent::new(0.0, 0.0),
            current_page: PageId::FIRST,
            generation: 0,
            document: None,
            pages: BTreeMap::new(),
            groups: BTreeMap::new(),
            selection: None,
            pending: Vec::new(),
            next_object: 1,
            next_group: 1,
        })
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn viewport(&self) -> Extent<DisplayPixels> {
        self.viewport
    }

    pub fn current_page(&self) -> PageId {
        self.current_page
    }

    /// Bumped on every load; 0 before the first one
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |d| d.page_count)
    }

    /// An initialized page, if it has been shown or stamped
    pub fn page(&self, page: PageId) -> Option<&Page> {
        self.pages.get(&page)
    }

    pub fn object(&self, id: ObjectId) -> Option<&AnnotationObject> {
        self.pages.values().find_map(|p| p.store.get(id))
    }

    pub fn selection(&self) -> Option<ObjectId> {
        self.selection
    }

    pub fn group(&self, id: GroupId) -> Result<&StraddleGroup, SealError> {
        self.groups.get(&id).ok_or(SealError::UnknownGroup(id))
    }

    pub fn groups(&self) -> impl Iterator<Item = &StraddleGroup> {
        self.groups.values()
    }

    /// Placements waiting for the viewport to be measured
    pub fn pending_placements(&self) -> usize {
        self.pending.len()
    }

    // ---- document -------------------------------------------------------

    /// Replace the current document
    ///
    /// All pages, stamps, groups and the selection are dropped. Straddle
    /// plans and export batches made before this call become stale.
    #[instrument(skip(self, rasterizer, original))]
    pub fn load_document(
        &mut self,
        rasterizer: Box<dyn PageRasterizer>,
        original: Vec<u8>,
    ) -> Result<u32, SealError> {
        let page_count = rasterizer.page_count();
        if page_count == 0 {
            return Err(SealError::Rasterizer("document has no pages".to_string()));
        }

        self.generation += 1;
        self.document = Some(LoadedDocument {
            generation: self.generation,
            rasterizer,
            original,
            page_count,
        });
        self.pages.clear();
        self.groups.clear();
        self.selection = None;
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "Dropping queued placements");
            self.pending.clear();
        }
        self.current_page = PageId::FIRST;

        info!(page_count, generation = self.generation, "Loaded document");

        // the first page is shown right away when the layout allows it
        match self.ensure_page(PageId::FIRST) {
            Ok(_) | Err(SealError::PageNotReady(_)) => Ok(page_count),
            Err(e) => Err(e),
        }
    }

    /// Load a PDF, using its MediaBoxes for layout and blank paper as the
    /// page background
    pub fn load_pdf(&mut self, bytes: Vec<u8>) -> Result<u32, SealError> {
        let source = PdfPageSource::from_bytes(&bytes, self.config.paper_color)?;
        self.load_document(Box::new(source), bytes)
    }

    fn document(&self) -> Result<&LoadedDocument, SealError> {
        self.document.as_ref().ok_or(SealError::DocumentNotLoaded)
    }

    fn check_page(&self, page: PageId) -> Result<(), SealError> {
        let page_count = self.document()?.page_count;
        if page.number() > page_count {
            return Err(SealError::PageOutOfRange {
                page: page.number(),
                page_count,
            });
        }
        Ok(())
    }

    fn usable_viewport(&self) -> Extent<DisplayPixels> {
        usable_viewport(
            self.viewport,
            self.config.viewport_margin,
            self.config.viewport_fill,
        )
    }

    /// Initialize `page` if needed: fit its space to the viewport and
    /// render its background
    fn ensure_page(&mut self, page: PageId) -> Result<&mut Page, SealError> {
        self.check_page(page)?;
        let viewport = self.usable_viewport();
        let zoom = self.zoom;
        let policy = self.config.fit_policy;
        let background_scale = self.config.background_scale;
        let document = self.document.as_ref().ok_or(SealError::DocumentNotLoaded)?;

        match self.pages.entry(page) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let extent = document.rasterizer.document_extent(page)?;
                let mut space = CoordinateSpace::fit(extent, viewport, policy)
                    .ok_or(SealError::PageNotReady(page))?;
                space.set_zoom(zoom);
                let background = document.rasterizer.render_to_bitmap(page, background_scale)?;
                debug!(
                    page = page.number(),
                    fit_scale = space.fit_scale(),
                    "Initialized page"
                );
                Ok(entry.insert(Page {
                    space,
                    store: AnnotationStore::new(),
                    background,
                }))
            }
        }
    }

    // ---- view -----------------------------------------------------------

    /// Make `page` the active page, picking up the current zoom
    #[instrument(skip(self))]
    pub fn show_page(&mut self, page: PageId) -> Result<&Page, SealError> {
        let zoom = self.zoom;
        self.ensure_page(page)?.space.set_zoom(zoom);
        self.current_page = page;
        self.pages.get(&page).ok_or(SealError::PageNotReady(page))
    }

    /// Change the zoom multiplier
    ///
    /// Only the active page is updated now; other pages follow when shown.
    /// Stored geometry is not affected.
    #[instrument(skip(self))]
    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), SealError> {
        if !zoom.is_finite() || zoom < self.config.min_zoom || zoom > self.config.max_zoom {
            return Err(SealError::InvalidZoom(zoom));
        }
        self.zoom = zoom;
        if let Some(page) = self.pages.get_mut(&self.current_page) {
            page.space.set_zoom(zoom);
        }
        Ok(())
    }

    /// Record a new viewport size and refit every initialized page
    ///
    /// Stamps are rescaled with their page so they keep their document
    /// position, then straddle groups are brought back in line. Placements
    /// queued while the viewport was unmeasured are carried out. Returns
    /// the geometry every moved or newly placed object must now show.
    #[instrument(skip(self))]
    pub fn resize_viewport(
        &mut self,
        viewport: Extent<DisplayPixels>,
    ) -> Result<Vec<SetGeometry>, SealError> {
        self.viewport = viewport;
        let usable = self.usable_viewport();
        let policy = self.config.fit_policy;

        let mut commands = Vec::new();
        for (id, page) in self.pages.iter_mut() {
            let Some(ratio) = page.space.refit(usable, policy) else {
                debug!(page = id.number(), "Viewport not usable, keeping fit scale");
                continue;
            };
            if ratio == 1.0 {
                continue;
            }
            for object in page.store.iter_mut() {
                let geometry = object.geometry().rescaled(ratio);
                object.set_geometry(geometry);
                commands.push(SetGeometry::new(*id, object.id(), geometry));
            }
        }

        if self.document.is_some() && self.pages.is_empty() {
            // first measurement after load
            match self.ensure_page(self.current_page) {
                Ok(_) | Err(SealError::PageNotReady(_)) => {}
                Err(e) => return Err(e),
            }
        }

        for command in self.resync_groups() {
            // later commands for the same object supersede the rescale
            commands.retain(|c| c.object != command.object);
            commands.push(command);
        }
        commands.extend(self.place_pending());
        Ok(commands)
    }

    /// Carry out queued placements once pages can be initialized
    fn place_pending(&mut self) -> Vec<SetGeometry> {
        if self.pending.is_empty() || self.usable_viewport().width <= 0.0 {
            return Vec::new();
        }

        let mut commands = Vec::new();
        for pending in std::mem::take(&mut self.pending) {
            let placed = match &pending {
                Pending::Normal {
                    id,
                    page,
                    baked,
                    center,
                } => self.insert_normal(*id, *page, baked, *center).map(|()| vec![*id]),
                Pending::Straddle { group, baked } => self
                    .prepare_straddle_stamp(baked)
                    .and_then(|plan| self.insert_fragments(*group, plan.fragments)),
            };
            match placed {
                Ok(ids) => commands.extend(ids.into_iter().filter_map(|id| {
                    let object = self.object(id)?;
                    Some(SetGeometry::new(object.page(), id, object.geometry()))
                })),
                Err(SealError::PageNotReady(_)) => self.pending.push(pending),
                Err(e) => warn!(error = %e, "Dropping queued placement"),
            }
        }
        commands
    }

    /// Bring every group's fragments in line with its first fragment
    fn resync_groups(&mut self) -> Vec<SetGeometry> {
        let mut commands = Vec::new();
        for group in self.groups.values() {
            let Some(&first) = group.fragments().first() else {
                continue;
            };
            let Some(reference) = fragment_geometry(&self.pages, first) else {
                continue;
            };
            let event = GeometryChanged::to_geometry(first.object, reference);
            commands.extend(group.handle(&event, |f| fragment_geometry(&self.pages, f)));
        }
        apply_commands(&mut self.pages, &commands);
        commands
    }

    // ---- stamps ---------------------------------------------------------

    /// Decode a PNG stamp and bake `angle_degrees` of rotation into it
    pub fn bake_seal(&self, bytes: &[u8], angle_degrees: f64) -> Result<BakedSeal, SealError> {
        let baked = bake_bytes(bytes, angle_degrees)?;
        debug!(width = baked.width(), height = baked.height(), angle_degrees, "Baked stamp");
        Ok(baked)
    }

    pub fn bake_seal_image(
        &self,
        image: &RgbaImage,
        angle_degrees: f64,
    ) -> Result<BakedSeal, SealError> {
        bake(image, angle_degrees)
    }

    fn next_object_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        id
    }

    /// Place a stamp on one page
    ///
    /// The stamp is scaled to the configured fraction of the page width
    /// and centered on `center` (document units), or on the page center.
    /// The new object becomes the selection. Before the viewport has been
    /// measured the placement is queued and carried out by the next
    /// [`resize_viewport`](Self::resize_viewport); the returned id is
    /// reserved for it.
    #[instrument(skip(self, baked), fields(width = baked.width(), height = baked.height()))]
    pub fn place_normal_stamp(
        &mut self,
        page: PageId,
        baked: &BakedSeal,
        center: Option<Point<DocumentUnits>>,
    ) -> Result<ObjectId, SealError> {
        self.check_page(page)?;
        let id = ObjectId(self.next_object);
        match self.insert_normal(id, page, baked, center) {
            Ok(()) => {}
            Err(SealError::PageNotReady(_)) => {
                debug!(
                    object = id.0,
                    page = page.number(),
                    "Queued stamp until the viewport is measured"
                );
                self.pending.push(Pending::Normal {
                    id,
                    page,
                    baked: baked.clone(),
                    center,
                });
            }
            Err(e) => return Err(e),
        }
        self.next_object_id();
        Ok(id)
    }

    fn insert_normal(
        &mut self,
        id: ObjectId,
        page: PageId,
        baked: &BakedSeal,
        center: Option<Point<DocumentUnits>>,
    ) -> Result<(), SealError> {
        let fraction = self.config.stamp_width_fraction;
        let entry = self.ensure_page(page)?;

        let space = entry.space.unzoomed();
        let scale = space.display_extent().width * fraction / baked.width() as f64;
        let center = center.unwrap_or_else(|| {
            let extent = space.document_extent();
            Point::new(extent.width / 2.0, extent.height / 2.0)
        });
        let anchor = space.to_display(center);

        let object = AnnotationObject::new(
            id,
            page,
            StampKind::Normal,
            Anchor::Center,
            baked.shared(),
            Geometry::new(anchor.x, anchor.y, scale, scale),
        );
        entry.store.add(object);
        self.selection = Some(id);

        info!(object = id.0, page = page.number(), scale, "Placed stamp");
        Ok(())
    }

    /// Slice a stamp across every page without touching any store
    ///
    /// Pages not yet shown are initialized first.
    #[instrument(skip(self, baked), fields(width = baked.width()))]
    pub fn prepare_straddle_stamp(&mut self, baked: &BakedSeal) -> Result<StraddlePlan, SealError> {
        let page_count = self.document()?.page_count;
        let mut spaces = Vec::with_capacity(page_count as usize);
        for page in PageId::range(page_count) {
            spaces.push((page, self.ensure_page(page)?.space));
        }

        let fragments = plan_fragments(
            baked,
            &spaces,
            self.config.stamp_width_fraction,
            Length::new(self.config.straddle_top),
        )?;
        debug!(fragments = fragments.len(), "Prepared straddle stamp");
        Ok(StraddlePlan {
            generation: self.generation,
            fragments,
        })
    }

    /// Place the fragments of a prepared plan and activate their group
    ///
    /// Fails with `StaleDocument` if another document was loaded since the
    /// plan was prepared.
    #[instrument(skip(self, plan), fields(generation = plan.generation))]
    pub fn commit_straddle_stamp(&mut self, plan: StraddlePlan) -> Result<GroupId, SealError> {
        let document = self.document()?;
        if plan.generation != document.generation {
            warn!(current = document.generation, "Discarding stale straddle plan");
            return Err(SealError::StaleDocument);
        }
        if let Some(missing) = plan.fragments.iter().find(|f| !self.pages.contains_key(&f.page)) {
            return Err(SealError::PageNotReady(missing.page));
        }

        let group_id = self.next_group_id();
        self.insert_fragments(group_id, plan.fragments)?;
        Ok(group_id)
    }

    fn next_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        id
    }

    /// Add fragments to their pages and activate the group; returns the
    /// fragment ids in page order
    fn insert_fragments(
        &mut self,
        group_id: GroupId,
        fragments: Vec<FragmentPlan>,
    ) -> Result<Vec<ObjectId>, SealError> {
        let mut group = StraddleGroup::new(group_id);
        for fragment in fragments {
            let id = self.next_object_id();
            let object = AnnotationObject::new(
                id,
                fragment.page,
                StampKind::StraddleFragment {
                    group: group_id,
                    index: fragment.index,
                },
                Anchor::TopLeft,
                Arc::new(fragment.bitmap),
                fragment.geometry,
            );
            if let Some(page) = self.pages.get_mut(&fragment.page) {
                page.store.add(object);
            }
            group.register(fragment.page, id)?;
        }

        group.activate();
        self.selection = group.fragments().first().map(|f| f.object);
        info!(
            group = group_id.0,
            fragments = group.fragments().len(),
            "Placed straddle stamp"
        );
        let ids = group.fragments().iter().map(|f| f.object).collect();
        self.groups.insert(group_id, group);
        Ok(ids)
    }

    /// Prepare and commit in one step
    ///
    /// Queued like [`place_normal_stamp`](Self::place_normal_stamp) while
    /// the viewport is unmeasured; the group id is reserved.
    pub fn place_straddle_stamp(&mut self, baked: &BakedSeal) -> Result<GroupId, SealError> {
        let page_count = self.document()?.page_count;
        match self.prepare_straddle_stamp(baked) {
            Ok(plan) => self.commit_straddle_stamp(plan),
            Err(SealError::PageNotReady(_)) => {
                if baked.width() < page_count {
                    return Err(SealError::StampTooNarrow {
                        width: baked.width(),
                        pages: page_count,
                    });
                }
                let group = self.next_group_id();
                debug!(group = group.0, "Queued straddle stamp until the viewport is measured");
                self.pending.push(Pending::Straddle {
                    group,
                    baked: baked.clone(),
                });
                Ok(group)
            }
            Err(e) => Err(e),
        }
    }

    // ---- selection and deletion -----------------------------------------

    /// Select an object, or clear the selection with `None`
    pub fn select(&mut self, object: Option<ObjectId>) -> Result<(), SealError> {
        if let Some(id) = object {
            if self.object(id).is_none() {
                return Err(SealError::UnknownObject(id));
            }
        }
        self.selection = object;
        Ok(())
    }

    /// Delete the selected object; a fragment takes its whole group along
    ///
    /// Returns the ids of every removed object (empty without a selection).
    pub fn delete_selection(&mut self) -> Result<Vec<ObjectId>, SealError> {
        match self.selection {
            Some(id) => self.delete_object(id),
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self))]
    pub fn delete_object(&mut self, id: ObjectId) -> Result<Vec<ObjectId>, SealError> {
        let queued = self
            .pending
            .iter()
            .position(|p| matches!(p, Pending::Normal { id: queued, .. } if *queued == id));
        if let Some(index) = queued {
            self.pending.remove(index);
            debug!(object = id.0, "Cancelled queued stamp");
            return Ok(vec![id]);
        }

        let object = self.object(id).ok_or(SealError::UnknownObject(id))?;
        let (page, group) = (object.page(), object.group());

        let removed = match group {
            Some(group_id) => {
                let mut group = self
                    .groups
                    .remove(&group_id)
                    .ok_or(SealError::UnknownGroup(group_id))?;
                let removed: Vec<ObjectId> = self
                    .pages
                    .values_mut()
                    .flat_map(|p| p.store.remove_group(group_id))
                    .collect();
                group.mark_deleted();
                info!(group = group_id.0, removed = removed.len(), "Deleted straddle stamp");
                removed
            }
            None => {
                self.pages
                    .get_mut(&page)
                    .and_then(|p| p.store.remove(id))
                    .ok_or(SealError::UnknownObject(id))?;
                info!(object = id.0, page = page.number(), "Deleted stamp");
                vec![id]
            }
        };

        if self.selection.is_some_and(|s| removed.contains(&s)) {
            self.selection = None;
        }
        Ok(removed)
    }

    // ---- editing --------------------------------------------------------

    /// Apply a move/scale/rotate edit reported by the surface
    ///
    /// Placed stamps never rotate, and straddle fragments only move
    /// vertically. Scales must be finite and positive and positions
    /// finite; anything else keeps the current value. When the surface shows something the session rejected,
    /// the first returned command puts the edited object back in line;
    /// the rest bring the other fragments of its group along.
    #[instrument(skip(self, event), fields(object = event.object.0))]
    pub fn apply_edit(&mut self, event: GeometryChanged) -> Result<Vec<SetGeometry>, SealError> {
        let object = self
            .pages
            .values_mut()
            .find_map(|p| p.store.get_mut(event.object))
            .ok_or(SealError::UnknownObject(event.object))?;

        let current = object.geometry();
        let left = match object.kind() {
            StampKind::Normal => finite_or(event.left.get(), current.left.get()),
            StampKind::StraddleFragment { .. } => current.left.get(),
        };
        let accepted = Geometry {
            left: Length::new(left),
            top: Length::new(finite_or(event.top.get(), current.top.get())),
            scale_x: positive_or(event.scale_x, current.scale_x),
            scale_y: positive_or(event.scale_y, current.scale_y),
        };
        object.set_geometry(accepted);
        let (page, group) = (object.page(), object.group());

        let mut commands = Vec::new();
        if !reported_as(&event, accepted) {
            debug!(
                angle = event.angle,
                scale_x = event.scale_x,
                scale_y = event.scale_y,
                "Rejected part of an edit"
            );
            commands.push(SetGeometry::new(page, event.object, accepted));
        }

        if let Some(group_id) = group {
            let group = self
                .groups
                .get(&group_id)
                .ok_or(SealError::UnknownGroup(group_id))?;
            if group.state() == GroupState::Active {
                let synced = GeometryChanged::to_geometry(event.object, accepted);
                let broadcast = group.handle(&synced, |f| fragment_geometry(&self.pages, f));
                apply_commands(&mut self.pages, &broadcast);
                commands.extend(broadcast);
            }
        }
        Ok(commands)
    }

    // ---- export ---------------------------------------------------------

    /// Compute draw instructions for every stamped page
    ///
    /// Read-only: uses each page's unzoomed space, so the result does not
    /// depend on the current zoom.
    #[instrument(skip(self))]
    pub fn export_all(&self) -> Result<ExportBatch, SealError> {
        let document = self.document()?;
        let supersample = self.config.export_supersample;

        let pages = self
            .pages
            .iter()
            .filter(|(_, page)| !page.store.is_empty())
            .map(|(id, page)| composite(*id, &page.space, &page.store, supersample))
            .collect::<Result<Vec<_>, _>>()?;

        let batch = ExportBatch {
            generation: document.generation,
            pages,
        };
        info!(
            pages = batch.pages.len(),
            stamps = batch.instruction_count(),
            "Export ready"
        );
        Ok(batch)
    }

    /// Draw a batch into `writer`, refusing batches from a replaced document
    pub fn render_export<W: OutputWriter>(
        &self,
        batch: &ExportBatch,
        writer: &mut W,
    ) -> Result<usize, SealError> {
        if batch.generation != self.document()?.generation {
            warn!(batch = batch.generation, "Discarding stale export batch");
            return Err(SealError::StaleDocument);
        }
        render(batch, writer)
    }

    /// Stamp the loaded PDF and return the new file
    ///
    /// Any failure aborts the export; no partial document is produced.
    pub fn export_pdf(&self) -> Result<Vec<u8>, SealError> {
        let batch = self.export_all()?;
        let mut writer = PdfWriter::load(&self.document()?.original)?;
        let drawn = self.render_export(&batch, &mut writer)?;
        let bytes = writer.save()?;
        info!(drawn, size = bytes.len(), "Exported PDF");
        Ok(bytes)
    }
}

fn fragment_geometry(pages: &BTreeMap<PageId, Page>, fragment: FragmentRef) -> Option<Geometry> {
    pages
        .get(&fragment.page)
        .and_then(|p| p.store.get(fragment.object))
        .map(|o| o.geometry())
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn positive_or(scale: f64, fallback: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        fallback
    }
}

/// Whether the surface already shows exactly the accepted geometry
fn reported_as(event: &GeometryChanged, accepted: Geometry) -> bool {
    event.angle == 0.0
        && event.left == accepted.left
        && event.top == accepted.top
        && event.scale_x == accepted.scale_x
        && event.scale_y == accepted.scale_y
}

fn apply_commands(pages: &mut BTreeMap<PageId, Page>, commands: &[SetGeometry]) {
    for command in commands {
        if let Some(object) = pages
            .get_mut(&command.page)
            .and_then(|p| p.store.get_mut(command.object))
        {
            object.set_geometry(command.geometry);
        }
    }
}
