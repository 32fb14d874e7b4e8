//! The avatar editing session.
//!
//! A [`CropSession`] owns everything between "user picked a file" and "user
//! confirmed the crop": the decoded source image, the live crop rectangle, the
//! completed crop snapshot, the output surface and the pending debounced
//! render. The host feeds it events; it never calls back into the host except
//! through queued [`HostCommand`]s.
//!
//! # States
//!
//! ```text
//! Closed ──select──▶ AwaitingImage ──decode ok──▶ DefaultCrop ──update──▶ AdjustedCrop
//!    ▲                    │                           │                       │
//!    │               decode err                    complete                complete
//!    │                    ▼                           ▼                       ▼
//!    │              DecodeFailed                  Rendering ──deadline──▶ Rendered
//!    │                                                                        │
//!    └────────────────────────────── save / close ◀───────────────────────────┘
//! ```
//!
//! # Overlapping selections
//!
//! Every selection returns a [`SelectionTicket`] with a monotonically
//! increasing id. A decode completion is applied only if its ticket is the
//! latest one issued; anything older is reported as [`DecodeOutcome::Stale`]
//! and leaves the session untouched. Closing the session also invalidates
//! every outstanding ticket.

use crate::config::CropPolicy;
use crate::debounce::RenderDebouncer;
use crate::error::{AvatarError, Result};
use crate::imaging::geometry::{
    Crop, PixelCrop, centered_aspect_crop, constrain_crop, convert_to_pixel_crop,
};
use crate::imaging::{
    Dimensions, DisplayTransform, EncodedAvatar, ImageBackend, OutputSurface, RenderParams,
    SourceImage,
};
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;

/// A file the user picked in the file-selection control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub name: String,
    pub path: PathBuf,
}

impl FileSelection {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }

    /// Read the selected file's bytes. The only suspension point of a selection.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Identity of one file selection, used to discard stale decode completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SelectionTicket(u64);

/// Result of applying a decode completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The image is now displayed with a default crop.
    Loaded(Dimensions),
    /// A newer selection (or a close) superseded this one; nothing changed.
    Stale,
}

/// Side effects the hosting environment must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Clear the file-selection control so the same file can be picked again.
    ResetFileInput,
}

/// Coarse session state, for hosts deciding what to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    AwaitingImage,
    DecodeFailed,
    DefaultCrop,
    AdjustedCrop,
    Rendering,
    Rendered,
}

/// What a completed render produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderReport {
    pub width: u32,
    pub height: u32,
    pub generation: u64,
}

#[derive(Debug)]
struct LoadedImage {
    source: Arc<SourceImage>,
    layout: DisplayTransform,
    /// Live crop, always constrained and in percent units.
    crop: Crop,
    adjusted: bool,
    completed: Option<PixelCrop>,
    surface: Option<OutputSurface>,
}

impl LoadedImage {
    fn pixel_crop(&self, aspect: f64) -> PixelCrop {
        convert_to_pixel_crop(
            &self.crop,
            self.layout.displayed_width,
            self.layout.displayed_height,
            aspect,
        )
    }
}

#[derive(Debug)]
enum ImageSlot {
    Empty,
    Failed(String),
    Loaded(Box<LoadedImage>),
}

#[derive(Debug)]
enum Phase {
    Closed,
    Open(ImageSlot),
}

/// Editing session state machine. See the [module docs](self).
pub struct CropSession<B: ImageBackend> {
    policy: CropPolicy,
    backend: Arc<B>,
    phase: Phase,
    latest_selection: u64,
    debouncer: RenderDebouncer,
    commands: Vec<HostCommand>,
}

impl<B: ImageBackend + 'static> CropSession<B> {
    pub fn new(policy: CropPolicy, backend: B) -> Self {
        Self::with_shared_backend(policy, Arc::new(backend))
    }

    pub fn with_shared_backend(policy: CropPolicy, backend: Arc<B>) -> Self {
        let debouncer = RenderDebouncer::new(policy.debounce());
        Self {
            policy,
            backend,
            phase: Phase::Closed,
            latest_selection: 0,
            debouncer,
            commands: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_open(&self) -> bool {
        matches!(self.phase, Phase::Open(_))
    }

    pub fn state(&self) -> SessionState {
        match &self.phase {
            Phase::Closed => SessionState::Closed,
            Phase::Open(ImageSlot::Empty) => SessionState::AwaitingImage,
            Phase::Open(ImageSlot::Failed(_)) => SessionState::DecodeFailed,
            Phase::Open(ImageSlot::Loaded(img)) => {
                if self.debouncer.is_pending() {
                    SessionState::Rendering
                } else if img.surface.as_ref().is_some_and(|s| s.has_content()) {
                    SessionState::Rendered
                } else if img.adjusted {
                    SessionState::AdjustedCrop
                } else {
                    SessionState::DefaultCrop
                }
            }
        }
    }

    /// The decode error shown to the user, if the last selection failed.
    pub fn decode_error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Open(ImageSlot::Failed(msg)) => Some(msg),
            _ => None,
        }
    }

    fn loaded(&self) -> Option<&LoadedImage> {
        match &self.phase {
            Phase::Open(ImageSlot::Loaded(img)) => Some(&**img),
            _ => None,
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedImage> {
        match &mut self.phase {
            Phase::Open(ImageSlot::Loaded(img)) => Ok(&mut **img),
            Phase::Open(_) => Err(AvatarError::NoImage),
            Phase::Closed => Err(AvatarError::SessionClosed),
        }
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.loaded().map(|img| img.source.as_ref())
    }

    pub fn layout(&self) -> Option<DisplayTransform> {
        self.loaded().map(|img| img.layout)
    }

    /// Live crop in percent units.
    pub fn crop(&self) -> Option<Crop> {
        self.loaded().map(|img| img.crop)
    }

    /// Live crop in whole displayed pixels.
    pub fn pixel_crop(&self) -> Option<PixelCrop> {
        let aspect = self.policy.aspect();
        self.loaded().map(|img| img.pixel_crop(aspect))
    }

    pub fn completed_crop(&self) -> Option<PixelCrop> {
        self.loaded().and_then(|img| img.completed)
    }

    pub fn surface(&self) -> Option<&OutputSurface> {
        self.loaded().and_then(|img| img.surface.as_ref())
    }

    pub fn render_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Drain the side effects queued for the host.
    pub fn take_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.commands)
    }

    // =========================================================================
    // Selection & decode
    // =========================================================================

    /// Handle a file-selection event.
    ///
    /// `None` (the user dismissed the picker) changes nothing. Otherwise the
    /// session opens, drops the previous image and crop, and returns the
    /// ticket the decode completion must present.
    pub fn select_file(&mut self, selection: Option<&FileSelection>) -> Option<SelectionTicket> {
        let selection = selection?;
        self.latest_selection += 1;
        self.debouncer.cancel();
        self.phase = Phase::Open(ImageSlot::Empty);
        debug!(
            "selection #{}: {}",
            self.latest_selection, selection.name
        );
        Some(SelectionTicket(self.latest_selection))
    }

    fn is_current(&self, ticket: SelectionTicket) -> bool {
        ticket.0 == self.latest_selection && self.is_open()
    }

    /// Apply the bytes read for `ticket`.
    ///
    /// Stale tickets are ignored. Decode failures move the session to
    /// [`SessionState::DecodeFailed`] and are returned.
    pub fn complete_decode(
        &mut self,
        ticket: SelectionTicket,
        bytes: &[u8],
    ) -> Result<DecodeOutcome> {
        if !self.is_current(ticket) {
            warn!(
                "discarding stale decode for selection #{} (latest #{})",
                ticket.0, self.latest_selection
            );
            return Ok(DecodeOutcome::Stale);
        }

        let source = match self.backend.decode(bytes) {
            Ok(source) => source,
            Err(e) => return self.reject_selection(ticket, e),
        };

        let dims = source.dimensions();
        let layout = DisplayTransform::natural(dims.width, dims.height);
        let Some(crop) = self.default_crop(&layout) else {
            let e = AvatarError::EmptyImage {
                width: dims.width,
                height: dims.height,
            };
            return self.reject_selection(ticket, e);
        };
        debug!(
            "selection #{} decoded {}x{}",
            ticket.0, dims.width, dims.height
        );
        self.phase = Phase::Open(ImageSlot::Loaded(Box::new(LoadedImage {
            source: Arc::new(source),
            layout,
            crop,
            adjusted: false,
            completed: None,
            surface: None,
        })));
        Ok(DecodeOutcome::Loaded(dims))
    }

    /// Report that reading the bytes for `ticket` failed.
    pub fn fail_decode(
        &mut self,
        ticket: SelectionTicket,
        error: std::io::Error,
    ) -> Result<DecodeOutcome> {
        if !self.is_current(ticket) {
            return Ok(DecodeOutcome::Stale);
        }
        self.reject_selection(ticket, AvatarError::Io(error))
    }

    /// Show `error` in place of the image for the current selection.
    fn reject_selection(
        &mut self,
        ticket: SelectionTicket,
        error: AvatarError,
    ) -> Result<DecodeOutcome> {
        warn!("selection #{} failed: {error}", ticket.0);
        self.phase = Phase::Open(ImageSlot::Failed(error.to_string()));
        Err(error)
    }

    /// Select, read and decode a file in one step.
    pub async fn load(&mut self, selection: &FileSelection) -> Result<DecodeOutcome> {
        let ticket = self
            .select_file(Some(selection))
            .ok_or(AvatarError::NoImage)?;
        match selection.read().await {
            Ok(bytes) => self.complete_decode(ticket, &bytes),
            Err(e) => self.fail_decode(ticket, e),
        }
    }

    fn default_crop(&self, layout: &DisplayTransform) -> Option<Crop> {
        centered_aspect_crop(
            layout.displayed_width,
            layout.displayed_height,
            self.policy.aspect(),
            self.policy.coverage_fraction(),
            self.policy.min_size,
        )
    }

    /// Report the measured on-screen layout of the image.
    ///
    /// An untouched default crop is recomputed for the new size; an adjusted
    /// crop keeps its relative position. A completed crop is re-snapshotted
    /// and its render rescheduled from `now`.
    pub fn set_display_layout(&mut self, layout: DisplayTransform, now: Instant) -> Result<()> {
        if !layout.is_usable() {
            return Err(AvatarError::EmptyImage {
                width: layout.displayed_width.max(0.0) as u32,
                height: layout.displayed_height.max(0.0) as u32,
            });
        }
        let default_crop = self.default_crop(&layout);
        let (aspect, min_size) = (self.policy.aspect(), self.policy.min_size);
        let img = self.loaded_mut()?;

        img.layout = layout;
        img.crop = match (img.adjusted, default_crop) {
            (false, Some(crop)) => crop,
            _ => constrain_crop(
                &img.crop,
                layout.displayed_width,
                layout.displayed_height,
                aspect,
                min_size,
            ),
        };
        if img.completed.is_some() {
            img.completed = Some(img.pixel_crop(aspect));
            self.debouncer.schedule(now);
        }
        Ok(())
    }

    // =========================================================================
    // Interactive crop & render
    // =========================================================================

    /// Live crop update from a drag/resize gesture.
    ///
    /// Returns the crop actually applied after constraints, in percent units.
    pub fn update_crop(&mut self, crop: Crop) -> Result<Crop> {
        let (aspect, min_size) = (self.policy.aspect(), self.policy.min_size);
        let img = self.loaded_mut()?;
        img.crop = constrain_crop(
            &crop,
            img.layout.displayed_width,
            img.layout.displayed_height,
            aspect,
            min_size,
        );
        img.adjusted = true;
        Ok(img.crop)
    }

    /// The gesture ended: snapshot the crop and schedule a debounced render.
    pub fn complete_crop(&mut self, now: Instant) -> Result<PixelCrop> {
        let aspect = self.policy.aspect();
        let img = self.loaded_mut()?;
        let snapshot = img.pixel_crop(aspect);
        img.completed = Some(snapshot);
        img.surface.get_or_insert_with(OutputSurface::new);
        let generation = self.debouncer.schedule(now);
        debug!(
            "crop completed at ({}, {}) {}x{}, render #{generation} scheduled",
            snapshot.x, snapshot.y, snapshot.width, snapshot.height
        );
        Ok(snapshot)
    }

    /// Run the pending render if its deadline has passed at `now`.
    pub fn tick(&mut self, now: Instant) -> Result<Option<RenderReport>> {
        match self.debouncer.take_due(now) {
            Some(generation) => self.render(generation).map(Some),
            None => Ok(None),
        }
    }

    /// Wait for the pending render's deadline on the tokio clock, then run it.
    pub async fn settle(&mut self) -> Result<Option<RenderReport>> {
        self.debouncer.wait().await;
        self.tick(Instant::now())
    }

    /// Run the pending render immediately, if there is one.
    pub fn flush(&mut self) -> Result<Option<RenderReport>> {
        match self.debouncer.take_now() {
            Some(generation) => self.render(generation).map(Some),
            None => Ok(None),
        }
    }

    fn render(&mut self, generation: u64) -> Result<RenderReport> {
        let device_pixel_ratio = self.policy.device_pixel_ratio;
        let backend = Arc::clone(&self.backend);
        let img = self.loaded_mut()?;
        let crop = img.completed.ok_or(AvatarError::NoSurface)?;
        let surface = img.surface.as_mut().ok_or(AvatarError::NoSurface)?;

        let params = RenderParams {
            crop,
            transform: img.layout,
            device_pixel_ratio,
        };
        backend.render(&img.source, &params, surface)?;
        let (width, height) = surface.dimensions();
        debug!("render #{generation} produced {width}x{height}");
        Ok(RenderReport {
            width,
            height,
            generation,
        })
    }

    /// Confirm the crop: encode the surface and close the session.
    ///
    /// A render still waiting on its debounce runs first so the payload always
    /// reflects the last completed crop. Fails with [`AvatarError::NoSurface`]
    /// if no crop was ever completed and with [`AvatarError::Encode`] if the
    /// encoder fails; on failure the session stays open.
    pub async fn save(&mut self) -> Result<EncodedAvatar> {
        if !self.is_open() {
            return Err(AvatarError::SessionClosed);
        }
        self.flush()?;
        let surface = match self.surface() {
            Some(surface) if surface.has_content() => surface.clone(),
            _ => return Err(AvatarError::NoSurface),
        };

        let backend = Arc::clone(&self.backend);
        let format = self.policy.output.format;
        let quality = self.policy.output.quality();
        let bytes = tokio::task::spawn_blocking(move || backend.encode(&surface, format, quality))
            .await
            .map_err(|e| AvatarError::Encode(format!("encoder task failed: {e}")))??;

        let avatar = EncodedAvatar::from_encoded(format, &bytes);
        debug!("saved avatar {}", avatar.fingerprint());
        self.close();
        Ok(avatar)
    }

    /// Close the session without committing anything.
    ///
    /// Drops the image, crop and surface, cancels a pending render,
    /// invalidates outstanding selections and queues a file-input reset.
    pub fn close(&mut self) {
        if self.is_open() {
            debug!("session closed");
        }
        self.phase = Phase::Closed;
        self.debouncer.cancel();
        self.latest_selection += 1;
        self.commands.push(HostCommand::ResetFileInput);
    }
}
