//! Overlay handle

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_skia::PixmapMut;
use tracing::{debug, info, warn};

use crate::channel::{CommandChannel, UpdateFlags};
use crate::error::{AosdError, Result};
use crate::fade::FadeTiming;
use crate::geometry::{Anchor, Geometry, ScreenInfo};
use crate::mouse::{MouseEvent, MouseHandler};
use crate::platform::{self, DisplayBackend};
use crate::render::Renderer;
use crate::transparency::Transparency;
use crate::worker::{self, Channel, FlashRequest, ReadyPredicate, Worker};

/// How a flash runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashOptions {
    pub timing: FadeTiming,
    /// Block until the cycle is over
    pub wait: bool,
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self {
            timing: FadeTiming::default(),
            wait: true,
        }
    }
}

impl FlashOptions {
    pub fn new(fade_in_ms: u64, full_ms: u64, fade_out_ms: u64) -> Self {
        Self {
            timing: FadeTiming::from_millis(fade_in_ms, full_ms, fade_out_ms),
            ..Self::default()
        }
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.timing = self.timing.with_tick(tick);
        self
    }
}

enum Lifecycle {
    /// No thread yet; the handle drives the worker directly
    Idle(Box<Worker>, Receiver<()>),
    Running(JoinHandle<()>),
    Destroyed,
}

/// A transparent overlay window with a fade state machine.
///
/// Setters are cheap until the first request that needs the update thread
/// (`flash`, `show`, `hide`, `render`, `sync`). After that every call is
/// posted to the thread and waits for its acknowledgement.
pub struct Aosd {
    channel: Arc<Channel>,
    state: Mutex<Lifecycle>,
    screen: ScreenInfo,
    geometry: Mutex<Geometry>,
    mode: Mutex<Transparency>,
    has_renderer: Mutex<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Aosd {
    /// Connect to the default display
    pub fn new() -> Result<Self> {
        crate::init();
        Self::with_backend(platform::connect_default()?)
    }

    /// Build an overlay on an already connected backend
    pub fn with_backend(mut backend: Box<dyn DisplayBackend>) -> Result<Self> {
        let screen = backend.screen();
        let mode = Transparency::default();
        backend.set_transparency(mode)?;

        let (channel, wake_rx) = CommandChannel::new();
        let channel = Arc::new(channel);
        let worker = Worker::new(backend, Arc::clone(&channel));
        debug!(
            width = screen.width,
            height = screen.height,
            outputs = screen.outputs.len(),
            "overlay created"
        );

        Ok(Self {
            channel,
            state: Mutex::new(Lifecycle::Idle(Box::new(worker), wake_rx)),
            screen,
            geometry: Mutex::new(Geometry::default()),
            mode: Mutex::new(mode),
            has_renderer: Mutex::new(false),
        })
    }

    /// Apply a setting directly while idle, or post it to the update thread
    fn update(
        &self,
        flags: UpdateFlags,
        direct: impl FnOnce(&mut Worker) -> Result<()>,
        fill: impl FnOnce(&mut worker::Requests),
    ) -> Result<()> {
        {
            let mut state = lock(&self.state);
            match &mut *state {
                Lifecycle::Idle(worker, _) => return direct(worker),
                Lifecycle::Destroyed => return Err(AosdError::Finished),
                Lifecycle::Running(_) => {}
            }
        }
        self.channel.request(flags, |requests, _| fill(requests))
    }

    /// Move the worker onto its own thread if it is not there yet
    fn ensure_running(&self) -> Result<()> {
        let mut state = lock(&self.state);
        match &*state {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Destroyed => return Err(AosdError::Finished),
            Lifecycle::Idle(..) => {}
        }

        let Lifecycle::Idle(worker, wake_rx) = std::mem::replace(&mut *state, Lifecycle::Destroyed)
        else {
            return Err(AosdError::Finished);
        };
        let spawned = thread::Builder::new()
            .name("aosd-update".into())
            .spawn(move || worker::run(*worker, wake_rx));
        match spawned {
            Ok(handle) => {
                *state = Lifecycle::Running(handle);
                Ok(())
            }
            Err(e) => {
                self.channel.mark_finished();
                Err(AosdError::ThreadStartFailure(e.to_string()))
            }
        }
    }

    /// Post a request that needs the update thread and wait for it
    fn request(
        &self,
        flags: UpdateFlags,
        fill: impl FnOnce(&mut worker::Requests, u64),
    ) -> Result<u64> {
        self.ensure_running()?;
        let epoch = self.channel.post(flags, fill)?;
        self.channel.wait_ack(epoch)?;
        Ok(epoch)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Geometry
    // ─────────────────────────────────────────────────────────────────────────

    pub fn screen(&self) -> &ScreenInfo {
        &self.screen
    }

    pub fn geometry(&self) -> Geometry {
        *lock(&self.geometry)
    }

    pub fn set_geometry(&self, geometry: Geometry) -> Result<()> {
        self.update(
            UpdateFlags::SIZE | UpdateFlags::POS,
            |w| w.set_geometry(geometry),
            |r| r.geometry = Some(geometry),
        )?;
        *lock(&self.geometry) = geometry;
        Ok(())
    }

    /// Place a `width`x`height` window inside an output (or the whole screen
    /// for `None`), anchored at `anchor` and shifted by the offsets
    pub fn set_position(
        &self,
        output: Option<usize>,
        anchor: Anchor,
        width: u32,
        height: u32,
        x_offset: i32,
        y_offset: i32,
    ) -> Result<()> {
        let area = self.screen.area(output)?;
        self.set_geometry(anchor.place(area, width, height, x_offset, y_offset))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Appearance
    // ─────────────────────────────────────────────────────────────────────────

    pub fn transparency(&self) -> Transparency {
        *lock(&self.mode)
    }

    pub fn set_transparency(&self, mode: Transparency) -> Result<()> {
        self.update(
            UpdateFlags::MODE,
            |w| w.set_transparency(mode),
            |r| r.mode = Some(mode),
        )?;
        *lock(&self.mode) = mode;
        Ok(())
    }

    /// Install the paint routine. It runs on the update thread.
    pub fn set_renderer<F>(&self, renderer: F) -> Result<()>
    where
        F: FnMut(&mut PixmapMut<'_>) + Send + 'static,
    {
        self.replace_renderer(Some(Box::new(renderer)))
    }

    /// Remove the paint routine; showing fails until a new one is set
    pub fn clear_renderer(&self) -> Result<()> {
        self.replace_renderer(None)
    }

    fn replace_renderer(&self, renderer: Option<Renderer>) -> Result<()> {
        let installed = renderer.is_some();
        let mut slot = Some(renderer);
        {
            let mut state = lock(&self.state);
            match &mut *state {
                Lifecycle::Idle(worker, _) => {
                    if let Some(renderer) = slot.take() {
                        worker.set_renderer(renderer);
                    }
                }
                Lifecycle::Destroyed => return Err(AosdError::Finished),
                Lifecycle::Running(_) => {}
            }
        }
        if slot.is_some() {
            self.channel
                .request(UpdateFlags::RENDER, |r, _| r.renderer = slot.take())?;
        }
        *lock(&self.has_renderer) = installed;
        Ok(())
    }

    pub fn set_name(&self, name: &str, class: &str) -> Result<()> {
        let owned = (name.to_string(), class.to_string());
        self.update(
            UpdateFlags::NAME,
            |w| w.set_name(name, class),
            |r| r.name = Some(owned),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pointer input
    // ─────────────────────────────────────────────────────────────────────────

    /// Receive pointer events. The window stops being click-through.
    pub fn set_mouse_handler<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(&MouseEvent) + Send + 'static,
    {
        self.replace_mouse_handler(Some(Box::new(handler)))
    }

    pub fn clear_mouse_handler(&self) -> Result<()> {
        self.replace_mouse_handler(None)
    }

    fn replace_mouse_handler(&self, handler: Option<MouseHandler>) -> Result<()> {
        let mut slot = Some(handler);
        {
            let mut state = lock(&self.state);
            match &mut *state {
                Lifecycle::Idle(worker, _) => {
                    if let Some(handler) = slot.take() {
                        return worker.set_mouse_handler(handler);
                    }
                }
                Lifecycle::Destroyed => return Err(AosdError::Finished),
                Lifecycle::Running(_) => {}
            }
        }
        self.channel
            .request(UpdateFlags::MOUSE, |r, _| r.mouse = slot.take())
    }

    /// Hide the window on any button press inside it
    pub fn set_hide_on_mouse(&self, enabled: bool) -> Result<()> {
        self.update(
            UpdateFlags::MOUSE,
            |w| w.set_hide_on_mouse(enabled),
            |r| r.hide_on_mouse = Some(enabled),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Requests served by the update thread
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one fade cycle.
    ///
    /// `ready` is polled on every animation tick; once it returns true the
    /// window is hidden immediately. With `options.wait` the call returns
    /// when the cycle is over, otherwise as soon as it has started. A timing
    /// of all zeros holds the window at full opacity until `hide`.
    pub fn flash(&self, options: FlashOptions, ready: Option<ReadyPredicate>) -> Result<()> {
        if !*lock(&self.has_renderer) {
            return Err(AosdError::NoRenderer);
        }
        let timing = options.timing;
        let epoch = self.request(UpdateFlags::TIME, |r, epoch| {
            r.flash = Some(FlashRequest {
                epoch,
                timing,
                ready,
            })
        })?;
        if options.wait && !timing.holds() {
            self.channel.wait_cycle(epoch)?;
        }
        Ok(())
    }

    /// Map the window at full opacity without starting a fade
    pub fn show(&self) -> Result<()> {
        if !*lock(&self.has_renderer) {
            return Err(AosdError::NoRenderer);
        }
        self.request(UpdateFlags::SHOW, |_, _| {}).map(drop)
    }

    /// Unmap the window, ending any fade in progress
    pub fn hide(&self) -> Result<()> {
        self.request(UpdateFlags::HIDE, |_, _| {}).map(drop)
    }

    /// Repaint with the current renderer
    pub fn render(&self) -> Result<()> {
        self.request(UpdateFlags::RENDER, |_, _| {}).map(drop)
    }

    /// Wait until every earlier request has been carried out
    pub fn sync(&self) -> Result<()> {
        self.request(UpdateFlags::NONE, |_, _| {}).map(drop)
    }

    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.state), Lifecycle::Running(_)) && !self.channel.is_finished()
    }

    /// Stop the update thread and release every display resource.
    /// Calling it again does nothing.
    pub fn destroy(&self) {
        let previous = std::mem::replace(&mut *lock(&self.state), Lifecycle::Destroyed);
        match previous {
            Lifecycle::Idle(worker, _) => {
                drop(worker);
                self.channel.mark_finished();
                info!("overlay destroyed before its thread started");
            }
            Lifecycle::Running(handle) => {
                if let Err(e) = self.channel.post(UpdateFlags::FINISH, |_, _| {}) {
                    debug!(error = %e, "update thread already finishing");
                }
                if handle.join().is_err() {
                    warn!("update thread panicked");
                }
                info!("overlay destroyed");
            }
            Lifecycle::Destroyed => {}
        }
    }
}

impl Drop for Aosd {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Aosd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aosd")
            .field("geometry", &self.geometry())
            .field("transparency", &self.transparency())
            .field("running", &self.is_running())
            .finish()
    }
}
