//! Update thread
//!
//! The [`Worker`] owns the display backend and every surface. Until the
//! first blocking request it lives inside the handle and setters call it
//! directly; afterwards it is moved onto its own thread and driven through
//! the [`CommandChannel`].

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::channel::{Batch, CommandChannel, UpdateFlags};
use crate::error::{AosdError, Result};
use crate::fade::{FadeAnimator, FadePhase, FadeTiming, MAX_ALPHA};
use crate::geometry::Geometry;
use crate::mouse::{MouseHandler, MouseRouter};
use crate::platform::DisplayBackend;
use crate::render::{RenderDispatch, Renderer};
use crate::transparency::{Background, Transparency};

/// Polled once per animation tick; returning true ends the cycle early
pub type ReadyPredicate = Box<dyn FnMut() -> bool + Send>;

/// How often pointer events are collected while the window takes input
const POINTER_POLL: Duration = Duration::from_millis(20);

/// How often a shown window checks for exposure without pointer input
const IDLE_POLL: Duration = Duration::from_millis(250);

pub(crate) struct FlashRequest {
    pub epoch: u64,
    pub timing: FadeTiming,
    pub ready: Option<ReadyPredicate>,
}

/// Payload carried alongside the update flags. Later posts overwrite
/// earlier ones that have not been taken yet.
#[derive(Default)]
pub(crate) struct Requests {
    pub geometry: Option<Geometry>,
    pub mode: Option<Transparency>,
    pub renderer: Option<Option<Renderer>>,
    pub mouse: Option<Option<MouseHandler>>,
    pub hide_on_mouse: Option<bool>,
    pub name: Option<(String, String)>,
    pub flash: Option<FlashRequest>,
}

pub(crate) type Channel = CommandChannel<Requests>;

pub(crate) struct Worker {
    backend: Box<dyn DisplayBackend>,
    channel: Arc<Channel>,
    geometry: Geometry,
    /// The window was unmapped to move a FAKE snapshot and must come back
    remap: bool,
    mode: Transparency,
    background: Background,
    dispatch: RenderDispatch,
    renderer: Option<Renderer>,
    mouse: MouseRouter,
    animator: FadeAnimator,
    /// Opacity of the frame on screen, `None` while hidden
    presented: Option<u8>,
    ready: Option<ReadyPredicate>,
    /// Epoch of the flash driving the current cycle
    cycle_epoch: u64,
    shown: bool,
}

impl Worker {
    pub fn new(backend: Box<dyn DisplayBackend>, channel: Arc<Channel>) -> Self {
        Self {
            backend,
            channel,
            geometry: Geometry::default(),
            remap: false,
            mode: Transparency::default(),
            background: Background::default(),
            dispatch: RenderDispatch::new(),
            renderer: None,
            mouse: MouseRouter::new(),
            animator: FadeAnimator::new(Instant::now()),
            presented: None,
            ready: None,
            cycle_epoch: 0,
            shown: false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settings (also called directly while no thread runs)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<()> {
        if geometry == self.geometry {
            return Ok(());
        }
        // The snapshot under a FAKE window is only valid where it was taken,
        // so moving it starts a new show cycle.
        if self.shown && self.mode.needs_background() {
            debug!(?geometry, "moving a snapshot window, recapturing");
            self.unmap()?;
            self.remap = true;
        }
        self.apply_geometry(geometry)
    }

    fn apply_geometry(&mut self, geometry: Geometry) -> Result<()> {
        if geometry == self.geometry {
            return Ok(());
        }
        self.backend.set_geometry(geometry)?;
        if !geometry.same_size(&self.geometry) {
            self.dispatch.invalidate();
        }
        self.geometry = geometry;
        self.background.invalidate();
        Ok(())
    }

    /// Switch transparency; on failure the previous mode stays in effect
    pub fn set_transparency(&mut self, mode: Transparency) -> Result<()> {
        if mode == self.mode {
            return Ok(());
        }
        self.backend.set_transparency(mode)?;
        debug!(from = ?self.mode, to = ?mode, "transparency changed");
        self.mode = mode;
        if mode.needs_background() {
            self.background.invalidate();
        } else {
            self.background.release();
        }
        Ok(())
    }

    pub fn set_renderer(&mut self, renderer: Option<Renderer>) {
        self.renderer = renderer;
        self.dispatch.invalidate();
    }

    pub fn set_mouse_handler(&mut self, handler: Option<MouseHandler>) -> Result<()> {
        self.mouse.set_handler(handler);
        self.backend.set_input_enabled(self.mouse.wants_input())
    }

    pub fn set_hide_on_mouse(&mut self, enabled: bool) -> Result<()> {
        self.mouse.set_hide_on_click(enabled);
        self.backend.set_input_enabled(self.mouse.wants_input())
    }

    pub fn set_name(&mut self, name: &str, class: &str) -> Result<()> {
        self.backend.set_name(name, class)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Batch execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Carry out one batch in the fixed order: hide, mode, geometry, then
    /// background capture, repaint, show and fade start. Every step runs
    /// even if an earlier one failed; the first error is reported.
    fn execute(&mut self, batch: Batch<Requests>) -> Result<()> {
        let Batch { flags, payload, .. } = batch;
        let Requests {
            geometry,
            mode,
            renderer,
            mouse,
            hide_on_mouse,
            name,
            flash,
        } = payload;

        let mut outcome = Ok(());
        let mut record = |result: Result<()>| {
            if let Err(e) = result
                && outcome.is_ok()
            {
                outcome = Err(e);
            }
        };

        if let Some(renderer) = renderer {
            self.set_renderer(renderer);
        }
        if let Some(handler) = mouse {
            record(self.set_mouse_handler(handler));
        }
        if let Some(enabled) = hide_on_mouse {
            record(self.set_hide_on_mouse(enabled));
        }
        if let Some((name, class)) = name {
            record(self.set_name(&name, &class));
        }

        if flags.contains(UpdateFlags::HIDE) {
            record(self.hide_now());
        }
        if let Some(mode) = mode {
            record(self.set_transparency(mode));
        }
        if let Some(geometry) = geometry {
            record(self.set_geometry(geometry));
        }

        let remap = std::mem::take(&mut self.remap);
        if let Some(flash) = flash {
            record(self.begin_cycle(flash));
        } else if remap && self.renderer.is_none() {
            record(self.hide_now());
        } else if remap || flags.contains(UpdateFlags::SHOW) {
            let opacity = self.current_opacity(Instant::now());
            record(self.show_frame(opacity));
        } else if self.shown
            && flags.intersects(UpdateFlags::RENDER | UpdateFlags::SIZE | UpdateFlags::MODE)
        {
            if self.renderer.is_none() {
                record(self.hide_now());
            } else {
                let opacity = self.current_opacity(Instant::now());
                self.dispatch.invalidate();
                record(self.repaint(opacity));
            }
        }

        outcome
    }

    fn current_opacity(&self, now: Instant) -> u8 {
        if self.animator.is_active() {
            self.animator.opacity(now)
        } else {
            MAX_ALPHA
        }
    }

    /// Start a fade cycle, restarting any cycle in progress
    fn begin_cycle(&mut self, flash: FlashRequest) -> Result<()> {
        if self.renderer.is_none() {
            return Err(AosdError::NoRenderer);
        }

        // Anything older than this flash is superseded.
        self.channel.cycle_done(flash.epoch.saturating_sub(1));

        if self.shown {
            self.unmap()?;
        }

        let now = Instant::now();
        self.ready = flash.ready;
        self.cycle_epoch = flash.epoch;
        self.animator.start(flash.timing, now);
        self.dispatch.invalidate();
        debug!(
            epoch = flash.epoch,
            timing = ?flash.timing,
            phase = ?self.animator.phase(),
            "fade cycle started"
        );

        let opacity = self.animator.opacity(now);
        self.show_frame(opacity)
    }

    /// Map the window with a fresh frame, capturing the background first
    /// when the window was hidden
    fn show_frame(&mut self, opacity: u8) -> Result<()> {
        if !self.shown {
            if self.mode.needs_background() && !self.background.is_valid() {
                let snapshot = self.backend.capture_background(self.geometry)?;
                self.background.store(snapshot);
                trace!(geometry = ?self.geometry, "background captured");
            }
            self.backend.show()?;
            self.shown = true;
        }
        self.repaint(opacity)
    }

    /// Compose and present; the renderer only runs when the drawing is stale
    fn repaint(&mut self, opacity: u8) -> Result<()> {
        if !self.dispatch.is_painted() {
            let renderer = self.renderer.as_mut().ok_or(AosdError::NoRenderer)?;
            self.dispatch.paint(&self.geometry, renderer)?;
        }
        let frame = self
            .dispatch
            .compose(&self.geometry, self.mode, &self.background, opacity)?;
        self.backend.present(frame)?;
        self.presented = Some(opacity);
        Ok(())
    }

    /// Unmap without ending the cycle; the snapshot goes with the window
    fn unmap(&mut self) -> Result<()> {
        self.backend.hide()?;
        self.shown = false;
        self.presented = None;
        self.background.invalidate();
        Ok(())
    }

    /// Unmap and end the current cycle
    fn hide_now(&mut self) -> Result<()> {
        self.presented = None;
        let result = if self.shown {
            self.shown = false;
            self.backend.hide()
        } else {
            Ok(())
        };
        self.background.invalidate();
        if self.animator.is_active() {
            self.animator.cancel();
        }
        self.animator.reset(Instant::now());
        self.ready = None;
        self.channel.cycle_done(self.cycle_epoch);
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Animation and input
    // ─────────────────────────────────────────────────────────────────────────

    fn tick(&mut self, now: Instant) {
        if !self.animator.is_active() {
            return;
        }

        let phase = self.animator.advance(now);
        let ready = phase != FadePhase::Hidden
            && self.ready.as_mut().is_some_and(|ready| ready());
        if ready {
            debug!(epoch = self.cycle_epoch, "caller ready, cycle cut short");
            self.animator.cancel();
        }

        if !self.animator.is_active() {
            trace!(epoch = self.cycle_epoch, "fade cycle over");
            if let Err(e) = self.hide_now() {
                warn!(error = %e, "failed to hide at end of cycle");
            }
            return;
        }

        let opacity = self.animator.opacity(now);
        if self.presented == Some(opacity) {
            return;
        }
        if let Err(e) = self.repaint(opacity) {
            warn!(error = %e, opacity, "fade frame failed");
        }
    }

    fn poll_pointer(&mut self) {
        if !self.shown {
            return;
        }
        let events = match self.backend.poll_pointer() {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "pointer poll failed");
                return;
            }
        };
        for event in events {
            if self.mouse.route(&event, &self.geometry) {
                debug!(?event, "click requested hide");
                // Ignored when finishing; the window goes away regardless.
                let _ = self.channel.post(UpdateFlags::HIDE, |_, _| {});
            }
        }
    }

    /// How long the loop may block before it has work to do
    fn wait_timeout(&self, deadline: Option<Instant>, now: Instant) -> Option<Duration> {
        let poll = match (self.shown, self.mouse.wants_input()) {
            (false, _) => None,
            (true, true) => Some(POINTER_POLL),
            (true, false) => Some(IDLE_POLL),
        };
        let until_deadline = deadline.map(|d| d.saturating_duration_since(now));
        match (until_deadline, poll) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.hide_now() {
            warn!(error = %e, "failed to hide during shutdown");
        }
        if let Err(e) = self.backend.sync() {
            trace!(error = %e, "final sync failed");
        }
        self.dispatch.release();
        self.background.release();
    }
}

/// Marks the channel finished even if the update thread unwinds
struct FinishGuard(Arc<Channel>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

/// Update thread body
pub(crate) fn run(mut worker: Worker, wake_rx: Receiver<()>) {
    let channel = Arc::clone(&worker.channel);
    let _guard = FinishGuard(Arc::clone(&channel));
    let mut acked = 0;

    info!("update thread started");
    loop {
        let now = Instant::now();
        let deadline = worker.animator.next_deadline(now, worker.ready.is_some());
        let woke = match worker.wait_timeout(deadline, now) {
            None => wake_rx.recv().is_ok(),
            Some(timeout) => !matches!(
                wake_rx.recv_timeout(timeout),
                Err(RecvTimeoutError::Disconnected)
            ),
        };
        if !woke {
            break;
        }
        while wake_rx.try_recv().is_ok() {}

        worker.poll_pointer();

        let batch = channel.take();
        let flags = batch.flags;
        let epoch = batch.epoch;
        if epoch > acked {
            trace!(?flags, epoch, "batch");
            let result = worker.execute(batch);
            if let Err(e) = &result {
                warn!(error = %e, ?flags, "update failed");
            }
            channel.complete(acked, epoch, result);
            acked = epoch;
        }
        if flags.contains(UpdateFlags::FINISH) {
            break;
        }

        let now = Instant::now();
        if !flags.contains(UpdateFlags::TIME) && deadline.is_some_and(|d| now >= d) {
            worker.tick(now);
        }
    }

    worker.shutdown();
    drop(worker);
    info!("update thread finished");
}
