//! X11 display backend
//!
//! Uses XCB via x11rb. The window is override-redirect so no window manager
//! decorates or moves it. Frames are pushed through a MIT-SHM segment when
//! the server supports it and with plain `PutImage` otherwise.
//!
//! Composite transparency needs a 32-bit ARGB visual with a matching Render
//! picture format and a running compositing manager. Switching to or from it
//! recreates the window with the other visual.

use std::fs::File;
use std::os::fd::AsFd;

use rustix::fs::{MemfdFlags, memfd_create};
use rustix::mm::{MapFlags, ProtFlags, mmap};
use tiny_skia::Pixmap;
use tracing::{debug, info, trace, warn};
use x11rb::atom_manager;
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::Event;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::render::{self, ConnectionExt as _, PictType};
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::shm::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::DisplayBackend;
use crate::error::{AosdError, Result};
use crate::geometry::{Geometry, OutputInfo, ScreenInfo};
use crate::mouse::{MouseEventKind, PointerEvent};
use crate::transparency::Transparency;

// Atoms needed for EWMH hints
atom_manager! {
    pub AtomCollection: AtomCollectionCookie {
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_NOTIFICATION,
        _NET_WM_STATE,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_SKIP_TASKBAR,
        _NET_WM_STATE_SKIP_PAGER,
        _NET_WM_NAME,
        UTF8_STRING,
        ATOM,
    }
}

fn backend_err(e: impl std::fmt::Display) -> AosdError {
    AosdError::Backend(e.to_string())
}

fn alloc_err(e: impl std::fmt::Display) -> AosdError {
    AosdError::AllocationFailure(e.to_string())
}

/// X rejects zero-sized windows
fn window_extent(n: u32) -> u16 {
    n.clamp(1, u16::MAX as u32) as u16
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Enumeration
// ─────────────────────────────────────────────────────────────────────────────

fn query_outputs(conn: &RustConnection, root: Window) -> Vec<OutputInfo> {
    let Ok(monitors) = conn.randr_get_monitors(root, true) else {
        return Vec::new();
    };
    let Ok(monitors) = monitors.reply() else {
        return Vec::new();
    };

    monitors
        .monitors
        .iter()
        .enumerate()
        .map(|(idx, mon)| {
            let name = conn
                .get_atom_name(mon.name)
                .ok()
                .and_then(|r| r.reply().ok())
                .map(|r| String::from_utf8_lossy(&r.name).to_string())
                .unwrap_or_else(|| format!("Output {}", idx));

            OutputInfo {
                name,
                area: Geometry::new(
                    mon.x as i32,
                    mon.y as i32,
                    mon.width as u32,
                    mon.height as u32,
                ),
                is_primary: mon.primary,
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared Memory Transfer
// ─────────────────────────────────────────────────────────────────────────────

/// SHM buffer for pixel transfer
struct ShmBuffer {
    seg_id: shm::Seg,
    ptr: *mut u8,
    size: usize,
    width: u32,
    height: u32,
}

// SAFETY: the mapping is only touched by the thread that owns the backend
unsafe impl Send for ShmBuffer {}

impl ShmBuffer {
    fn create(conn: &RustConnection, width: u32, height: u32) -> Result<Self> {
        let size = (width * height * 4) as usize;

        let fd = memfd_create(c"aosd-x11-buffer", MemfdFlags::CLOEXEC)
            .map_err(|e| alloc_err(format!("memfd_create failed: {}", e)))?;

        rustix::fs::ftruncate(&fd, size as u64)
            .map_err(|e| alloc_err(format!("ftruncate failed: {}", e)))?;

        // SAFETY: fresh anonymous mapping of a file we just sized
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd.as_fd(),
                0,
            )
            .map_err(|e| alloc_err(format!("mmap failed: {}", e)))?
        };

        let seg_id = match conn.generate_id() {
            Ok(id) => id,
            Err(e) => {
                // SAFETY: unmapping the region mapped above
                unsafe {
                    rustix::mm::munmap(ptr, size).ok();
                }
                return Err(alloc_err(e));
            }
        };

        // shm_attach_fd takes ownership of the fd
        let file = File::from(fd);
        if let Err(e) = conn.shm_attach_fd(seg_id, file, false) {
            // SAFETY: unmapping the region mapped above
            unsafe {
                rustix::mm::munmap(ptr, size).ok();
            }
            return Err(alloc_err(format!("shm_attach_fd failed: {}", e)));
        }

        Ok(Self {
            seg_id,
            ptr: ptr as *mut u8,
            size,
            width,
            height,
        })
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr/size describe a live mapping owned by self
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    fn release(&mut self, conn: &RustConnection) {
        let _ = conn.shm_detach(self.seg_id);
        // SAFETY: the mapping is not used after this point
        unsafe {
            rustix::mm::munmap(self.ptr as *mut _, self.size).ok();
        }
    }
}

/// Premultiplied RGBA to the server's BGRA layout
fn rgba_to_bgra(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        d[0] = s[2];
        d[1] = s[1];
        d[2] = s[0];
        d[3] = s[3];
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// X11 Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Server-side objects making up the window
#[derive(Debug, Clone, Copy)]
struct WindowResources {
    window: Window,
    gc: Gcontext,
    /// Only owned when the window uses a non-default visual
    colormap: Option<Colormap>,
    depth: u8,
    visual: Visualid,
}

#[derive(Debug, Clone, Copy)]
struct StoredFrame {
    width: u32,
    height: u32,
    in_shm: bool,
}

pub struct X11Backend {
    conn: RustConnection,
    screen_num: usize,
    root: Window,
    atoms: AtomCollection,
    win: WindowResources,
    geometry: Geometry,
    shm_available: bool,
    shm: Option<ShmBuffer>,
    staging: Vec<u8>,
    /// Where the last presented frame lives, for exposure repaints
    frame: Option<StoredFrame>,
    input_enabled: bool,
    mapped: bool,
    name: Option<(String, String)>,
}

impl X11Backend {
    /// Connect to `display` (or `$DISPLAY`) and create the overlay window
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(display).map_err(|e| AosdError::DisplayUnavailable(e.to_string()))?;

        let atoms = AtomCollection::new(&conn)
            .map_err(|e| AosdError::DisplayUnavailable(e.to_string()))?
            .reply()
            .map_err(|e| AosdError::DisplayUnavailable(e.to_string()))?;

        let root = conn.setup().roots[screen_num].root;

        conn.shape_query_version()
            .map_err(|_| AosdError::DisplayUnavailable("Shape extension missing".into()))?
            .reply()
            .map_err(|_| AosdError::DisplayUnavailable("Shape extension missing".into()))?;

        let shm_available = conn
            .shm_query_version()
            .ok()
            .and_then(|c| c.reply().ok())
            .is_some();
        if !shm_available {
            info!("MIT-SHM unavailable, falling back to PutImage");
        }

        let mode = Transparency::default();
        let win = Self::create_window(&conn, screen_num, mode)?;

        let backend = Self {
            conn,
            screen_num,
            root,
            atoms,
            win,
            geometry: Geometry::new(0, 0, 1, 1),
            shm_available,
            shm: None,
            staging: Vec::new(),
            frame: None,
            input_enabled: false,
            mapped: false,
            name: None,
        };
        backend.setup_window_hints()?;
        backend.update_input_shape();

        info!(window = backend.win.window, screen = screen_num, "X11 overlay window created");
        Ok(backend)
    }

    fn x_screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    /// Find a 32-bit ARGB visual backed by a Render format with alpha
    fn find_argb_visual(conn: &RustConnection, screen_num: usize) -> Option<(Visualid, u8)> {
        conn.extension_information(render::X11_EXTENSION_NAME)
            .ok()
            .flatten()?;

        let formats = conn.render_query_pict_formats().ok()?.reply().ok()?;
        let alpha_formats: Vec<render::Pictformat> = formats
            .formats
            .iter()
            .filter(|f| f.type_ == PictType::DIRECT && f.depth == 32 && f.direct.alpha_mask != 0)
            .map(|f| f.id)
            .collect();

        let pict_screen = formats.screens.get(screen_num)?;
        let screen = &conn.setup().roots[screen_num];
        pict_screen
            .depths
            .iter()
            .filter(|d| d.depth == 32)
            .flat_map(|d| d.visuals.iter())
            .find(|v| {
                alpha_formats.contains(&v.format)
                    && screen
                        .allowed_depths
                        .iter()
                        .flat_map(|d| d.visuals.iter())
                        .any(|sv| sv.visual_id == v.visual && sv.class == VisualClass::TRUE_COLOR)
            })
            .map(|v| (v.visual, 32))
    }

    /// A compositing manager owns `_NET_WM_CM_Sn`
    fn compositor_running(conn: &RustConnection, screen_num: usize) -> bool {
        let name = format!("_NET_WM_CM_S{}", screen_num);
        let Some(atom) = conn
            .intern_atom(false, name.as_bytes())
            .ok()
            .and_then(|c| c.reply().ok())
            .map(|r| r.atom)
        else {
            return false;
        };
        conn.get_selection_owner(atom)
            .ok()
            .and_then(|c| c.reply().ok())
            .is_some_and(|r| r.owner != x11rb::NONE)
    }

    fn create_window(
        conn: &RustConnection,
        screen_num: usize,
        mode: Transparency,
    ) -> Result<WindowResources> {
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;

        let (visual, depth) = if mode.needs_alpha_visual() {
            Self::find_argb_visual(conn, screen_num)
                .ok_or(AosdError::UnsupportedMode(mode))?
        } else {
            (screen.root_visual, screen.root_depth)
        };

        let colormap = if visual == screen.root_visual {
            None
        } else {
            let colormap = conn.generate_id().map_err(alloc_err)?;
            conn.create_colormap(ColormapAlloc::NONE, colormap, root, visual)
                .map_err(alloc_err)?;
            Some(colormap)
        };

        let window = match Self::new_window(conn, root, depth, visual, colormap) {
            Ok(window) => window,
            Err(e) => {
                Self::release_partial(conn, None, colormap);
                return Err(e);
            }
        };
        let gc = match Self::new_gc(conn, window) {
            Ok(gc) => gc,
            Err(e) => {
                Self::release_partial(conn, Some(window), colormap);
                return Err(e);
            }
        };

        Ok(WindowResources {
            window,
            gc,
            colormap,
            depth,
            visual,
        })
    }

    fn new_window(
        conn: &RustConnection,
        root: Window,
        depth: u8,
        visual: Visualid,
        colormap: Option<Colormap>,
    ) -> Result<Window> {
        let window = conn.generate_id().map_err(alloc_err)?;
        let mut win_aux = CreateWindowAux::new()
            .border_pixel(0)
            .event_mask(
                EventMask::EXPOSURE
                    | EventMask::BUTTON_PRESS
                    | EventMask::BUTTON_RELEASE
                    | EventMask::POINTER_MOTION,
            )
            .override_redirect(1);
        win_aux = match colormap {
            // Transparent until the first frame lands
            Some(colormap) => win_aux.colormap(colormap).background_pixel(0),
            None => win_aux.background_pixmap(x11rb::NONE),
        };

        conn.create_window(
            depth,
            window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &win_aux,
        )
        .map_err(alloc_err)?
        .check()
        .map_err(alloc_err)?;
        Ok(window)
    }

    fn new_gc(conn: &RustConnection, window: Window) -> Result<Gcontext> {
        let gc = conn.generate_id().map_err(alloc_err)?;
        conn.create_gc(gc, window, &CreateGCAux::new())
            .map_err(alloc_err)?
            .check()
            .map_err(alloc_err)?;
        Ok(gc)
    }

    /// Free what a failed `create_window` had already acquired
    fn release_partial(conn: &RustConnection, window: Option<Window>, colormap: Option<Colormap>) {
        if let Some(window) = window {
            let _ = conn.destroy_window(window);
        }
        if let Some(colormap) = colormap {
            let _ = conn.free_colormap(colormap);
        }
        let _ = conn.flush();
    }

    fn destroy_window(&self, win: WindowResources) {
        let _ = self.conn.free_gc(win.gc);
        let _ = self.conn.destroy_window(win.window);
        if let Some(colormap) = win.colormap {
            let _ = self.conn.free_colormap(colormap);
        }
    }

    /// Set EWMH hints for overlay behavior
    fn setup_window_hints(&self) -> Result<()> {
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.win.window,
                self.atoms._NET_WM_WINDOW_TYPE,
                self.atoms.ATOM,
                &[self.atoms._NET_WM_WINDOW_TYPE_NOTIFICATION],
            )
            .map_err(backend_err)?;

        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.win.window,
                self.atoms._NET_WM_STATE,
                self.atoms.ATOM,
                &[
                    self.atoms._NET_WM_STATE_ABOVE,
                    self.atoms._NET_WM_STATE_SKIP_TASKBAR,
                    self.atoms._NET_WM_STATE_SKIP_PAGER,
                ],
            )
            .map_err(backend_err)?;

        Ok(())
    }

    fn apply_name(&self) -> Result<()> {
        let Some((name, class)) = &self.name else {
            return Ok(());
        };

        let mut wm_class = Vec::with_capacity(name.len() + class.len() + 2);
        wm_class.extend_from_slice(name.as_bytes());
        wm_class.push(0);
        wm_class.extend_from_slice(class.as_bytes());
        wm_class.push(0);

        self.conn
            .change_property8(
                PropMode::REPLACE,
                self.win.window,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                &wm_class,
            )
            .map_err(backend_err)?;
        self.conn
            .change_property8(
                PropMode::REPLACE,
                self.win.window,
                self.atoms._NET_WM_NAME,
                self.atoms.UTF8_STRING,
                name.as_bytes(),
            )
            .map_err(backend_err)?;
        Ok(())
    }

    /// Update input shape for click-through
    fn update_input_shape(&self) {
        let rects = if self.input_enabled {
            vec![Rectangle {
                x: 0,
                y: 0,
                width: window_extent(self.geometry.width),
                height: window_extent(self.geometry.height),
            }]
        } else {
            // Empty input region - clicks pass through
            Vec::new()
        };
        let _ = self.conn.shape_rectangles(
            shape::SO::SET,
            shape::SK::INPUT,
            ClipOrdering::UNSORTED,
            self.win.window,
            0,
            0,
            &rects,
        );
    }

    fn configure(&self) -> Result<()> {
        self.conn
            .configure_window(
                self.win.window,
                &ConfigureWindowAux::new()
                    .x(self.geometry.x)
                    .y(self.geometry.y)
                    .width(window_extent(self.geometry.width) as u32)
                    .height(window_extent(self.geometry.height) as u32),
            )
            .map_err(backend_err)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush().map_err(backend_err)
    }

    /// Copy the last converted frame into the window
    fn put_frame(&self) -> Result<()> {
        let Some(frame) = self.frame else {
            return Ok(());
        };
        let (window, gc, depth) = (self.win.window, self.win.gc, self.win.depth);
        let (width, height) = (frame.width as u16, frame.height as u16);

        match self.shm.as_ref() {
            Some(buffer) if frame.in_shm => {
                self.conn
                    .shm_put_image(
                        window,
                        gc,
                        width,
                        height,
                        0,
                        0,
                        width,
                        height,
                        0,
                        0,
                        depth,
                        ImageFormat::Z_PIXMAP.into(),
                        false,
                        buffer.seg_id,
                        0,
                    )
                    .map_err(backend_err)?;
            }
            _ => {
                self.conn
                    .put_image(
                        ImageFormat::Z_PIXMAP,
                        window,
                        gc,
                        width,
                        height,
                        0,
                        0,
                        0,
                        depth,
                        &self.staging,
                    )
                    .map_err(backend_err)?;
            }
        }
        self.flush()
    }

    fn ensure_shm(&mut self, width: u32, height: u32) -> Option<&mut ShmBuffer> {
        if !self.shm_available {
            return None;
        }
        let stale = self
            .shm
            .as_ref()
            .is_some_and(|b| b.width != width || b.height != height);
        if stale {
            if let Some(mut old) = self.shm.take() {
                old.release(&self.conn);
            }
        }
        if self.shm.is_none() {
            match ShmBuffer::create(&self.conn, width, height) {
                Ok(buffer) => self.shm = Some(buffer),
                Err(e) => {
                    warn!(error = %e, "SHM buffer creation failed, using PutImage");
                    self.shm_available = false;
                    return None;
                }
            }
        }
        self.shm.as_mut()
    }

    /// Capture `area` clipped to the screen; parts outside stay black
    fn read_root(&self, area: Geometry) -> Result<Pixmap> {
        let mut pixmap = Pixmap::new(area.width, area.height).ok_or_else(|| {
            AosdError::AllocationFailure(format!("{}x{} capture", area.width, area.height))
        })?;
        pixmap.fill(tiny_skia::Color::BLACK);

        let screen = self.x_screen();
        let x0 = area.x.max(0);
        let y0 = area.y.max(0);
        let x1 = (area.x + area.width as i32).min(screen.width_in_pixels as i32);
        let y1 = (area.y + area.height as i32).min(screen.height_in_pixels as i32);
        if x1 <= x0 || y1 <= y0 {
            return Ok(pixmap);
        }
        let (w, h) = ((x1 - x0) as u32, (y1 - y0) as u32);

        let image = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                self.root,
                x0 as i16,
                y0 as i16,
                w as u16,
                h as u16,
                !0,
            )
            .map_err(backend_err)?
            .reply()
            .map_err(backend_err)?;

        if image.data.len() < (w * h * 4) as usize {
            return Err(AosdError::Backend(format!(
                "unexpected root image format (depth {})",
                image.depth
            )));
        }

        let stride = area.width as usize * 4;
        let data = pixmap.data_mut();
        for row in 0..h as usize {
            let dst_row = (y0 - area.y) as usize + row;
            let dst_col = (x0 - area.x) as usize;
            let src = &image.data[row * w as usize * 4..(row + 1) * w as usize * 4];
            let dst = &mut data[dst_row * stride + dst_col * 4..][..w as usize * 4];
            for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
                d[0] = s[2];
                d[1] = s[1];
                d[2] = s[0];
                d[3] = 255;
            }
        }
        Ok(pixmap)
    }
}

impl DisplayBackend for X11Backend {
    fn screen(&self) -> ScreenInfo {
        let screen = self.x_screen();
        ScreenInfo {
            width: screen.width_in_pixels as u32,
            height: screen.height_in_pixels as u32,
            outputs: query_outputs(&self.conn, self.root),
        }
    }

    fn set_transparency(&mut self, mode: Transparency) -> Result<()> {
        if mode.needs_alpha_visual() && !Self::compositor_running(&self.conn, self.screen_num) {
            return Err(AosdError::UnsupportedMode(mode));
        }

        let wanted_alpha = mode.needs_alpha_visual();
        let has_alpha = self.win.depth == 32;
        if wanted_alpha != has_alpha {
            let fresh = Self::create_window(&self.conn, self.screen_num, mode)?;
            let old = std::mem::replace(&mut self.win, fresh);
            self.destroy_window(old);
            debug!(
                window = self.win.window,
                depth = self.win.depth,
                visual = self.win.visual,
                "Recreated overlay window for transparency change"
            );

            self.setup_window_hints()?;
            self.apply_name()?;
            self.configure()?;
            self.update_input_shape();
            if self.mapped {
                self.conn.map_window(self.win.window).map_err(backend_err)?;
            }
        }

        debug!(mode = ?mode, "Transparency mode applied");
        self.flush()
    }

    fn set_geometry(&mut self, geometry: Geometry) -> Result<()> {
        self.geometry = geometry;
        self.configure()?;
        if self.input_enabled {
            self.update_input_shape();
        }
        self.flush()
    }

    fn set_input_enabled(&mut self, enabled: bool) -> Result<()> {
        self.input_enabled = enabled;
        self.update_input_shape();
        self.flush()
    }

    fn set_name(&mut self, name: &str, class: &str) -> Result<()> {
        self.name = Some((name.to_string(), class.to_string()));
        self.apply_name()?;
        self.flush()
    }

    fn capture_background(&mut self, area: Geometry) -> Result<Pixmap> {
        if self.mapped {
            return Err(AosdError::Backend("cannot capture behind a mapped window".into()));
        }
        self.read_root(area)
    }

    fn present(&mut self, frame: &Pixmap) -> Result<()> {
        let (width, height) = (frame.width(), frame.height());
        if let Some(buffer) = self.ensure_shm(width, height) {
            rgba_to_bgra(frame.data(), buffer.as_mut_slice());
            self.frame = Some(StoredFrame {
                width,
                height,
                in_shm: true,
            });
        } else {
            self.staging.resize(frame.data().len(), 0);
            rgba_to_bgra(frame.data(), &mut self.staging);
            self.frame = Some(StoredFrame {
                width,
                height,
                in_shm: false,
            });
        }
        self.put_frame()
    }

    fn show(&mut self) -> Result<()> {
        self.conn.map_window(self.win.window).map_err(backend_err)?;
        self.conn
            .configure_window(
                self.win.window,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )
            .map_err(backend_err)?;
        self.mapped = true;
        self.flush()
    }

    fn hide(&mut self) -> Result<()> {
        self.conn.unmap_window(self.win.window).map_err(backend_err)?;
        self.mapped = false;
        // Make sure the area is repainted before anyone captures it
        self.sync()
    }

    fn poll_pointer(&mut self) -> Result<Vec<PointerEvent>> {
        let mut events = Vec::new();
        let mut exposed = false;
        while let Some(event) = self.conn.poll_for_event().map_err(backend_err)? {
            match event {
                Event::Expose(e) if e.window == self.win.window && e.count == 0 => {
                    exposed = true;
                }
                Event::ButtonPress(e) if e.event == self.win.window => {
                    events.push(PointerEvent {
                        kind: MouseEventKind::Press,
                        root_x: e.root_x as i32,
                        root_y: e.root_y as i32,
                        button: e.detail,
                        time: e.time,
                    });
                }
                Event::ButtonRelease(e) if e.event == self.win.window => {
                    events.push(PointerEvent {
                        kind: MouseEventKind::Release,
                        root_x: e.root_x as i32,
                        root_y: e.root_y as i32,
                        button: e.detail,
                        time: e.time,
                    });
                }
                Event::MotionNotify(e) if e.event == self.win.window => {
                    events.push(PointerEvent {
                        kind: MouseEventKind::Motion,
                        root_x: e.root_x as i32,
                        root_y: e.root_y as i32,
                        button: 0,
                        time: e.time,
                    });
                }
                Event::Error(e) => {
                    warn!(error = ?e, "X11 protocol error");
                }
                _ => {}
            }
        }
        if exposed && self.mapped {
            trace!("window exposed, repainting");
            self.put_frame()?;
        }
        Ok(events)
    }

    fn sync(&mut self) -> Result<()> {
        self.conn
            .get_input_focus()
            .map_err(backend_err)?
            .reply()
            .map_err(backend_err)?;
        Ok(())
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        if let Some(mut buffer) = self.shm.take() {
            buffer.release(&self.conn);
        }
        self.destroy_window(self.win);
        let _ = self.conn.flush();
        debug!("X11 overlay resources released");
    }
}
