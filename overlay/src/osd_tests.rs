//! Tests for the overlay handle and its update thread
//!
//! Everything runs against the headless backend, which records every
//! display request with a timestamp.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tiny_skia::{Color, PixmapMut};

use crate::error::AosdError;
use crate::geometry::{Geometry, ScreenInfo};
use crate::mouse::{MouseEventKind, PointerEvent};
use crate::osd::{Aosd, FlashOptions};
use crate::platform::headless::{HeadlessBackend, HeadlessProbe};
use crate::transparency::Transparency;

// ═══════════════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════════════

const AREA: Geometry = Geometry {
    x: 10,
    y: 20,
    width: 40,
    height: 10,
};

fn screen() -> ScreenInfo {
    ScreenInfo {
        width: 800,
        height: 600,
        outputs: Vec::new(),
    }
}

fn white(pixmap: &mut PixmapMut<'_>) {
    pixmap.fill(Color::WHITE);
}

/// Overlay with a geometry and a white renderer, thread not started
fn overlay() -> (Aosd, HeadlessProbe) {
    overlay_on(HeadlessBackend::new(screen()))
}

fn overlay_on((backend, probe): (HeadlessBackend, HeadlessProbe)) -> (Aosd, HeadlessProbe) {
    let osd = Aosd::with_backend(Box::new(backend)).unwrap();
    osd.set_geometry(AREA).unwrap();
    osd.set_renderer(white).unwrap();
    (osd, probe)
}

/// Poll `cond` until it holds or a second has passed
fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn press(x: i32, y: i32) -> PointerEvent {
    PointerEvent {
        kind: MouseEventKind::Press,
        root_x: x,
        root_y: y,
        button: 1,
        time: 0,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Fade cycles
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_flash_waits_for_whole_cycle() {
    let (osd, probe) = overlay();
    osd.set_geometry(Geometry::new(10, 20, 200, 50)).unwrap();

    let start = Instant::now();
    osd.flash(FlashOptions::new(100, 200, 100), None).unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(400), "returned after {elapsed:?}");
    // One tick of slack past the end of the fade-out.
    assert!(elapsed <= Duration::from_millis(425), "returned after {elapsed:?}");

    let log = probe.log();
    assert!(!log.mapped);
    assert_eq!(log.shows.len(), 1);
    assert_eq!(log.hides.len(), 1);
}

#[test]
fn test_opacity_rises_then_falls() {
    let (osd, probe) = overlay();
    osd.set_transparency(Transparency::None).unwrap();
    osd.flash(FlashOptions::new(100, 50, 100), None).unwrap();

    let log = probe.log();
    // White over black: the red channel tracks opacity.
    let levels: Vec<u8> = log.frames.iter().map(|f| f.first_pixel[0]).collect();
    assert!(levels.len() > 4, "too few frames: {levels:?}");

    let peak = levels.iter().position(|&l| l == 255).expect("never reached full opacity");
    assert!(levels[..=peak].windows(2).all(|w| w[0] <= w[1]), "{levels:?}");
    assert!(levels[peak..].windows(2).all(|w| w[0] >= w[1]), "{levels:?}");
    assert!(levels[0] < 64);
    assert!(*levels.last().unwrap() <= 128);
}

#[test]
fn test_all_zero_timing_holds_until_hidden() {
    let (osd, probe) = overlay();

    let start = Instant::now();
    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));

    thread::sleep(Duration::from_millis(60));
    assert!(probe.log().mapped);
    assert_eq!(probe.log().frames.last().unwrap().first_pixel[3], 255);

    osd.hide().unwrap();
    assert!(!probe.log().mapped);
}

#[test]
fn test_ready_predicate_cuts_cycle_short() {
    let (osd, probe) = overlay();
    let ready = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&ready);
    let setter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::SeqCst);
    });

    let polled = Arc::clone(&ready);
    let start = Instant::now();
    osd.flash(
        FlashOptions::new(10, 2000, 10),
        Some(Box::new(move || polled.load(Ordering::SeqCst))),
    )
    .unwrap();
    setter.join().unwrap();

    assert!(start.elapsed() < Duration::from_millis(500));
    assert!(!probe.log().mapped);
}

#[test]
fn test_reflash_during_fade_out_restarts_with_new_geometry() {
    let (osd, probe) = overlay();
    osd.flash(FlashOptions::new(20, 20, 400).wait(false), None)
        .unwrap();
    thread::sleep(Duration::from_millis(120));

    let moved = Geometry::new(100, 100, 60, 30);
    osd.set_geometry(moved).unwrap();
    assert_eq!(osd.geometry(), moved);
    {
        let log = probe.log();
        assert_eq!(log.hides.len(), 1, "moving unmaps the snapshot");
        assert_eq!(log.captures.len(), 2);
    }

    osd.flash(FlashOptions::new(20, 200, 20).wait(false), None)
        .unwrap();
    {
        let log = probe.log();
        assert!(log.mapped);
        assert_eq!(log.geometry, moved);
        assert_eq!(log.hides.len(), 2, "restart hides the old cycle");
        assert_eq!(log.captures.len(), 3);
        assert!(log.captures[1..].iter().all(|(_, area)| *area == moved));
        let last = log.frames.last().unwrap();
        assert_eq!((last.width, last.height), (60, 30));
    }

    assert!(wait_until(|| !probe.log().mapped));
}

#[test]
fn test_moving_held_fake_window_recaptures() {
    let (osd, probe) = overlay();
    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();
    assert_eq!(probe.log().captures.len(), 1);

    let moved = Geometry::new(100, 100, 80, 20);
    osd.set_geometry(moved).unwrap();
    osd.render().unwrap();

    let log = probe.log();
    assert!(log.mapped);
    assert_eq!(log.geometry, moved);
    assert_eq!(log.captures.len(), 2);
    assert_eq!(log.captures[1].1, moved);
    // Unmapped while the new snapshot was taken.
    assert!(log.captures[1].0 >= log.hides[0]);
    assert!(log.captures[1].0 <= log.shows[1]);
    let last = log.frames.last().unwrap();
    assert_eq!((last.width, last.height), (80, 20));
    assert_eq!(last.first_pixel[3], 255);
}

// ═══════════════════════════════════════════════════════════════════════════
// Transparency
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_fake_mode_captures_once_per_cycle_before_mapping() {
    let (osd, probe) = overlay();
    assert_eq!(osd.transparency(), Transparency::Fake);

    osd.flash(FlashOptions::new(30, 150, 30), None).unwrap();
    {
        let log = probe.log();
        assert_eq!(log.captures.len(), 1);
        let (captured_at, area) = log.captures[0];
        assert_eq!(area, AREA);
        assert!(captured_at <= log.shows[0]);
        assert!(log.captures.iter().all(|(at, _)| *at <= log.shows[0]));
    }

    osd.flash(FlashOptions::new(10, 10, 10), None).unwrap();
    assert_eq!(probe.log().captures.len(), 2);
}

#[test]
fn test_fake_mode_blends_over_desktop() {
    let (osd, probe) = overlay_on(HeadlessBackend::new(screen()));
    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();
    // Full opacity white covers the desktop completely.
    assert_eq!(
        probe.log().frames.last().unwrap().first_pixel,
        [255, 255, 255, 255]
    );
    osd.hide().unwrap();
}

#[test]
fn test_composite_unavailable_keeps_previous_mode() {
    let (osd, probe) = overlay();

    assert_eq!(
        osd.set_transparency(Transparency::Composite),
        Err(AosdError::UnsupportedMode(Transparency::Composite))
    );
    assert_eq!(osd.transparency(), Transparency::Fake);

    osd.set_transparency(Transparency::None).unwrap();
    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();

    // Same answer once the update thread owns the backend.
    assert_eq!(
        osd.set_transparency(Transparency::Composite),
        Err(AosdError::UnsupportedMode(Transparency::Composite))
    );
    assert_eq!(osd.transparency(), Transparency::None);
    assert_eq!(probe.log().mode, Transparency::None);
}

#[test]
fn test_composite_frames_carry_alpha() {
    let (backend, probe) = HeadlessBackend::new(screen());
    let (osd, _) = overlay_on((backend.with_composite(true), probe.clone()));
    osd.set_transparency(Transparency::Composite).unwrap();

    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();
    assert_eq!(probe.log().frames.last().unwrap().first_pixel[3], 255);
    assert!(probe.log().captures.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Requests and failures
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_setters_stay_on_caller_thread_until_first_request() {
    let (osd, probe) = overlay();
    assert!(!osd.is_running());
    osd.set_name("osd", "Aosd").unwrap();
    assert_eq!(
        probe.log().name,
        Some(("osd".to_string(), "Aosd".to_string()))
    );
    assert_eq!(probe.log().geometry, AREA);

    osd.sync().unwrap();
    assert!(osd.is_running());
}

#[test]
fn test_flash_without_renderer_fails() {
    let (backend, _probe) = HeadlessBackend::new(screen());
    let osd = Aosd::with_backend(Box::new(backend)).unwrap();
    osd.set_geometry(AREA).unwrap();

    assert_eq!(
        osd.flash(FlashOptions::default(), None),
        Err(AosdError::NoRenderer)
    );
    assert_eq!(osd.show(), Err(AosdError::NoRenderer));
}

#[test]
fn test_present_failure_is_reported_and_thread_survives() {
    let (osd, probe) = overlay();
    osd.set_transparency(Transparency::None).unwrap();
    probe.fail_presents(1);

    let result = osd.flash(FlashOptions::new(0, 0, 0), None);
    assert!(matches!(result, Err(AosdError::Backend(_))), "{result:?}");

    osd.flash(FlashOptions::new(10, 10, 10), None).unwrap();
    assert!(osd.is_running());
}

#[test]
fn test_concurrent_requests_are_all_acknowledged() {
    let (osd, probe) = overlay();
    let osd = Arc::new(osd);
    osd.show().unwrap();

    let renders = Arc::new(AtomicUsize::new(0));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let osd = Arc::clone(&osd);
            let renders = Arc::clone(&renders);
            thread::spawn(move || {
                for _ in 0..25 {
                    osd.render().unwrap();
                    renders.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(renders.load(Ordering::Relaxed), 100);
    // Bursts collapse, so never more frames than requests.
    assert!(probe.log().frames.len() <= 101);
    osd.hide().unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// Pointer input
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_mouse_events_reach_handler_in_window_coordinates() {
    let (osd, probe) = overlay();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    osd.set_mouse_handler(move |e| sink.lock().unwrap().push((e.x, e.y, e.button)))
        .unwrap();
    assert!(probe.log().input_enabled);

    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();
    probe.push_pointer(press(15, 25));

    assert!(wait_until(|| !seen.lock().unwrap().is_empty()));
    assert_eq!(seen.lock().unwrap()[0], (5, 5, 1));
    assert!(probe.log().mapped, "handler alone does not hide");

    osd.clear_mouse_handler().unwrap();
    assert!(!probe.log().input_enabled);
}

#[test]
fn test_click_hides_when_enabled() {
    let (osd, probe) = overlay();
    osd.set_hide_on_mouse(true).unwrap();

    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();
    assert!(probe.log().mapped);

    probe.push_pointer(press(12, 22));
    assert!(wait_until(|| !probe.log().mapped));
}

// ═══════════════════════════════════════════════════════════════════════════
// Teardown
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_destroy_before_thread_start() {
    let (osd, probe) = overlay();
    osd.destroy();
    assert!(probe.log().released);

    osd.destroy();
    assert_eq!(osd.hide(), Err(AosdError::Finished));
    assert_eq!(osd.set_geometry(AREA), Err(AosdError::Finished));
}

#[test]
fn test_destroy_mid_fade_releases_everything() {
    let (osd, probe) = overlay();
    osd.flash(FlashOptions::new(50, 2000, 50).wait(false), None)
        .unwrap();
    thread::sleep(Duration::from_millis(80));
    assert!(probe.log().mapped);

    let start = Instant::now();
    osd.destroy();
    assert!(start.elapsed() < Duration::from_millis(200));

    let log = probe.log();
    assert!(log.released);
    assert!(!log.mapped);
    drop(log);

    assert_eq!(
        osd.flash(FlashOptions::default(), None),
        Err(AosdError::Finished)
    );
}

#[test]
fn test_waiting_flash_returns_when_destroyed_elsewhere() {
    let (osd, probe) = overlay();
    let osd = Arc::new(osd);

    let waiter = {
        let osd = Arc::clone(&osd);
        thread::spawn(move || osd.flash(FlashOptions::new(10, 5000, 10), None))
    };
    assert!(wait_until(|| probe.log().mapped));

    osd.destroy();
    let result = waiter.join().unwrap();
    assert!(result.is_ok() || result == Err(AosdError::Finished));
    assert!(probe.log().released);
}

#[test]
fn test_drop_tears_down_running_overlay() {
    let (osd, probe) = overlay();
    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();
    drop(osd);
    assert!(probe.log().released);
}

#[test]
fn test_cleared_renderer_hides_and_blocks_flash() {
    let (osd, probe) = overlay();
    osd.flash(FlashOptions::new(0, 0, 0), None).unwrap();
    assert!(probe.log().mapped);

    osd.clear_renderer().unwrap();
    assert!(!probe.log().mapped);
    assert_eq!(
        osd.flash(FlashOptions::default(), None),
        Err(AosdError::NoRenderer)
    );
}
