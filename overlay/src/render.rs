//! Render dispatch
//!
//! The caller's paint routine draws into a transparent layer sized to the
//! window. The layer is then composed with the transparency base into the
//! frame that is pushed to the display. Opacity-only updates reuse the layer.

use tiny_skia::{Color, Pixmap, PixmapMut};

use crate::error::{AosdError, Result};
use crate::geometry::Geometry;
use crate::transparency::{self, Background, Transparency};

/// Paint routine, called on the update thread with a surface matching the
/// current window size
pub type Renderer = Box<dyn FnMut(&mut PixmapMut<'_>) + Send>;

#[derive(Debug, Default)]
pub struct RenderDispatch {
    layer: Option<Pixmap>,
    frame: Option<Pixmap>,
    /// Layer holds an up-to-date drawing
    painted: bool,
}

impl RenderDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_size(&mut self, geometry: &Geometry) -> Result<()> {
        let (w, h) = (geometry.width, geometry.height);
        let fits =
            |p: &Option<Pixmap>| p.as_ref().is_some_and(|p| p.width() == w && p.height() == h);
        if fits(&self.layer) && fits(&self.frame) {
            return Ok(());
        }

        let alloc = || {
            Pixmap::new(w, h)
                .ok_or_else(|| AosdError::AllocationFailure(format!("{w}x{h} drawing surface")))
        };
        self.layer = Some(alloc()?);
        self.frame = Some(alloc()?);
        self.painted = false;
        Ok(())
    }

    /// Mark the drawing stale so the next compose calls the renderer again
    pub fn invalidate(&mut self) {
        self.painted = false;
    }

    pub fn is_painted(&self) -> bool {
        self.painted
    }

    /// Run the renderer against a cleared layer
    pub fn paint(&mut self, geometry: &Geometry, renderer: &mut Renderer) -> Result<()> {
        self.ensure_size(geometry)?;
        let Some(layer) = self.layer.as_mut() else {
            return Err(AosdError::NoRenderer);
        };
        layer.fill(Color::TRANSPARENT);
        renderer(&mut layer.as_mut());
        self.painted = true;
        Ok(())
    }

    /// Compose the last drawing into a frame at `opacity`
    pub fn compose(
        &mut self,
        geometry: &Geometry,
        mode: Transparency,
        background: &Background,
        opacity: u8,
    ) -> Result<&Pixmap> {
        self.ensure_size(geometry)?;
        let (Some(layer), Some(frame)) = (self.layer.as_ref(), self.frame.as_mut()) else {
            return Err(AosdError::AllocationFailure("frame surface".into()));
        };
        transparency::compose(mode, background, layer, opacity, frame);
        Ok(&*frame)
    }

    pub fn release(&mut self) {
        self.layer = None;
        self.frame = None;
        self.painted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_renderer_sees_window_sized_surface() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_cb = Arc::clone(&seen);
        let mut renderer: Renderer = Box::new(move |surface| {
            seen_cb.store(surface.width() * 1000 + surface.height(), Ordering::SeqCst);
        });

        let mut dispatch = RenderDispatch::new();
        let geom = Geometry::new(0, 0, 200, 50);
        dispatch.paint(&geom, &mut renderer).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 200_050);
        assert!(dispatch.is_painted());

        // Resizing drops the old drawing
        let bigger = Geometry::new(0, 0, 300, 60);
        dispatch
            .compose(&bigger, Transparency::None, &Background::default(), 255)
            .unwrap();
        assert!(!dispatch.is_painted());
    }

    #[test]
    fn test_zero_sized_window_fails_allocation() {
        let mut renderer: Renderer = Box::new(|_| {});
        let mut dispatch = RenderDispatch::new();
        let err = dispatch
            .paint(&Geometry::new(0, 0, 0, 10), &mut renderer)
            .unwrap_err();
        assert!(matches!(err, AosdError::AllocationFailure(_)));
    }
}
