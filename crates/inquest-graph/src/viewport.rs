//! ViewportController — pan/zoom transform state, independent of data
//!
//! Scale is clamped to the configured bounds; pan is unconstrained (content
//! may be dragged fully offscreen). Drag gestures capture an anchor offset
//! so panning is relative to the gesture start, not cumulative per event.

use inquest_core::{Interaction, ViewState, ViewportBounds};

#[derive(Clone, Copy, Debug)]
struct DragAnchor {
    start_x: f64,
    start_y: f64,
    origin_tx: f64,
    origin_ty: f64,
}

#[derive(Debug)]
pub struct ViewportController {
    bounds: ViewportBounds,
    view: ViewState,
    drag: Option<DragAnchor>,
}

impl ViewportController {
    pub fn new(bounds: ViewportBounds) -> Self {
        Self {
            bounds,
            view: ViewState::default(),
            drag: None,
        }
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.view.translate_x += dx;
        self.view.translate_y += dy;
    }

    /// Multiply the scale by `factor`, clamped to bounds. With a focal
    /// point, the world coordinate under it stays put on screen.
    pub fn zoom(&mut self, factor: f64, focal: Option<(f64, f64)>) {
        let old = self.view.scale;
        let new = (old * factor).clamp(self.bounds.min_scale, self.bounds.max_scale);
        if let Some((fx, fy)) = focal {
            let ratio = new / old;
            self.view.translate_x = fx - (fx - self.view.translate_x) * ratio;
            self.view.translate_y = fy - (fy - self.view.translate_y) * ratio;
        }
        self.view.scale = new;
    }

    pub fn begin_drag(&mut self, x: f64, y: f64) {
        self.drag = Some(DragAnchor {
            start_x: x,
            start_y: y,
            origin_tx: self.view.translate_x,
            origin_ty: self.view.translate_y,
        });
    }

    /// Move relative to the drag anchor. Replaying the same coordinates is
    /// idempotent, so event-rate variance cannot accumulate drift.
    pub fn drag_to(&mut self, x: f64, y: f64) {
        if let Some(anchor) = self.drag {
            self.view.translate_x = anchor.origin_tx + (x - anchor.start_x);
            self.view.translate_y = anchor.origin_ty + (y - anchor.start_y);
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn reset(&mut self) {
        self.view = ViewState::default();
        self.drag = None;
    }

    /// Route a viewport interaction. Non-viewport interactions are the
    /// caller's business.
    pub fn apply(&mut self, interaction: &Interaction) {
        match interaction {
            Interaction::Pan { dx, dy } => self.pan(*dx, *dy),
            Interaction::Zoom { factor, focal } => self.zoom(*factor, *focal),
            Interaction::DragStart { x, y } => self.begin_drag(*x, *y),
            Interaction::DragMove { x, y } => self.drag_to(*x, *y),
            Interaction::DragEnd => self.end_drag(),
            Interaction::ResetView => self.reset(),
            Interaction::ToggleExpand { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ViewportController {
        ViewportController::new(ViewportBounds::default())
    }

    #[test]
    fn zoom_clamps_at_both_bounds() {
        let mut vp = controller();
        for _ in 0..10 {
            vp.zoom(10.0, None);
        }
        assert_eq!(vp.view().scale, 3.0);
        for _ in 0..10 {
            vp.zoom(0.01, None);
        }
        assert_eq!(vp.view().scale, 0.1);
    }

    #[test]
    fn focal_zoom_keeps_the_focal_point_stationary() {
        let mut vp = controller();
        vp.pan(50.0, -20.0);
        let focal = (200.0, 150.0);
        let before = vp.view();
        let world_x = (focal.0 - before.translate_x) / before.scale;
        let world_y = (focal.1 - before.translate_y) / before.scale;

        vp.zoom(1.5, Some(focal));

        let after = vp.view();
        let screen_x = world_x * after.scale + after.translate_x;
        let screen_y = world_y * after.scale + after.translate_y;
        assert!((screen_x - focal.0).abs() < 1e-9);
        assert!((screen_y - focal.1).abs() < 1e-9);
    }

    #[test]
    fn drag_is_anchor_relative_not_cumulative() {
        let mut vp = controller();
        vp.begin_drag(100.0, 100.0);
        vp.drag_to(110.0, 100.0);
        // The same move event delivered twice lands on the same transform.
        vp.drag_to(110.0, 100.0);
        assert_eq!(vp.view().translate_x, 10.0);
        vp.drag_to(130.0, 90.0);
        assert_eq!(vp.view().translate_x, 30.0);
        assert_eq!(vp.view().translate_y, -10.0);
        vp.end_drag();
        // Moves after the gesture ended are ignored.
        vp.drag_to(500.0, 500.0);
        assert_eq!(vp.view().translate_x, 30.0);
    }

    #[test]
    fn pan_is_unconstrained() {
        let mut vp = controller();
        vp.pan(-1e7, 1e7);
        assert_eq!(vp.view().translate_x, -1e7);
        assert_eq!(vp.view().translate_y, 1e7);
    }

    #[test]
    fn reset_restores_default_view() {
        let mut vp = controller();
        vp.pan(10.0, 10.0);
        vp.zoom(2.0, None);
        vp.reset();
        assert_eq!(vp.view(), ViewState::default());
    }
}
