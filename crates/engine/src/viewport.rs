//! Scroll bookkeeping for a grid with frozen leading rows/columns and a
//! detached totals footer.
//!
//! Geometry is surface agnostic: units can be pixels or terminal cells. The
//! frozen extent is always subtracted from the container before deciding
//! what is visible, since content scrolled under a sticky column is hidden
//! even though it lies inside the container.

use crate::navigation::CellPos;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Size of the pinned leading region (row labels, header rows).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrozenExtent {
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollOffset {
    pub left: f64,
    pub top: f64,
}

/// Horizontal positions of the scrollable (non-frozen) columns.
#[derive(Clone, Debug, Default)]
pub struct ColumnLayout {
    offsets: Vec<f64>,
    widths: Vec<f64>,
    row_height: f64,
}

impl ColumnLayout {
    pub fn new(widths: impl IntoIterator<Item = f64>, row_height: f64) -> Self {
        let widths: Vec<f64> = widths.into_iter().collect();
        let mut offsets = Vec::with_capacity(widths.len());
        let mut x = 0.0;
        for w in &widths {
            offsets.push(x);
            x += w;
        }
        Self {
            offsets,
            widths,
            row_height,
        }
    }

    /// Uniform columns.
    pub fn uniform(count: usize, width: f64, row_height: f64) -> Self {
        Self::new(std::iter::repeat_n(width, count), row_height)
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    pub fn content_width(&self) -> f64 {
        self.offsets
            .last()
            .zip(self.widths.last())
            .map(|(x, w)| x + w)
            .unwrap_or(0.0)
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn offset(&self, col: usize) -> Option<f64> {
        self.offsets.get(col).copied()
    }

    pub fn width(&self, col: usize) -> Option<f64> {
        self.widths.get(col).copied()
    }

    /// Bounds of a cell relative to the scrollable content origin.
    pub fn cell_bounds(&self, pos: CellPos) -> Option<Bounds> {
        Some(Bounds::new(
            self.offset(pos.col)?,
            pos.row as f64 * self.row_height,
            self.width(pos.col)?,
            self.row_height,
        ))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ViewportSync {
    scroll: ScrollOffset,
    /// Largest allowed offsets; `None` means unbounded.
    limit: Option<ScrollOffset>,
}

impl ViewportSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll(&self) -> ScrollOffset {
        self.scroll
    }

    /// Horizontal offset the detached footer must apply to stay aligned with
    /// the body columns.
    pub fn footer_offset(&self) -> f64 {
        self.scroll.left
    }

    /// Records the content and container sizes so offsets cannot run past
    /// the end of the content.
    pub fn set_limits(
        &mut self,
        content_width: f64,
        content_height: f64,
        container: Bounds,
        frozen: FrozenExtent,
    ) {
        let visible_w = (container.width - frozen.width).max(0.0);
        let visible_h = (container.height - frozen.height).max(0.0);
        self.limit = Some(ScrollOffset {
            left: (content_width - visible_w).max(0.0),
            top: (content_height - visible_h).max(0.0),
        });
        self.scroll = self.clamped(self.scroll);
    }

    fn clamped(&self, offset: ScrollOffset) -> ScrollOffset {
        let mut out = ScrollOffset {
            left: offset.left.max(0.0),
            top: offset.top.max(0.0),
        };
        if let Some(limit) = self.limit {
            out.left = out.left.min(limit.left);
            out.top = out.top.min(limit.top);
        }
        out
    }

    /// The body scrolled (wheel, scrollbar); the footer follows.
    pub fn on_body_scroll(&mut self, left: f64, top: f64) {
        self.scroll = self.clamped(ScrollOffset { left, top });
    }

    /// Screen bounds of a content-space rectangle under the current scroll.
    pub fn to_screen(&self, content: Bounds, container: Bounds, frozen: FrozenExtent) -> Bounds {
        Bounds::new(
            container.left + frozen.width + content.left - self.scroll.left,
            container.top + frozen.height + content.top - self.scroll.top,
            content.width,
            content.height,
        )
    }

    /// Scrolls by the minimal amount that brings `target` (screen space)
    /// fully inside the container net of the frozen extent. Returns the
    /// applied delta.
    pub fn ensure_visible(
        &mut self,
        target: Bounds,
        container: Bounds,
        frozen: FrozenExtent,
    ) -> ScrollOffset {
        let region = Bounds::new(
            container.left + frozen.width,
            container.top + frozen.height,
            (container.width - frozen.width).max(0.0),
            (container.height - frozen.height).max(0.0),
        );

        let dx = axis_delta(target.left, target.right(), region.left, region.right());
        let dy = axis_delta(target.top, target.bottom(), region.top, region.bottom());

        let before = self.scroll;
        self.scroll = self.clamped(ScrollOffset {
            left: before.left + dx,
            top: before.top + dy,
        });
        ScrollOffset {
            left: self.scroll.left - before.left,
            top: self.scroll.top - before.top,
        }
    }

    /// [`ensure_visible`](Self::ensure_visible) for a grid position.
    pub fn ensure_cell_visible(
        &mut self,
        layout: &ColumnLayout,
        pos: CellPos,
        container: Bounds,
        frozen: FrozenExtent,
    ) -> ScrollOffset {
        match layout.cell_bounds(pos) {
            Some(content) => {
                let target = self.to_screen(content, container, frozen);
                self.ensure_visible(target, container, frozen)
            }
            None => ScrollOffset::default(),
        }
    }
}

fn axis_delta(start: f64, end: f64, region_start: f64, region_end: f64) -> f64 {
    if start < region_start || end - start > region_end - region_start {
        start - region_start
    } else if end > region_end {
        end - region_end
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER: Bounds = Bounds::new(0.0, 0.0, 300.0, 200.0);

    #[test]
    fn visible_target_does_not_scroll() {
        let mut vp = ViewportSync::new();
        let frozen = FrozenExtent {
            width: 100.0,
            height: 20.0,
        };
        let delta = vp.ensure_visible(Bounds::new(120.0, 40.0, 50.0, 20.0), CONTAINER, frozen);
        assert_eq!(delta, ScrollOffset::default());
    }

    #[test]
    fn target_behind_frozen_columns_scrolls_back() {
        let mut vp = ViewportSync::new();
        vp.on_body_scroll(200.0, 0.0);
        let frozen = FrozenExtent {
            width: 100.0,
            height: 0.0,
        };
        // Inside the raw container, but hidden under the pinned label column.
        let delta = vp.ensure_visible(Bounds::new(60.0, 10.0, 50.0, 20.0), CONTAINER, frozen);
        assert_eq!(delta.left, -40.0);
        assert_eq!(vp.scroll().left, 160.0);
        assert_eq!(vp.footer_offset(), 160.0);
    }

    #[test]
    fn target_past_right_edge_scrolls_minimally() {
        let mut vp = ViewportSync::new();
        let delta = vp.ensure_visible(
            Bounds::new(280.0, 10.0, 50.0, 20.0),
            CONTAINER,
            FrozenExtent::default(),
        );
        assert_eq!(delta.left, 30.0);
        assert_eq!(delta.top, 0.0);
    }

    #[test]
    fn target_under_frozen_header_scrolls_up() {
        let mut vp = ViewportSync::new();
        vp.on_body_scroll(0.0, 100.0);
        let frozen = FrozenExtent {
            width: 0.0,
            height: 30.0,
        };
        let delta = vp.ensure_visible(Bounds::new(10.0, 15.0, 40.0, 20.0), CONTAINER, frozen);
        assert_eq!(delta.top, -15.0);
    }

    #[test]
    fn scroll_never_goes_negative() {
        let mut vp = ViewportSync::new();
        let delta = vp.ensure_visible(
            Bounds::new(-50.0, 0.0, 20.0, 20.0),
            CONTAINER,
            FrozenExtent::default(),
        );
        assert_eq!(delta.left, 0.0);
        vp.on_body_scroll(-5.0, -1.0);
        assert_eq!(vp.scroll(), ScrollOffset::default());
    }

    #[test]
    fn cell_walk_keeps_cursor_visible() {
        let layout = ColumnLayout::new([80.0, 40.0, 120.0, 60.0, 60.0, 90.0], 20.0);
        let frozen = FrozenExtent {
            width: 100.0,
            height: 20.0,
        };
        let mut vp = ViewportSync::new();
        vp.set_limits(layout.content_width(), 10.0 * 20.0, CONTAINER, frozen);

        for col in 0..layout.len() {
            let pos = CellPos::new(col, col);
            vp.ensure_cell_visible(&layout, pos, CONTAINER, frozen);
            let screen = vp.to_screen(layout.cell_bounds(pos).unwrap(), CONTAINER, frozen);
            assert!(screen.left >= CONTAINER.left + frozen.width);
            assert!(screen.right() <= CONTAINER.right());
            assert!(screen.top >= CONTAINER.top + frozen.height);
            assert!(screen.bottom() <= CONTAINER.bottom());
        }
    }

    #[test]
    fn layout_offsets_accumulate() {
        let layout = ColumnLayout::new([10.0, 20.0, 5.0], 1.0);
        assert_eq!(layout.offset(2), Some(30.0));
        assert_eq!(layout.content_width(), 35.0);
        assert_eq!(layout.cell_bounds(CellPos::new(3, 1)), Some(Bounds::new(10.0, 3.0, 20.0, 1.0)));
        assert_eq!(ColumnLayout::uniform(4, 8.0, 1.0).content_width(), 32.0);
    }
}
