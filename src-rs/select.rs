//! Click handling: hit test, disambiguation, selection update, repaint and
//! outline sync, in that order.

use serde::Serialize;
use tracing::debug;

use crate::hit::hit_test;
use crate::model::{Point, Uid, ViewTree};
use crate::outline::{reveal, Outline};
use crate::render::{render, Surface};
use crate::viewport::Viewport;

/// Picks the next candidate after `previous`, wrapping to the first one.
///
/// Repeated clicks on the same spot therefore cycle through every stacked
/// candidate. Returns `None` only for an empty candidate list.
pub fn pick_next(candidates: &[Uid], previous: Option<Uid>) -> Option<Uid> {
    let first = *candidates.first()?;
    if candidates.len() == 1 {
        return Some(first);
    }
    let next = previous
        .and_then(|prev| candidates.iter().position(|&uid| uid == prev))
        .and_then(|pos| candidates.get(pos + 1).copied());
    Some(next.unwrap_or(first))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    pub current: Option<Uid>,
    pub previous: Option<Uid>,
}

impl SelectionState {
    pub fn set(&mut self, uid: Uid) {
        self.previous = self.current;
        self.current = Some(uid);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickOutcome {
    pub root_point: Point,
    pub candidates: Vec<Uid>,
    /// `None` when nothing was under the pointer and the selection was kept.
    pub selected: Option<Uid>,
}

/// One viewing session over a loaded snapshot.
pub struct Session<'a> {
    tree: &'a ViewTree,
    viewport: Viewport,
    origin: Point,
    selection: SelectionState,
}

impl<'a> Session<'a> {
    pub fn new(tree: &'a ViewTree, viewport: Viewport) -> Self {
        Self {
            tree,
            viewport,
            origin: Point::new(0.0, 0.0),
            selection: SelectionState::default(),
        }
    }

    /// Page-space position of the canvas' top-left corner.
    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Handles a pointer click at `page`. An empty hit leaves the selection
    /// and the surface untouched.
    pub fn click<S: Surface, O: Outline>(&mut self, page: Point, surface: &mut S, outline: &mut O) -> ClickOutcome {
        let root = self.tree.root();
        let root_point = self.viewport.to_root_point(page, self.origin, root);
        let candidates = hit_test(root_point, root);
        let selected = pick_next(&candidates, self.selection.current);
        debug!(?candidates, ?selected, "click at ({}, {})", page.x, page.y);
        if let Some(uid) = selected {
            self.select(uid, surface, outline);
        }
        ClickOutcome {
            root_point,
            candidates,
            selected,
        }
    }

    /// Selects `uid`, repaints and syncs the outline. Re-selecting the current
    /// id still repaints.
    pub fn select<S: Surface, O: Outline>(&mut self, uid: Uid, surface: &mut S, outline: &mut O) {
        self.selection.set(uid);
        self.repaint(surface);
        reveal(uid, outline);
        outline.highlight(uid, self.selection.previous);
    }

    pub fn repaint<S: Surface>(&self, surface: &mut S) {
        render(Some(self.tree.root()), self.selection.current, surface, &self.viewport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Rect, ViewNode};
    use crate::outline::TreeOutline;
    use crate::render::RectStyle;
    use image::Rgba;
    use proptest::prelude::*;

    #[derive(Default)]
    struct CountingSurface {
        clears: usize,
    }

    impl Surface for CountingSurface {
        fn clear(&mut self, _color: Rgba<u8>) {
            self.clears += 1;
        }
        fn set_scale(&mut self, _scale: f64) {}
        fn paint_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _style: RectStyle) {}
        fn fill_text(&mut self, _x: f64, _y: f64, _text: &str, _size: f64, _color: Rgba<u8>) {}
    }

    #[test]
    fn single_candidate_is_returned() {
        assert_eq!(pick_next(&[7], None), Some(7));
        assert_eq!(pick_next(&[7], Some(7)), Some(7));
        assert_eq!(pick_next(&[7], Some(99)), Some(7));
    }

    #[test]
    fn advances_and_wraps() {
        assert_eq!(pick_next(&[3, 5, 9], Some(5)), Some(9));
        assert_eq!(pick_next(&[3, 5, 9], Some(9)), Some(3));
        assert_eq!(pick_next(&[3, 5, 9], Some(42)), Some(3));
        assert_eq!(pick_next(&[3, 5, 9], None), Some(3));
        assert_eq!(pick_next(&[], Some(3)), None);
    }

    proptest! {
        #[test]
        fn feeding_back_visits_every_candidate_once(
            candidates in prop::collection::hash_set(any::<u64>(), 1..12),
            start in any::<u64>(),
        ) {
            let candidates: Vec<Uid> = candidates.into_iter().collect();
            let mut prev = pick_next(&candidates, Some(start));
            let mut seen = vec![prev.unwrap()];
            for _ in 1..candidates.len() {
                prev = pick_next(&candidates, prev);
                seen.push(prev.unwrap());
            }
            let mut sorted_seen = seen.clone();
            sorted_seen.sort_unstable();
            sorted_seen.dedup();
            prop_assert_eq!(sorted_seen.len(), candidates.len());
            // a full lap brings the cycle back to where it started
            prop_assert_eq!(pick_next(&candidates, prev), Some(seen[0]));
        }
    }

    fn stacked_tree() -> ViewTree {
        let root = ViewNode::new(1, "Root", Rect::new(0, 0, 100, 100))
            .with_child(ViewNode::new(2, "Back", Rect::new(0, 0, 100, 100)))
            .with_child(ViewNode::new(3, "Front", Rect::new(0, 0, 50, 50)));
        ViewTree::new(root).unwrap()
    }

    #[test]
    fn repeated_clicks_cycle_through_stack() {
        let tree = stacked_tree();
        let viewport = Viewport::new(0.5, 50, 50).unwrap();
        let mut session = Session::new(&tree, viewport);
        let mut surface = CountingSurface::default();
        let mut outline = TreeOutline::new(&tree);

        let picks: Vec<_> = (0..3)
            .map(|_| session.click(Point::new(10.0, 10.0), &mut surface, &mut outline).selected)
            .collect();
        assert_eq!(picks, vec![Some(2), Some(3), Some(2)]);
        assert_eq!(session.selection(), SelectionState { current: Some(2), previous: Some(3) });
        assert_eq!(surface.clears, 3);
    }

    #[test]
    fn empty_click_keeps_selection_and_skips_repaint() {
        let tree = stacked_tree();
        let viewport = Viewport::new(1.0, 100, 100).unwrap();
        let mut session = Session::new(&tree, viewport);
        let mut surface = CountingSurface::default();
        let mut outline = TreeOutline::new(&tree);

        session.click(Point::new(75.0, 75.0), &mut surface, &mut outline);
        let outcome = session.click(Point::new(200.0, 200.0), &mut surface, &mut outline);
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.selected, None);
        assert_eq!(session.selection().current, Some(2));
        assert_eq!(surface.clears, 1);
    }

    #[test]
    fn origin_and_scale_are_undone_before_hit_testing() {
        let tree = stacked_tree();
        let viewport = Viewport::new(2.0, 200, 200).unwrap();
        let mut session = Session::new(&tree, viewport).with_origin(Point::new(100.0, 40.0));
        let mut surface = CountingSurface::default();
        let mut outline = TreeOutline::new(&tree);

        let outcome = session.click(Point::new(260.0, 200.0), &mut surface, &mut outline);
        assert_eq!(outcome.root_point, Point::new(80.0, 80.0));
        assert_eq!(outcome.candidates, vec![2]);
    }

    #[test]
    fn selecting_same_id_repaints_again() {
        let tree = stacked_tree();
        let mut session = Session::new(&tree, Viewport::new(1.0, 100, 100).unwrap());
        let mut surface = CountingSurface::default();
        let mut outline = TreeOutline::new(&tree);
        session.select(3, &mut surface, &mut outline);
        session.select(3, &mut surface, &mut outline);
        assert_eq!(surface.clears, 2);
        assert_eq!(session.selection(), SelectionState { current: Some(3), previous: Some(3) });
        assert_eq!(outline.highlighted(), Some(3));
    }
}
