use tracing::trace;

use crate::model::{Point, Uid, ViewNode};

/// Candidate uids under `point`, given in the root's parent frame.
///
/// Deeper matches win: a node is only reported when none of its children
/// matched. Overlapping siblings all contribute, in declaration order, so the
/// result may hold several ids. Hidden subtrees are pruned; the root is always
/// traversed.
pub fn hit_test(point: Point, root: &ViewNode) -> Vec<Uid> {
    let mut out = Vec::new();
    collect(point, root, true, &mut out);
    trace!(x = point.x, y = point.y, candidates = ?out, "hit test");
    out
}

fn collect(point: Point, view: &ViewNode, is_root: bool, out: &mut Vec<Uid>) -> bool {
    if !is_root && !view.visibility().is_visible() {
        return false;
    }
    if !view.bounds().contains(point) {
        return false;
    }
    let local = Point::new(point.x - f64::from(view.x), point.y - f64::from(view.y));
    let mut matched = false;
    for child in &view.children {
        matched |= collect(local, child, false, out);
    }
    if !matched {
        out.push(view.uid);
    }
    true
}
