//! Keeping an outline (tree list) in step with the canvas selection.

use std::collections::HashSet;

use crate::model::{Uid, ViewNode, ViewTree};

/// The slice of a tree widget the selection logic needs.
pub trait Outline {
    type Row;

    /// Rows of the strict ancestors of `uid`, nearest parent first, ending at
    /// the outline's root row. Empty when `uid` has no row.
    fn ancestor_chain_of(&self, uid: Uid) -> Vec<Self::Row>;
    fn is_collapsed(&self, row: &Self::Row) -> bool;
    fn expand(&mut self, row: &Self::Row);
    /// Moves the highlight from `previous` to `uid`.
    fn highlight(&mut self, uid: Uid, previous: Option<Uid>);
}

/// Expands every collapsed ancestor row of `uid`. Returns how many rows were expanded.
pub fn reveal<O: Outline>(uid: Uid, outline: &mut O) -> usize {
    let mut expanded = 0;
    for row in outline.ancestor_chain_of(uid) {
        if outline.is_collapsed(&row) {
            outline.expand(&row);
            expanded += 1;
        }
    }
    expanded
}

/// Text outline over a [`ViewTree`]: every row starts collapsed.
#[derive(Debug, Clone)]
pub struct TreeOutline<'a> {
    tree: &'a ViewTree,
    expanded: HashSet<Uid>,
    highlighted: Option<Uid>,
}

impl<'a> TreeOutline<'a> {
    pub fn new(tree: &'a ViewTree) -> Self {
        Self {
            tree,
            expanded: HashSet::new(),
            highlighted: None,
        }
    }

    pub fn is_expanded(&self, uid: Uid) -> bool {
        self.expanded.contains(&uid)
    }

    pub fn highlighted(&self) -> Option<Uid> {
        self.highlighted
    }

    /// Visible rows, one per line, indented by depth.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.push_lines(self.tree.root(), 0, &mut out);
        out
    }

    fn push_lines(&self, node: &ViewNode, depth: usize, out: &mut Vec<String>) {
        let marker = if node.children.is_empty() {
            "[ ]"
        } else if self.is_expanded(node.uid) {
            "[-]"
        } else {
            "[+]"
        };
        let mark = if self.highlighted == Some(node.uid) { '*' } else { ' ' };
        out.push(format!("{}{mark}{marker} {}", "  ".repeat(depth), node.label()));
        if self.is_expanded(node.uid) {
            for child in &node.children {
                self.push_lines(child, depth + 1, out);
            }
        }
    }
}

impl Outline for TreeOutline<'_> {
    type Row = Uid;

    fn ancestor_chain_of(&self, uid: Uid) -> Vec<Uid> {
        self.tree.ancestors(uid)
    }

    fn is_collapsed(&self, row: &Uid) -> bool {
        !self.expanded.contains(row)
    }

    fn expand(&mut self, row: &Uid) {
        self.expanded.insert(*row);
    }

    fn highlight(&mut self, uid: Uid, _previous: Option<Uid>) {
        self.highlighted = self.tree.contains(uid).then_some(uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rect;

    fn tree() -> ViewTree {
        let root = ViewNode::new(1, "Decor", Rect::new(0, 0, 100, 100))
            .with_child(
                ViewNode::new(2, "Content", Rect::new(0, 10, 100, 90))
                    .with_child(ViewNode::new(3, "Button", Rect::new(5, 5, 20, 10)).with_resource_id("app:id/ok")),
            )
            .with_child(ViewNode::new(4, "Status", Rect::new(0, 0, 100, 10)));
        ViewTree::new(root).unwrap()
    }

    struct FakeWidget {
        chain: Vec<&'static str>,
        collapsed: HashSet<&'static str>,
        expand_calls: Vec<&'static str>,
    }

    impl Outline for FakeWidget {
        type Row = &'static str;

        fn ancestor_chain_of(&self, _uid: Uid) -> Vec<&'static str> {
            self.chain.clone()
        }

        fn is_collapsed(&self, row: &&'static str) -> bool {
            self.collapsed.contains(row)
        }

        fn expand(&mut self, row: &&'static str) {
            self.collapsed.remove(row);
            self.expand_calls.push(*row);
        }

        fn highlight(&mut self, _uid: Uid, _previous: Option<Uid>) {}
    }

    #[test]
    fn reveal_expands_only_collapsed_ancestors_bottom_up() {
        let mut widget = FakeWidget {
            chain: vec!["parent", "grandparent", "root"],
            collapsed: ["parent", "root"].into_iter().collect(),
            expand_calls: Vec::new(),
        };
        assert_eq!(reveal(9, &mut widget), 2);
        assert_eq!(widget.expand_calls, vec!["parent", "root"]);
        assert_eq!(reveal(9, &mut widget), 0);
    }

    #[test]
    fn collapsed_outline_shows_only_root() {
        let tree = tree();
        let outline = TreeOutline::new(&tree);
        assert_eq!(
            outline.lines(),
            vec![" [+] Decor [V.E...... ........] (0,0-100*100)".to_string()]
        );
    }

    #[test]
    fn revealing_a_leaf_opens_its_path() {
        let tree = tree();
        let mut outline = TreeOutline::new(&tree);
        reveal(3, &mut outline);
        outline.highlight(3, None);
        assert!(outline.is_expanded(1));
        assert!(outline.is_expanded(2));
        assert!(!outline.is_expanded(3));
        assert_eq!(
            outline.lines(),
            vec![
                " [-] Decor [V.E...... ........] (0,0-100*100)".to_string(),
                "   [-] Content [V.E...... ........] (0,10-100*90)".to_string(),
                "    *[ ] Button(app:id/ok) [V.E...... ........] (5,5-20*10)".to_string(),
                "   [ ] Status [V.E...... ........] (0,0-100*10)".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_uid_changes_nothing() {
        let tree = tree();
        let mut outline = TreeOutline::new(&tree);
        assert_eq!(reveal(77, &mut outline), 0);
        outline.highlight(77, None);
        assert_eq!(outline.highlighted(), None);
    }
}
