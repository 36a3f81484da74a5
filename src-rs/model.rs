//! Immutable view hierarchy snapshot.
//!
//! A [`ViewNode`] carries its bounds relative to the parent's origin; absolute
//! positions are never stored and are accumulated on demand. [`ViewTree`] owns
//! the root and a uid index built once at load time.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SnapshotError};

/// Stable identifier of a view for the lifetime of a snapshot.
pub type Uid = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Half-open containment: `x <= px < x + w`.
    pub fn contains(&self, point: Point) -> bool {
        let lx = point.x - f64::from(self.x);
        let ly = point.y - f64::from(self.y);
        lx >= 0.0 && ly >= 0.0 && lx < f64::from(self.w) && ly < f64::from(self.h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    /// The first character of the status flags carries visibility: `V` or anything else.
    pub fn from_flags(flags: &str) -> Self {
        if flags.starts_with('V') {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    pub uid: Uid,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(
        rename = "id",
        default,
        deserialize_with = "resource_id_from_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub flags0: String,
    #[serde(default)]
    pub flags1: String,
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub children: Vec<ViewNode>,
}

impl ViewNode {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from_flags(&self.flags0)
    }

    /// Outline row label: `Name(resource) [flags0 flags1] (x,y-w*h)`.
    pub fn label(&self) -> String {
        let resource = self
            .resource_id
            .as_deref()
            .map(|id| format!("({id})"))
            .unwrap_or_default();
        format!(
            "{}{} [{} {}] ({},{}-{}*{})",
            self.display_name, resource, self.flags0, self.flags1, self.x, self.y, self.w, self.h
        )
    }
}

/// Report pages write a missing id as the string `"null"`.
fn resource_id_from_json<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|id| !id.is_empty() && id.as_str() != "null"))
}

#[cfg(test)]
impl ViewNode {
    pub fn new(uid: Uid, display_name: impl Into<String>, bounds: Rect) -> Self {
        Self {
            uid,
            display_name: display_name.into(),
            resource_id: None,
            flags0: "V.E......".to_string(),
            flags1: "........".to_string(),
            x: bounds.x,
            y: bounds.y,
            w: bounds.w,
            h: bounds.h,
            children: Vec::new(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.flags0 = format!("G{}", self.flags0.get(1..).unwrap_or_default());
        self
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_child(mut self, child: ViewNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    parent: Option<Uid>,
    path: Vec<usize>,
}

/// A loaded snapshot with a uid index. Read-only once constructed.
#[derive(Debug, Clone)]
pub struct ViewTree {
    root: ViewNode,
    index: HashMap<Uid, IndexEntry>,
}

impl ViewTree {
    pub fn new(root: ViewNode) -> Result<Self> {
        let mut index = HashMap::new();
        let mut path = Vec::new();
        index_node(&root, None, &mut path, &mut index)?;
        Ok(Self { root, index })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let root: ViewNode = serde_json::from_str(raw)?;
        Self::new(root)
    }

    pub fn root(&self) -> &ViewNode {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.index.contains_key(&uid)
    }

    pub fn find(&self, uid: Uid) -> Option<&ViewNode> {
        let entry = self.index.get(&uid)?;
        let mut node = &self.root;
        for &idx in &entry.path {
            node = node.children.get(idx)?;
        }
        Some(node)
    }

    pub fn parent_of(&self, uid: Uid) -> Option<Uid> {
        self.index.get(&uid).and_then(|entry| entry.parent)
    }

    /// Strict ancestors of `uid`, nearest parent first, ending at the root.
    pub fn ancestors(&self, uid: Uid) -> Vec<Uid> {
        let mut out = Vec::new();
        let mut cur = self.parent_of(uid);
        while let Some(parent) = cur {
            out.push(parent);
            cur = self.parent_of(parent);
        }
        out
    }

    pub fn depth_of(&self, uid: Uid) -> Option<usize> {
        self.index.get(&uid).map(|entry| entry.path.len())
    }

    /// Bounds in the root's parent frame, i.e. the frame hit-testing works in.
    /// `None` for unknown uids and for offsets that overflow `i32`.
    pub fn absolute_bounds(&self, uid: Uid) -> Option<Rect> {
        let entry = self.index.get(&uid)?;
        let mut node = &self.root;
        let (mut x, mut y) = (node.x, node.y);
        for &idx in &entry.path {
            node = node.children.get(idx)?;
            x = x.checked_add(node.x)?;
            y = y.checked_add(node.y)?;
        }
        Some(Rect::new(x, y, node.w, node.h))
    }
}

fn index_node(
    node: &ViewNode,
    parent: Option<Uid>,
    path: &mut Vec<usize>,
    index: &mut HashMap<Uid, IndexEntry>,
) -> Result<()> {
    let entry = IndexEntry {
        parent,
        path: path.clone(),
    };
    if index.insert(node.uid, entry).is_some() {
        return Err(SnapshotError::DuplicateUid { uid: node.uid });
    }
    for (idx, child) in node.children.iter().enumerate() {
        path.push(idx);
        index_node(child, Some(node.uid), path, index)?;
        path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ViewTree {
        let root = ViewNode::new(1, "Decor", Rect::new(10, 20, 100, 100))
            .with_child(
                ViewNode::new(2, "Content", Rect::new(5, 5, 50, 50))
                    .with_child(ViewNode::new(3, "Button", Rect::new(1, 2, 10, 10))),
            )
            .with_child(ViewNode::new(4, "Bar", Rect::new(0, 90, 100, 10)).hidden());
        ViewTree::new(root).unwrap()
    }

    #[test]
    fn visibility_reads_first_flag_character() {
        assert_eq!(Visibility::from_flags("V.E....."), Visibility::Visible);
        assert_eq!(Visibility::from_flags("I.E....."), Visibility::Hidden);
        assert_eq!(Visibility::from_flags(""), Visibility::Hidden);
    }

    #[test]
    fn absolute_bounds_accumulate_offsets() {
        let tree = sample();
        assert_eq!(tree.absolute_bounds(1), Some(Rect::new(10, 20, 100, 100)));
        assert_eq!(tree.absolute_bounds(3), Some(Rect::new(16, 27, 10, 10)));
        assert_eq!(tree.absolute_bounds(99), None);
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let tree = sample();
        assert_eq!(tree.ancestors(3), vec![2, 1]);
        assert!(tree.ancestors(1).is_empty());
        assert_eq!(tree.depth_of(3), Some(2));
    }

    #[test]
    fn duplicate_uid_is_rejected() {
        let root = ViewNode::new(1, "A", Rect::new(0, 0, 1, 1))
            .with_child(ViewNode::new(1, "B", Rect::new(0, 0, 1, 1)));
        let err = ViewTree::new(root).unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicateUid { uid: 1 }));
    }

    #[test]
    fn json_snapshot_loads_with_optional_fields() {
        let raw = r#"{
            "uid": 7, "name": "Root", "flags0": "V.E", "x": 0, "y": 0, "w": 10, "h": 20,
            "children": [
                {"uid": 8, "name": "Leaf", "id": "app:id/leaf", "flags0": "G", "x": 1, "y": 1, "w": 2, "h": 2}
            ]
        }"#;
        let tree = ViewTree::from_json_str(raw).unwrap();
        assert_eq!(tree.len(), 2);
        let leaf = tree.find(8).unwrap();
        assert_eq!(leaf.resource_id.as_deref(), Some("app:id/leaf"));
        assert_eq!(leaf.visibility(), Visibility::Hidden);
        assert!(leaf.children.is_empty());
    }

    #[test]
    fn absolute_bounds_overflow_is_none() {
        let root = ViewNode::new(1, "Root", Rect::new(i32::MAX - 5, 0, 10, 10))
            .with_child(ViewNode::new(2, "Far", Rect::new(10, i32::MIN, 1, 1)));
        let tree = ViewTree::new(root).unwrap();
        assert_eq!(tree.absolute_bounds(2), None);
        assert!(tree.absolute_bounds(1).is_some());
    }

    #[test]
    fn null_string_id_decodes_as_absent() {
        let raw = r#"{"uid": 1, "name": "R", "id": "null", "x": 0, "y": 0, "w": 1, "h": 1,
            "children": [{"uid": 2, "name": "C", "id": null, "x": 0, "y": 0, "w": 1, "h": 1}]}"#;
        let tree = ViewTree::from_json_str(raw).unwrap();
        assert_eq!(tree.root().resource_id, None);
        assert_eq!(tree.find(2).unwrap().resource_id, None);
        let encoded = serde_json::to_value(tree.root()).unwrap();
        assert!(encoded.get("id").is_none());
    }

    #[test]
    fn negative_width_fails_to_decode() {
        let raw = r#"{"uid": 1, "name": "R", "x": 0, "y": 0, "w": -5, "h": 2}"#;
        assert!(ViewTree::from_json_str(raw).is_err());
    }

    #[test]
    fn label_matches_outline_format() {
        let node = ViewNode::new(3, "Button", Rect::new(1, 2, 10, 10)).with_resource_id("app:id/ok");
        assert_eq!(
            node.label(),
            "Button(app:id/ok) [V.E...... ........] (1,2-10*10)"
        );
    }
}
