//! Parsers for indented view hierarchy dumps.
//!
//! Each view line looks like:
//!
//! ```text
//! android.widget.FrameLayout{41b2c8e0 V.E..... ........ 0,0-720,1184 #1020002 android:id/content}
//! ```
//!
//! Nesting is carried by leading spaces only: a deeper line is a child of the
//! previous one, an equal one is its sibling, a shallower one climbs back up.
//! The same rule shapes activity manager dumps, where `TASK` lines hold
//! `ACTIVITY` lines and each activity keeps its views under `View Hierarchy:`.

use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::warn;

use crate::error::{Result, SnapshotError};
use crate::model::{ViewNode, ViewTree};

const VIEW_HIERARCHY_HEADER: &str = "View Hierarchy:";

#[derive(Debug)]
pub struct ParsedDump {
    pub tree: ViewTree,
    pub warnings: Vec<String>,
}

/// One non-blank dump line with the lines nested under it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DumpLine {
    line_no: usize,
    text: String,
    children: Vec<DumpLine>,
}

fn view_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?P<name>.*)\{(?P<hash>[0-9a-fA-F]+) (?P<flags0>[^ ]+) (?P<flags1>[^ ]+) ",
            r"(?P<left>-?[0-9]+),(?P<top>-?[0-9]+)-(?P<right>-?[0-9]+),(?P<bottom>-?[0-9]+)",
            r"(?: #[0-9a-fA-F]+(?: (?P<res>.*))?)?\}$",
        ))
        .expect("view line pattern is valid")
    })
}

fn task_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^TASK (?P<name>.+) id=(?P<id>[0-9]+)$").expect("task line pattern is valid"))
}

fn activity_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ACTIVITY (?P<name>.+) (?P<hash>[0-9a-f]+) pid=(?P<pid>[0-9]+)$")
            .expect("activity line pattern is valid")
    })
}

/// Parses a single view line (without indentation) into a childless node.
pub fn parse_view_line(line: &str) -> Option<ViewNode> {
    let caps = view_line_regex().captures(line.trim())?;
    let uid = u64::from_str_radix(&caps["hash"], 16).ok()?;
    let left: i32 = caps["left"].parse().ok()?;
    let top: i32 = caps["top"].parse().ok()?;
    let right: i32 = caps["right"].parse().ok()?;
    let bottom: i32 = caps["bottom"].parse().ok()?;
    let w = u32::try_from(right.checked_sub(left)?).ok()?;
    let h = u32::try_from(bottom.checked_sub(top)?).ok()?;
    Some(ViewNode {
        uid,
        display_name: caps["name"].to_string(),
        resource_id: caps.name("res").map(|m| m.as_str().to_string()),
        flags0: caps["flags0"].to_string(),
        flags1: caps["flags1"].to_string(),
        x: left,
        y: top,
        w,
        h,
        children: Vec::new(),
    })
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Groups lines by indentation. Blank lines are dropped.
fn dump_lines(raw: &str) -> Vec<DumpLine> {
    let mut top = Vec::new();
    // (indent, child-index path from the top level) of the open ancestors
    let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        let indent = indent_of(line);
        let entry = DumpLine {
            line_no: index + 1,
            text: line.trim().to_string(),
            children: Vec::new(),
        };

        while stack.last().is_some_and(|(depth, _)| *depth >= indent) {
            stack.pop();
        }

        let mut path = stack.last().map(|(_, path)| path.clone()).unwrap_or_default();
        let siblings = match path.split_first() {
            None => &mut top,
            Some((head, tail)) => match top.get_mut(*head).and_then(|line| line_at_mut(line, tail)) {
                Some(parent) => &mut parent.children,
                None => continue,
            },
        };
        siblings.push(entry);
        path.push(siblings.len() - 1);
        stack.push((indent, path));
    }
    top
}

fn line_at_mut<'a>(line: &'a mut DumpLine, path: &[usize]) -> Option<&'a mut DumpLine> {
    match path.split_first() {
        None => Some(line),
        Some((head, tail)) => line_at_mut(line.children.get_mut(*head)?, tail),
    }
}

/// Builds a view subtree. A child line that is not a view is dropped with
/// everything below it and reported in `warnings`.
fn view_from_line(line: &DumpLine, warnings: &mut Vec<String>) -> Option<ViewNode> {
    let mut node = parse_view_line(&line.text)?;
    for child in &line.children {
        match view_from_line(child, warnings) {
            Some(view) => node.children.push(view),
            None => {
                warn!(line = child.line_no, text = %child.text, "skipping unparsable view line");
                warnings.push(format!("line {}: cannot parse view, subtree skipped", child.line_no));
            }
        }
    }
    Some(node)
}

/// Parses a bare view dump. Only the first top-level view is kept.
pub fn parse_dump(raw: &str) -> Result<ParsedDump> {
    let lines = dump_lines(raw);
    let (first, rest) = lines.split_first().ok_or(SnapshotError::EmptyDump)?;

    let mut warnings = Vec::new();
    let root = view_from_line(first, &mut warnings).ok_or_else(|| SnapshotError::UnparsableRoot {
        line: first.line_no,
        text: first.text.clone(),
    })?;
    for extra in rest {
        warn!(line = extra.line_no, "ignoring extra top-level view");
        warnings.push(format!("line {}: extra top-level view ignored", extra.line_no));
    }

    let tree = ViewTree::new(root)?;
    Ok(ParsedDump { tree, warnings })
}

/// True when `raw` holds at least one unindented `TASK ... id=N` line.
pub fn is_activity_dump(raw: &str) -> bool {
    raw.lines()
        .filter(|line| !line.starts_with(' '))
        .any(|line| task_line_regex().is_match(line.trim_end()))
}

#[derive(Debug)]
pub struct Activity {
    pub name: String,
    pub pid: u32,
    /// `None` when the activity has no usable hierarchy (missing, unparsable or zero-sized root).
    pub views: Option<ViewTree>,
}

#[derive(Debug)]
pub struct Task {
    pub name: String,
    pub id: u32,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Default)]
pub struct ActivityDump {
    pub tasks: Vec<Task>,
    pub warnings: Vec<String>,
}

impl ActivityDump {
    /// Takes the activity named `selector` (or with that pid), or the first
    /// one with a hierarchy when no selector is given.
    pub fn into_activity(self, selector: Option<&str>) -> Result<(Activity, Vec<String>)> {
        let warnings = self.warnings;
        let mut activities = self.tasks.into_iter().flat_map(|task| task.activities);
        let found = match selector {
            Some(sel) => {
                let activity = activities
                    .find(|act| act.name == sel || act.pid.to_string() == sel)
                    .ok_or_else(|| SnapshotError::UnknownActivity {
                        selector: sel.to_string(),
                    })?;
                if activity.views.is_none() {
                    return Err(SnapshotError::NoViewHierarchy { activity: activity.name });
                }
                activity
            }
            None => activities
                .find(|act| act.views.is_some())
                .ok_or(SnapshotError::NoActivityViews)?,
        };
        Ok((found, warnings))
    }
}

/// Parses an activity manager dump into tasks and their activities.
/// Unrecognised lines at the task and activity levels are ignored.
pub fn parse_activities(raw: &str) -> ActivityDump {
    let mut dump = ActivityDump::default();
    for task_line in dump_lines(raw) {
        let Some(caps) = task_line_regex().captures(&task_line.text) else {
            continue;
        };
        let Ok(id) = caps["id"].parse::<u32>() else {
            dump.warnings.push(format!("line {}: task id out of range", task_line.line_no));
            continue;
        };
        let mut task = Task {
            name: caps["name"].to_string(),
            id,
            activities: Vec::new(),
        };

        for act_line in &task_line.children {
            let Some(caps) = activity_line_regex().captures(&act_line.text) else {
                continue;
            };
            let Ok(pid) = caps["pid"].parse::<u32>() else {
                dump.warnings.push(format!("line {}: activity pid out of range", act_line.line_no));
                continue;
            };
            let name = caps["name"].to_string();
            let views = activity_views(act_line, &name, &mut dump.warnings);
            task.activities.push(Activity { name, pid, views });
        }
        dump.tasks.push(task);
    }
    dump
}

fn activity_views(act_line: &DumpLine, name: &str, warnings: &mut Vec<String>) -> Option<ViewTree> {
    let header = act_line
        .children
        .iter()
        .find(|child| child.text == VIEW_HIERARCHY_HEADER)?;
    let first = header.children.first()?;
    let Some(root) = view_from_line(first, warnings) else {
        warnings.push(format!("line {}: {name}: cannot parse root view", first.line_no));
        return None;
    };
    if root.w == 0 || root.h == 0 {
        warn!(activity = name, w = root.w, h = root.h, "skipping zero-sized hierarchy");
        warnings.push(format!("{name}: root view is {}x{}, hierarchy skipped", root.w, root.h));
        return None;
    }
    match ViewTree::new(root) {
        Ok(tree) => Some(tree),
        Err(err) => {
            warnings.push(format!("{name}: {err}"));
            None
        }
    }
}
