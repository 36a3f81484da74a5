mod artifact;
mod dump;
mod error;
mod hit;
mod model;
mod outline;
mod render;
mod select;
mod viewport;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::artifact::{display_path, generated_at, generated_path, save_png, session_dir, sidecar_for, write_json};
use crate::dump::{is_activity_dump, parse_activities, parse_dump};
use crate::hit::hit_test;
use crate::model::{Point, Uid, ViewTree};
use crate::outline::{reveal, Outline, TreeOutline};
use crate::render::{render, ImageSurface};
use crate::select::{pick_next, Session};
use crate::viewport::{Viewport, DEFAULT_OUTPUT_SIZE};

const LOG_ENV: &str = "VIEWTREE_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "viewtree",
    version,
    about = "Render, hit-test and inspect view hierarchy snapshots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// List the tasks and activities of an activity manager dump
    List(ListArgs),
    /// Convert a view or activity dump into snapshot JSON
    Parse(ParseArgs),
    /// Render a snapshot to PNG, highlighting an optional selection
    Render(RenderArgs),
    /// Hit-test a canvas point and report the disambiguated pick
    Hit(HitArgs),
    /// Replay canvas clicks through a viewing session
    Session(SessionArgs),
    /// Print the outline tree with the selection revealed
    Outline(OutlineArgs),
}

#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// Snapshot path: JSON tree, indented view dump or activity manager dump
    #[arg(long)]
    input: PathBuf,
    /// Activity to load from an activity dump, by name or pid (default: first with views)
    #[arg(long)]
    activity: Option<String>,
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    #[command(flatten)]
    source: InputArgs,
    /// Canvas size in pixels along the root's long edge
    #[arg(long, default_value_t = DEFAULT_OUTPUT_SIZE)]
    size: u32,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Activity manager dump path
    #[arg(long)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct ParseArgs {
    #[command(flatten)]
    source: InputArgs,
    /// Output JSON path (default: <out dir>/snapshots/...)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Print snapshot JSON to stdout instead of the output path
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,
    /// Uid to highlight (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_uid)]
    select: Option<Uid>,
    /// Output PNG path (default: <out dir>/renders/...)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Custom metadata sidecar path (default: <out>.json)
    #[arg(long)]
    meta_out: Option<PathBuf>,
    /// Disable metadata sidecar generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_meta: bool,
}

#[derive(Args, Debug)]
struct HitArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,
    /// Click position as X,Y in page pixels
    #[arg(long, value_parser = parse_point)]
    at: Point,
    /// Page position of the canvas' top-left corner
    #[arg(long, value_parser = parse_point, default_value = "0,0")]
    origin: Point,
    /// Uid selected before this click, used to cycle stacked views
    #[arg(long, value_parser = parse_uid)]
    previous: Option<Uid>,
}

#[derive(Args, Debug)]
struct SessionArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,
    /// Click position as X,Y in page pixels (repeatable, replayed in order)
    #[arg(long = "click", value_parser = parse_point, required = true)]
    clicks: Vec<Point>,
    /// Page position of the canvas' top-left corner
    #[arg(long, value_parser = parse_point, default_value = "0,0")]
    origin: Point,
    /// Artifact directory (default: <out dir>/sessions/...)
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Skip writing one PNG per repainting click
    #[arg(long, action = ArgAction::SetTrue)]
    no_frames: bool,
    /// Print transcript JSON to stdout instead of its path
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct OutlineArgs {
    #[command(flatten)]
    source: InputArgs,
    /// Uid to reveal and highlight (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_uid)]
    select: Option<Uid>,
}

#[derive(Debug)]
struct LoadedSnapshot {
    tree: ViewTree,
    format: &'static str,
    /// Activity the tree came from, for activity dumps.
    activity: Option<String>,
    warnings: Vec<String>,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Commands => print_commands(),
        Commands::List(args) => command_list(args),
        Commands::Parse(args) => command_parse(args),
        Commands::Render(args) => command_render(args),
        Commands::Hit(args) => command_hit(args),
        Commands::Session(args) => command_session(args),
        Commands::Outline(args) => command_outline(args),
    }
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({
            "name": "list",
            "description": "List tasks and activities of an activity manager dump."
        }),
        json!({
            "name": "parse",
            "description": "Convert a view or activity dump into snapshot JSON."
        }),
        json!({
            "name": "render",
            "description": "Render a snapshot to PNG with selection highlighting and a metadata sidecar."
        }),
        json!({
            "name": "hit",
            "description": "Hit-test a canvas point and pick among overlapping views."
        }),
        json!({
            "name": "session",
            "description": "Replay clicks, writing frames and a selection/outline transcript."
        }),
        json!({
            "name": "outline",
            "description": "Print the outline tree with the selected view revealed."
        }),
    ];

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": rows }))?
    );
    Ok(())
}

fn command_list(args: ListArgs) -> Result<()> {
    let raw = read_input(&args.input)?;
    if !is_activity_dump(&raw) {
        bail!("not an activity dump (no TASK lines): {}", args.input.display());
    }
    let dump = parse_activities(&raw);

    let tasks: Vec<Value> = dump
        .tasks
        .iter()
        .map(|task| {
            let activities: Vec<Value> = task
                .activities
                .iter()
                .map(|act| {
                    json!({
                        "name": act.name,
                        "pid": act.pid,
                        "node_count": act.views.as_ref().map(ViewTree::len),
                        "root": act.views.as_ref().map(|tree| tree.root().label()),
                    })
                })
                .collect();
            json!({ "name": task.name, "id": task.id, "activities": activities })
        })
        .collect();

    let payload = json!({
        "input_path": display_path(&args.input),
        "tasks": tasks,
        "warnings": dump.warnings,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn command_parse(args: ParseArgs) -> Result<()> {
    let loaded = load_snapshot(&args.source)?;
    let payload = serde_json::to_value(loaded.tree.root())?;

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| generated_path("snapshot", &args.source.input, "json"));
    write_json(&out, &payload)?;
    info!(path = %out.display(), nodes = loaded.tree.len(), "wrote snapshot");

    if args.json {
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        println!("{}", display_path(&out));
    }
    Ok(())
}

fn command_render(args: RenderArgs) -> Result<()> {
    let loaded = load_snapshot(&args.snapshot.source)?;
    let tree = &loaded.tree;
    let viewport = fit_viewport(tree, args.snapshot.size)?;
    let mut warnings = loaded.warnings.clone();

    if let Some(uid) = args.select {
        if !tree.contains(uid) {
            warn!(uid, "selected uid is not in the snapshot");
            warnings.push(format!("uid {uid} not found; rendered without selection"));
        }
    }

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| generated_path("render", &args.snapshot.source.input, "png"));
    let mut surface = ImageSurface::new(&viewport);
    render(Some(tree.root()), args.select, &mut surface, &viewport);
    save_png(&surface.into_image(), &out)?;

    if !args.no_meta {
        let meta_path = args.meta_out.clone().unwrap_or_else(|| sidecar_for(&out));
        let payload = json!({
            "render_meta_version": 1,
            "input_path": display_path(&args.snapshot.source.input),
            "input_format": loaded.format,
            "activity": loaded.activity,
            "output_path": display_path(&out),
            "meta_path": display_path(&meta_path),
            "generated_at": generated_at(),
            "viewport": viewport,
            "node_count": tree.len(),
            "selected": args.select.map(|uid| node_summary(tree, uid)).unwrap_or(Value::Null),
            "selected_path": args.select.map(|uid| tree.ancestors(uid)).unwrap_or_default(),
            "warnings": warnings,
        });
        write_json(&meta_path, &payload)?;
    }

    println!("{}", display_path(&out));
    Ok(())
}

fn command_hit(args: HitArgs) -> Result<()> {
    let loaded = load_snapshot(&args.snapshot.source)?;
    let tree = &loaded.tree;
    let viewport = fit_viewport(tree, args.snapshot.size)?;

    let root_point = viewport.to_root_point(args.at, args.origin, tree.root());
    let candidates = hit_test(root_point, tree.root());
    let selected = pick_next(&candidates, args.previous);

    let payload = json!({
        "point": args.at,
        "origin": args.origin,
        "root_point": root_point,
        "viewport": viewport,
        "activity": loaded.activity,
        "previous": args.previous,
        "candidates": candidates.iter().map(|&uid| node_summary(tree, uid)).collect::<Vec<_>>(),
        "selected": selected.map(|uid| node_summary(tree, uid)).unwrap_or(Value::Null),
        "warnings": loaded.warnings,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn command_session(args: SessionArgs) -> Result<()> {
    let loaded = load_snapshot(&args.snapshot.source)?;
    let tree = &loaded.tree;
    let viewport = fit_viewport(tree, args.snapshot.size)?;

    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| session_dir(&args.snapshot.source.input));

    let mut session = Session::new(tree, viewport).with_origin(args.origin);
    let mut outline = TreeOutline::new(tree);
    let mut steps = Vec::with_capacity(args.clicks.len());

    for (index, page) in args.clicks.iter().enumerate() {
        let mut surface = ImageSurface::new(session.viewport());
        let outcome = session.click(*page, &mut surface, &mut outline);

        let frame = match (outcome.selected, args.no_frames) {
            (Some(_), false) => {
                let path = out_dir.join(format!("frame-{index:03}.png"));
                save_png(&surface.into_image(), &path)?;
                Some(display_path(&path))
            }
            _ => None,
        };

        steps.push(json!({
            "index": index,
            "point": page,
            "root_point": outcome.root_point,
            "candidates": outcome.candidates,
            "selected": outcome.selected.map(|uid| node_summary(tree, uid)).unwrap_or(Value::Null),
            "selection": session.selection(),
            "highlighted": outline.highlighted(),
            "outline": outline.lines(),
            "frame": frame,
        }));
    }

    let transcript_path = out_dir.join("session.json");
    let payload = json!({
        "session_version": 1,
        "input_path": display_path(&args.snapshot.source.input),
        "activity": loaded.activity,
        "generated_at": generated_at(),
        "viewport": session.viewport(),
        "origin": args.origin,
        "final_selection": session.selection(),
        "steps": steps,
        "warnings": loaded.warnings,
    });
    write_json(&transcript_path, &payload)?;
    info!(path = %transcript_path.display(), clicks = args.clicks.len(), "wrote session transcript");

    if args.json {
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        println!("{}", display_path(&transcript_path));
    }
    Ok(())
}

fn command_outline(args: OutlineArgs) -> Result<()> {
    let loaded = load_snapshot(&args.source)?;
    let tree = &loaded.tree;
    let mut outline = TreeOutline::new(tree);

    if let Some(uid) = args.select {
        if !tree.contains(uid) {
            bail!("uid {uid} not found in {}", args.source.input.display());
        }
        reveal(uid, &mut outline);
        outline.highlight(uid, None);
    }

    for line in outline.lines() {
        println!("{line}");
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if !path.exists() {
        bail!("input not found: {}", path.display());
    }
    fs::read_to_string(path).with_context(|| format!("failed to read snapshot: {}", path.display()))
}

/// Loads a tree from JSON (leading `{`), an activity dump (unindented `TASK`
/// lines) or a bare view dump, in that order of detection.
fn load_snapshot(source: &InputArgs) -> Result<LoadedSnapshot> {
    let path = source.input.as_path();
    let raw = read_input(path)?;

    if raw.trim_start().starts_with('{') {
        let tree = ViewTree::from_json_str(&raw)
            .with_context(|| format!("invalid snapshot JSON: {}", path.display()))?;
        return Ok(LoadedSnapshot {
            tree,
            format: "json",
            activity: None,
            warnings: Vec::new(),
        });
    }

    if is_activity_dump(&raw) {
        let (activity, warnings) = parse_activities(&raw)
            .into_activity(source.activity.as_deref())
            .with_context(|| format!("cannot load activity from {}", path.display()))?;
        let tree = activity
            .views
            .with_context(|| format!("activity {} has no view hierarchy", activity.name))?;
        info!(activity = %activity.name, pid = activity.pid, nodes = tree.len(), "loaded activity");
        return Ok(LoadedSnapshot {
            tree,
            format: "activities",
            activity: Some(activity.name),
            warnings,
        });
    }

    if source.activity.is_some() {
        warn!("--activity ignored: input is not an activity dump");
    }
    let parsed =
        parse_dump(&raw).with_context(|| format!("invalid view dump: {}", path.display()))?;
    Ok(LoadedSnapshot {
        tree: parsed.tree,
        format: "dump",
        activity: None,
        warnings: parsed.warnings,
    })
}

fn fit_viewport(tree: &ViewTree, size: u32) -> Result<Viewport> {
    Viewport::fit(tree.root().bounds(), size).context("cannot size canvas for snapshot")
}

fn node_summary(tree: &ViewTree, uid: Uid) -> Value {
    let Some(node) = tree.find(uid) else {
        return json!({ "uid": uid, "missing": true });
    };
    json!({
        "uid": node.uid,
        "name": node.display_name,
        "resource_id": node.resource_id,
        "visibility": node.visibility(),
        "bounds": node.bounds(),
        "absolute_bounds": tree.absolute_bounds(uid),
        "depth": tree.depth_of(uid),
    })
}

fn parse_point(raw: &str) -> std::result::Result<Point, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got `{raw}`"))?;
    let x: f64 = x
        .trim()
        .parse()
        .map_err(|_| format!("invalid x coordinate `{x}`"))?;
    let y: f64 = y
        .trim()
        .parse()
        .map_err(|_| format!("invalid y coordinate `{y}`"))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("coordinates must be finite: `{raw}`"));
    }
    Ok(Point::new(x, y))
}

fn parse_uid(raw: &str) -> std::result::Result<Uid, String> {
    let s = raw.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => Uid::from_str_radix(hex, 16),
        None => s.parse::<Uid>(),
    };
    parsed.map_err(|_| format!("invalid uid `{raw}` (decimal or 0x-prefixed hex)"))
}
