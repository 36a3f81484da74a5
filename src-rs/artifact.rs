//! Where command output lands on disk and how it is written.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use image::RgbaImage;
use rand::Rng;
use serde::Serialize;
use tracing::info;

pub const OUT_DIR_ENV: &str = "VIEWTREE_OUT_DIR";
const DEFAULT_OUT_DIR: &str = ".viewtree";

/// Root directory for generated artifacts; `VIEWTREE_OUT_DIR` overrides it.
pub fn out_root() -> PathBuf {
    match env::var(OUT_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_OUT_DIR),
    }
}

/// `<out root>/<kind>s/<kind>-<input slug>-<stamp>-<pid>-<nonce>.<ext>`
pub fn generated_path(kind: &str, input: &Path, ext: &str) -> PathBuf {
    let nonce = rand::thread_rng().gen_range(1000..9999);
    out_root()
        .join(format!("{kind}s"))
        .join(file_name_for(kind, input, Utc::now(), nonce, ext))
}

/// Session directories have no extension and no nonce; one per input per second.
pub fn session_dir(input: &Path) -> PathBuf {
    out_root()
        .join("sessions")
        .join(format!("session-{}-{}", input_slug(input), compact_stamp(Utc::now())))
}

fn file_name_for(kind: &str, input: &Path, at: DateTime<Utc>, nonce: u32, ext: &str) -> String {
    format!(
        "{kind}-{}-{}-{}-{nonce}.{ext}",
        input_slug(input),
        compact_stamp(at),
        std::process::id()
    )
}

/// JSON metadata that travels with an image: same stem, `.json` extension.
pub fn sidecar_for(image: &Path) -> PathBuf {
    image.with_extension("json")
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    create_parent(path)?;
    let body = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to encode JSON for {}", path.display()))?;
    fs::write(path, body).with_context(|| format!("failed to write JSON: {}", path.display()))
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    create_parent(path)?;
    image
        .save(path)
        .with_context(|| format!("failed to save output image: {}", path.display()))?;
    info!(path = %path.display(), width = image.width(), height = image.height(), "wrote image");
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory: {}", dir.display())),
        _ => Ok(()),
    }
}

/// Absolute form of `path` for printing; relative to the working directory.
pub fn display_path(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn input_slug(input: &Path) -> String {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let slug: String = stem
        .chars()
        .filter_map(|ch| match ch.to_ascii_lowercase() {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            c if c.is_ascii_whitespace() => Some('-'),
            _ => None,
        })
        .collect();
    if slug.is_empty() {
        "snapshot".to_string()
    } else {
        slug
    }
}

fn compact_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

pub fn generated_at() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
