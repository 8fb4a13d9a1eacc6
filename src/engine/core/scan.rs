use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Video file extensions picked up by directory scans
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "ts", "m2ts",
];

/// Sibling subtitle extensions, in preference order
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa"];

const OUTPUT_SUFFIX: &str = "@converted";
const OUTPUT_EXTENSION: &str = "mp4";

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Scan a directory recursively for video files and invoke a callback for each file found
pub fn scan_streaming<F>(root: &Path, mut on_file: F) -> Result<()>
where
    F: FnMut(PathBuf),
{
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && is_video_file(path) && !is_converted_output(path) {
            on_file(path.to_path_buf());
        }
    }

    Ok(())
}

/// Scan a directory recursively for video files, sorted by path
pub fn scan(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    scan_streaming(root, |path| files.push(path))?;
    Ok(files)
}

/// Expand command-line inputs: files are kept as given, directories are scanned
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = scan(path)
                .with_context(|| format!("Failed to scan directory: {}", path.display()))?;
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            anyhow::bail!("Input does not exist: {}", path.display());
        }
    }
    Ok(files)
}

/// Outputs from an earlier run would otherwise be re-queued by a directory scan
fn is_converted_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.ends_with(OUTPUT_SUFFIX))
        .unwrap_or(false)
}

/// A subtitle next to the input sharing its stem (`movie.mkv` -> `movie.srt`)
pub fn detect_subtitle(input: &Path) -> Option<PathBuf> {
    SUBTITLE_EXTENSIONS
        .iter()
        .map(|ext| input.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

/// Replace characters that are invalid in file names on common platforms
pub fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect()
}

/// Default output next to the input: `{stem}@converted.mp4`
pub fn derive_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = format!(
        "{}{}.{}",
        sanitize_file_stem(&stem),
        OUTPUT_SUFFIX,
        OUTPUT_EXTENSION
    );
    input.with_file_name(name)
}

/// Same naming rule, placed in `dir` instead of next to the input
pub fn derive_output_path_in(input: &Path, dir: &Path) -> PathBuf {
    let derived = derive_output_path(input);
    match derived.file_name() {
        Some(name) => dir.join(name),
        None => derived,
    }
}
