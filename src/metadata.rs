//! Readers for the small `.dm` metadata files EPU drops next to its images.
//!
//! The files are XML with vendor/namespace prefixes on the tags, so elements
//! are matched by substring or suffix rather than by exact name. Child order
//! is fixed on the instrument side: the X value always precedes Y, and the
//! scan stops once Y has been read.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
    #[error("cannot open metadata file {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("malformed metadata in {path}: {reason}")]
    Malformed { path: PathBuf, reason: &'static str },

    #[error("xml error in {path}: {reason}")]
    Xml { path: PathBuf, reason: String },
}

/// Stage position as written by the instrument, usually meters in scientific
/// notation. Kept as text; callers parse when they need numbers.
#[derive(Debug, Clone)]
pub struct StagePosition {
    pub x: String,
    pub y: String,
}

/// Pixel footprint of one atlas tile, in the metadata's own units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub height: u32,
    pub width: u32,
    pub x: u32,
    pub y: u32,
}

fn open_reader(path: &Path) -> Result<Reader<BufReader<File>>, MetadataError> {
    let file = File::open(path).map_err(|e| MetadataError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Reader::from_reader(BufReader::new(file)))
}

fn xml_error(path: &Path, error: quick_xml::Error) -> MetadataError {
    MetadataError::Xml {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

/// Reads the stage position out of a `TargetLocation_<hole>.dm` file.
///
/// The position lives in the first root child whose tag contains
/// `StagePosition`; within it the first child tag ending in `X` is the x
/// value and the next one ending in `Y` is the y value.
pub fn read_stage_position(path: &Path) -> Result<StagePosition, MetadataError> {
    let mut reader = open_reader(path)?;
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut in_position = false;
    let mut current_tag: Option<String> = None;
    let mut x: Option<String> = None;
    let mut y: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| xml_error(path, e))? {
            Event::Start(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                if depth == 1 && tag.contains("StagePosition") {
                    in_position = true;
                } else if depth == 2 && in_position {
                    current_tag = Some(tag);
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    in_position = false;
                }
                if depth <= 2 {
                    current_tag = None;
                }
            }
            Event::Text(text) => {
                if let Some(tag) = current_tag.as_deref() {
                    let value = text
                        .unescape()
                        .map_err(|e| xml_error(path, e))?
                        .trim()
                        .to_string();
                    if tag.ends_with('X') {
                        x = Some(value);
                    } else if tag.ends_with('Y') {
                        y = Some(value);
                        break;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match (x, y) {
        (Some(x), Some(y)) => Ok(StagePosition { x, y }),
        _ => Err(MetadataError::Malformed {
            path: path.to_path_buf(),
            reason: "no StagePosition element with X and Y children",
        }),
    }
}

/// Reads one tile's pixel offset and declared size from its `.dm` sibling.
///
/// Matches the element whose tag contains `AtlasPixelPosition` at any depth,
/// then its direct children: tags containing `height`/`width` and tags ending
/// in `x`/`y`. The `y` child terminates the scan.
pub fn read_tile_geometry(path: &Path) -> Result<TileGeometry, MetadataError> {
    let mut reader = open_reader(path)?;
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut position_depth: Option<usize> = None;
    let mut current_tag: Option<String> = None;
    let mut height: Option<u32> = None;
    let mut width: Option<u32> = None;
    let mut x: Option<u32> = None;
    let mut y: Option<u32> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| xml_error(path, e))? {
            Event::Start(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                match position_depth {
                    None if tag.contains("AtlasPixelPosition") => position_depth = Some(depth),
                    Some(open) if depth == open + 1 => current_tag = Some(tag),
                    _ => {}
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if position_depth == Some(depth) {
                    position_depth = None;
                }
                current_tag = None;
            }
            Event::Text(text) => {
                let Some(tag) = current_tag.as_deref() else {
                    buf.clear();
                    continue;
                };
                let slot = if tag.contains("height") {
                    &mut height
                } else if tag.contains("width") {
                    &mut width
                } else if tag.ends_with('x') {
                    &mut x
                } else if tag.ends_with('y') {
                    &mut y
                } else {
                    buf.clear();
                    continue;
                };
                let raw = text.unescape().map_err(|e| xml_error(path, e))?;
                *slot = Some(raw.trim().parse::<u32>().map_err(|_| {
                    MetadataError::Malformed {
                        path: path.to_path_buf(),
                        reason: "pixel value is not an unsigned integer",
                    }
                })?);
                if y.is_some() {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match (height, width, x, y) {
        (Some(height), Some(width), Some(x), Some(y)) => Ok(TileGeometry {
            height,
            width,
            x,
            y,
        }),
        _ => Err(MetadataError::Malformed {
            path: path.to_path_buf(),
            reason: "no AtlasPixelPosition element with height/width/x/y children",
        }),
    }
}
