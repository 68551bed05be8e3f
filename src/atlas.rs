//! Builds viewable atlas images from the raw files EPU leaves under a grid's
//! `ATLAS/` folder.
//!
//! Two independent paths: converting one pre-assembled raw overview image to
//! a standard raster, and composing the full-resolution atlas from every
//! `Tile_*` raw image at the pixel offset its sibling metadata file reports.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::imageops::FilterType;
use log::debug;

use crate::collage::{Collage, CollageError};
use crate::metadata::{self, MetadataError};
use crate::mrc::{self, MrcError};

pub const TILE_PREFIX: &str = "Tile_";
pub const ATLAS_PREFIX: &str = "Atlas_";
const MRC_EXTENSION: &str = "mrc";
const METADATA_EXTENSION: &str = "dm";
// Bounding box of the low-resolution copy written next to the full canvas.
const PREVIEW_SIZE: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error("cannot list atlas folder {0}: {1}")]
    ListFolder(PathBuf, std::io::Error),

    #[error("no {TILE_PREFIX}*.{MRC_EXTENSION} tiles in {0}")]
    NoTiles(PathBuf),

    #[error("tile {0} has no sibling metadata file")]
    MissingTileMetadata(PathBuf),

    #[error("tile metadata {0} declares a zero-width tile")]
    ZeroWidthTile(PathBuf),

    #[error(transparent)]
    Mrc(#[from] MrcError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Collage(#[from] CollageError),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Builds atlas rasters for one grid's `ATLAS/` folder.
///
/// Errors while composing abort the grid; there is no per-tile tolerance
/// here. Callers wanting skip-the-tile semantics have to filter upfront.
pub struct AtlasBuilder {
    atlas_folder: PathBuf,
}

impl AtlasBuilder {
    pub fn new(atlas_folder: impl Into<PathBuf>) -> Self {
        Self {
            atlas_folder: atlas_folder.into(),
        }
    }

    /// Converts one raw overview image to a standard raster. Pure format
    /// conversion, no compositing and no resizing.
    pub fn save_preview(&self, raw: &Path, target: &Path) -> Result<(), AtlasError> {
        let image = mrc::read_luma8(raw)?;
        image.save(target)?;
        Ok(())
    }

    /// Tile raw images, sorted by filename so one run enumerates stably.
    pub fn tile_files(&self) -> Result<Vec<PathBuf>, AtlasError> {
        self.raw_files(TILE_PREFIX)
    }

    /// The raw whole-grid overview EPU writes alongside the tiles, if any.
    /// With several candidates the first in filename order wins.
    pub fn raw_overview_file(&self) -> Result<Option<PathBuf>, AtlasError> {
        Ok(self.raw_files(ATLAS_PREFIX)?.into_iter().next())
    }

    /// Composes every tile at its metadata-reported offset and writes the
    /// full-resolution canvas to `hr_target` plus a downscaled copy to
    /// `lr_target`. Returns the full canvas size.
    ///
    /// Offsets are authoritative for spatial layout; enumeration order plays
    /// no part in placement. The metadata reports offsets in its own tile
    /// units, so they are rescaled by the actual raw tile width before
    /// placement.
    pub fn build_full_atlas(
        &self,
        hr_target: &Path,
        lr_target: &Path,
    ) -> Result<(u32, u32), AtlasError> {
        let tiles = self.tile_files()?;
        if tiles.is_empty() {
            return Err(AtlasError::NoTiles(self.atlas_folder.clone()));
        }

        let mut collage = Collage::new();

        for tile in &tiles {
            let metadata_file = tile.with_extension(METADATA_EXTENSION);
            if !metadata_file.is_file() {
                return Err(AtlasError::MissingTileMetadata(tile.clone()));
            }

            let geometry = metadata::read_tile_geometry(&metadata_file)?;
            if geometry.width == 0 {
                return Err(AtlasError::ZeroWidthTile(metadata_file));
            }

            let raster = mrc::read_luma8(tile)?;

            let scale = f64::from(raster.width()) / f64::from(geometry.width);
            let coord = (
                (f64::from(geometry.x) * scale) as u32,
                (f64::from(geometry.y) * scale) as u32,
            );
            debug!("placing {} at {:?}", tile.display(), coord);

            collage.add_image(DynamicImage::ImageLuma8(raster), Some(coord));
        }

        collage.save(hr_target)?;

        let (width, height) = collage.size();
        if let Some(canvas) = collage.image() {
            let preview = if width > PREVIEW_SIZE || height > PREVIEW_SIZE {
                canvas.resize(PREVIEW_SIZE, PREVIEW_SIZE, FilterType::Triangle)
            } else {
                canvas.clone()
            };
            preview.save(lr_target)?;
        }

        Ok((width, height))
    }

    fn raw_files(&self, prefix: &str) -> Result<Vec<PathBuf>, AtlasError> {
        let entries = fs::read_dir(&self.atlas_folder)
            .map_err(|e| AtlasError::ListFolder(self.atlas_folder.clone(), e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_raw_image(path, prefix))
            .collect();

        files.sort();
        Ok(files)
    }
}

fn is_raw_image(path: &Path, prefix: &str) -> bool {
    let Some(name) = path.file_name().and_then(OsStr::to_str) else {
        return false;
    };
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        return false;
    };
    name.starts_with(prefix) && ext.eq_ignore_ascii_case(MRC_EXTENSION)
}
