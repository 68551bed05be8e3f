//! EPU acquisition naming: movie filename parsing, the fixed directory layout
//! EPU writes under a grid, and per-hole stage-position resolution.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::metadata::{self, MetadataError};

pub const GRID_PREFIX: &str = "GRID_";
pub const GRIDSQUARE_PREFIX: &str = "GridSquare_";
pub const FOILHOLE_PREFIX: &str = "FoilHole_";

// EPU movie name example:
// GRID_05_DATA_Images - Disc1_GridSquare_1818984_DATA_FoilHole_2872127_Data_1821842_1821843_20190904_0831_Fractions_global_shifts.mrc
static MOVIE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{GRID_PREFIX}(\d*)_.*_{GRIDSQUARE_PREFIX}(\d*)_.*_{FOILHOLE_PREFIX}(\d*)"
    ))
    .expect("movie pattern is a fixed, valid expression")
});

#[derive(Debug, Clone, thiserror::Error)]
pub enum LocateError {
    #[error("filename does not match the EPU naming convention: {0}")]
    PatternMismatch(String),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Where one movie was acquired on the grid.
///
/// Identifiers are kept as the exact digit strings cut out of the filename,
/// leading zeros included. `x` and `y` hold the stage position as the raw
/// text found in the metadata file; callers parse when they need numbers.
#[derive(Debug, Clone, Serialize)]
pub struct AtlasLocation {
    pub grid: String,
    pub grid_square: String,
    pub hole: String,
    pub x: String,
    pub y: String,
}

/// Resolves movie filenames against the directory tree EPU wrote them into.
///
/// One instance caches stage positions per foil hole, so many movies of the
/// same hole cost a single metadata read.
pub struct EpuParser {
    import_path: PathBuf,
    hole_locations: HashMap<String, (String, String)>,
}

impl EpuParser {
    pub fn new(import_path: impl Into<PathBuf>) -> Self {
        Self {
            import_path: import_path.into(),
            hole_locations: HashMap::new(),
        }
    }

    /// Resolves one movie filename to a full [`AtlasLocation`].
    ///
    /// Failures are per-movie: callers processing a batch should log and move
    /// on rather than abort.
    pub fn atlas_location(&mut self, movie_file_name: &str) -> Result<AtlasLocation, LocateError> {
        let captures = MOVIE_PATTERN
            .captures(movie_file_name)
            .ok_or_else(|| LocateError::PatternMismatch(movie_file_name.to_string()))?;

        let grid = captures[1].to_string();
        let grid_square = captures[2].to_string();
        let hole = captures[3].to_string();

        let (x, y) = self.coordinates(&grid, &grid_square, &hole)?;

        Ok(AtlasLocation {
            grid,
            grid_square,
            hole,
            x,
            y,
        })
    }

    /// Stage position for a hole, reading the metadata file at most once per
    /// distinct hole id.
    fn coordinates(
        &mut self,
        grid: &str,
        grid_square: &str,
        hole: &str,
    ) -> Result<(String, String), MetadataError> {
        if let Some(known) = self.hole_locations.get(hole) {
            return Ok(known.clone());
        }

        let file = self.target_location_path(grid, grid_square, hole);
        let position = metadata::read_stage_position(&file)?;
        let coordinates = (position.x, position.y);
        self.hole_locations.insert(hole.to_string(), coordinates.clone());

        Ok(coordinates)
    }

    pub fn cached_hole_count(&self) -> usize {
        self.hole_locations.len()
    }

    /// Import path truncated at the first `GRID_` token; every grid folder
    /// sits directly under it.
    pub fn common_grid_root(&self) -> PathBuf {
        let path = self.import_path.to_string_lossy();
        match path.split_once(GRID_PREFIX) {
            Some((head, _)) => PathBuf::from(head),
            None => PathBuf::from(path.as_ref()),
        }
    }

    pub fn grid_folder(&self, grid: &str) -> PathBuf {
        self.common_grid_root().join(format!("{GRID_PREFIX}{grid}"))
    }

    pub fn metadata_folder(&self, grid: &str) -> PathBuf {
        self.grid_folder(grid).join("DATA").join("Metadata")
    }

    pub fn grid_square_metadata_folder(&self, grid: &str, grid_square: &str) -> PathBuf {
        self.metadata_folder(grid)
            .join(format!("{GRIDSQUARE_PREFIX}{grid_square}"))
    }

    pub fn target_location_file(&self, location: &AtlasLocation) -> PathBuf {
        self.target_location_path(&location.grid, &location.grid_square, &location.hole)
    }

    pub fn atlas_folder(&self, grid: &str) -> PathBuf {
        self.grid_folder(grid).join("ATLAS")
    }

    fn target_location_path(&self, grid: &str, grid_square: &str, hole: &str) -> PathBuf {
        self.grid_square_metadata_folder(grid, grid_square)
            .join(format!("TargetLocation_{hole}.dm"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const MOVIE: &str = "GRID_05_DATA_Images - Disc1_GridSquare_1818984_DATA_FoilHole_2872127_Data_1821842_1821843_20190904_0831_Fractions_global_shifts.mrc";

    #[test]
    fn movie_pattern_keeps_leading_zeros() {
        let captures = MOVIE_PATTERN.captures(MOVIE).expect("pattern match");
        assert_eq!(&captures[1], "05");
        assert_eq!(&captures[2], "1818984");
        assert_eq!(&captures[3], "2872127");
    }

    #[test]
    fn mismatch_is_a_per_movie_error() {
        let mut parser = EpuParser::new("/data/GRID_05/DATA/Images-Disc1");
        let err = parser.atlas_location("NotAnEpuName_0001.mrc").unwrap_err();
        assert!(matches!(err, LocateError::PatternMismatch(_)));
        assert_eq!(parser.cached_hole_count(), 0);
    }

    #[test]
    fn layout_derivation_from_import_path() {
        let parser = EpuParser::new("/data/GRID_05/DATA/Images-Disc1/GridSquare_1818984/Data");

        assert_eq!(parser.common_grid_root(), Path::new("/data/"));
        assert_eq!(parser.grid_folder("05"), Path::new("/data/GRID_05"));
        assert_eq!(
            parser.metadata_folder("05"),
            Path::new("/data/GRID_05/DATA/Metadata")
        );
        assert_eq!(
            parser.grid_square_metadata_folder("05", "1818984"),
            Path::new("/data/GRID_05/DATA/Metadata/GridSquare_1818984")
        );
        assert_eq!(parser.atlas_folder("05"), Path::new("/data/GRID_05/ATLAS"));
    }

    #[test]
    fn import_path_without_grid_token_is_its_own_root() {
        let parser = EpuParser::new("/plain/import");
        assert_eq!(parser.common_grid_root(), Path::new("/plain/import"));
    }
}
