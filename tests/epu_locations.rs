use std::fs;
use std::path::Path;

use epu_atlas_reader::epu::{EpuParser, LocateError};
use tempfile::TempDir;

const MOVIE: &str = "GRID_05_DATA_Images - Disc1_GridSquare_1818984_DATA_FoilHole_2872127_Data_1821842_1821843_20190904_0831_Fractions_global_shifts.mrc";

const TARGET_LOCATION_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<TargetLocation xmlns:a="http://schemas.datacontract.org/2004/07/Applications.Epu.Persistence">
  <a:GridSquareId>1818984</a:GridSquareId>
  <a:StagePosition>
    <a:A>-0.0012</a:A>
    <a:X>-0.00081465765</a:X>
    <a:Y>0.00049159566</a:Y>
    <a:Z>0.000215</a:Z>
  </a:StagePosition>
</TargetLocation>
"#;

/// Builds the fixed EPU directory layout for one grid square and returns the
/// temp root. The import path mimics where EPU drops the movie data.
fn epu_tree() -> (TempDir, std::path::PathBuf) {
    let root = TempDir::new().expect("create temp root");
    let square_md = root
        .path()
        .join("GRID_05/DATA/Metadata/GridSquare_1818984");
    fs::create_dir_all(&square_md).expect("create metadata folders");
    fs::write(square_md.join("TargetLocation_2872127.dm"), TARGET_LOCATION_XML)
        .expect("write target location metadata");

    let import_path = root
        .path()
        .join("GRID_05/DATA/Images-Disc1/GridSquare_1818984/Data");
    fs::create_dir_all(&import_path).expect("create import folders");

    (root, import_path)
}

#[test]
fn movie_resolves_to_a_full_location() {
    let (_root, import_path) = epu_tree();
    let mut parser = EpuParser::new(&import_path);

    let location = parser.atlas_location(MOVIE).expect("resolution succeeds");

    assert_eq!(location.grid, "05");
    assert_eq!(location.grid_square, "1818984");
    assert_eq!(location.hole, "2872127");
    assert_eq!(location.x, "-0.00081465765");
    assert_eq!(location.y, "0.00049159566");
}

#[test]
fn second_resolution_is_served_from_the_cache() {
    let (_root, import_path) = epu_tree();
    let mut parser = EpuParser::new(&import_path);

    let first = parser.atlas_location(MOVIE).expect("first resolution");
    assert_eq!(parser.cached_hole_count(), 1);

    // Deleting the metadata file proves the second call never re-reads it.
    let target = parser.target_location_file(&first);
    fs::remove_file(&target).expect("remove metadata file");

    let second = parser.atlas_location(MOVIE).expect("cached resolution");
    assert_eq!(parser.cached_hole_count(), 1);
    assert_eq!(second.x, first.x);
    assert_eq!(second.y, first.y);
}

#[test]
fn layout_derivation_matches_the_fixture_tree() {
    let (root, import_path) = epu_tree();
    let mut parser = EpuParser::new(&import_path);
    let location = parser.atlas_location(MOVIE).expect("resolution succeeds");

    assert_eq!(parser.common_grid_root(), root.path());
    assert_eq!(parser.grid_folder("05"), root.path().join("GRID_05"));
    assert_eq!(
        parser.metadata_folder("05"),
        root.path().join("GRID_05/DATA/Metadata")
    );
    assert_eq!(
        parser.target_location_file(&location),
        root.path()
            .join("GRID_05/DATA/Metadata/GridSquare_1818984/TargetLocation_2872127.dm")
    );
    assert_eq!(parser.atlas_folder("05"), root.path().join("GRID_05/ATLAS"));
}

#[test]
fn missing_metadata_is_a_per_movie_failure() {
    let (_root, import_path) = epu_tree();
    let mut parser = EpuParser::new(&import_path);

    // Same square, unknown hole: the derived file does not exist.
    let movie = "GRID_05_DATA_Images - Disc1_GridSquare_1818984_DATA_FoilHole_9999999_Data_1_2_20190904_0831_Fractions.mrc";
    let err = parser.atlas_location(movie).unwrap_err();

    assert!(matches!(err, LocateError::Metadata(_)));
    assert_eq!(parser.cached_hole_count(), 0);
}

#[test]
fn unrelated_filename_does_not_touch_the_filesystem() {
    let mut parser = EpuParser::new(Path::new("/nowhere/GRID_05/DATA"));
    let err = parser.atlas_location("movie_0001.mrc").unwrap_err();
    assert!(matches!(err, LocateError::PatternMismatch(_)));
}
