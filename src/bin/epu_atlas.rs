use clap::{ArgGroup, Parser};
use env_logger::Env;
use log::{info, warn};
use std::error::Error;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use epu_atlas_reader::atlas::AtlasBuilder;
use epu_atlas_reader::epu::{AtlasLocation, EpuParser, FOILHOLE_PREFIX, GRID_PREFIX};
use epu_atlas_reader::plot::{group_by_grid, render_locations_rgb};

const PLOT_SIZE: u32 = 800;

#[derive(Parser, Debug)]
#[command(
    name = "epu-atlas",
    about = "Resolve movie stage positions and build grid atlas images from EPU output",
    version,
    group(
        ArgGroup::new("action")
            .required(true)
            .multiple(true)
            .args(["locations", "atlas", "preview", "plot"])
    )
)]
struct Cli {
    /// EPU import directory (somewhere inside a GRID_* tree)
    #[arg(short = 'd', long = "dir")]
    dir: PathBuf,

    /// Resolve every movie to its atlas location and write a JSON record file
    #[arg(long = "locations", short = 'l')]
    locations: bool,

    /// Compose the full-resolution atlas (plus a low-resolution copy) per grid
    #[arg(long = "atlas", short = 'a')]
    atlas: bool,

    /// Convert each grid's raw overview image to a viewable preview
    #[arg(long = "preview", short = 'p')]
    preview: bool,

    /// Render a scatter image of resolved stage positions per grid
    #[arg(long = "plot")]
    plot: bool,
}

fn is_movie_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(OsStr::to_str) else {
        return false;
    };
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        return false;
    };
    name.contains(FOILHOLE_PREFIX)
        && matches!(ext.to_ascii_lowercase().as_str(), "mrc" | "tif" | "tiff" | "eer")
}

fn collect_movie_files(dir: &Path, movies: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_movie_files(&path, movies)?;
        } else if is_movie_file(&path) {
            movies.push(path);
        }
    }
    Ok(())
}

/// Grid ids found as GRID_* folders under the common root.
fn discover_grids(parser: &EpuParser) -> std::io::Result<Vec<String>> {
    let root = parser.common_grid_root();
    let mut grids = Vec::new();

    for entry in fs::read_dir(&root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(OsStr::to_str)
            && let Some(grid) = name.strip_prefix(GRID_PREFIX)
        {
            grids.push(grid.to_string());
        }
    }

    grids.sort();
    Ok(grids)
}

fn resolve_locations(parser: &mut EpuParser, movies: &[PathBuf]) -> Vec<AtlasLocation> {
    let mut locations = Vec::new();

    for movie in movies {
        let Some(name) = movie.file_name().and_then(OsStr::to_str) else {
            continue;
        };
        match parser.atlas_location(name) {
            Ok(location) => locations.push(location),
            // One bad movie never aborts the batch.
            Err(e) => warn!("no atlas info for {}: {e}", movie.display()),
        }
    }

    locations
}

fn save_plots(locations: &[AtlasLocation]) {
    for (grid, (xs, ys)) in group_by_grid(locations) {
        let out = PathBuf::from(format!("{GRID_PREFIX}{grid}_locations.png"));
        match render_locations_rgb(&xs, &ys, PLOT_SIZE, PLOT_SIZE) {
            Ok(pixels) if !pixels.is_empty() => {
                if let Some(rgb) = image::RgbImage::from_raw(PLOT_SIZE, PLOT_SIZE, pixels) {
                    match rgb.save(&out) {
                        Ok(()) => info!("wrote {}", out.display()),
                        Err(e) => warn!("failed to save plot {}: {e}", out.display()),
                    }
                } else {
                    warn!("failed to build RGB image for plot {}", out.display());
                }
            }
            Ok(_) => warn!("plot skipped (no usable coordinates) for grid {grid}"),
            Err(e) => warn!("failed to render plot for grid {grid}: {e}"),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if !cli.dir.is_dir() {
        return Err(format!("Not a directory: {}", cli.dir.display()).into());
    }

    let mut parser = EpuParser::new(&cli.dir);

    if cli.locations || cli.plot {
        let mut movies = Vec::new();
        collect_movie_files(&cli.dir, &mut movies)?;
        movies.sort();

        if movies.is_empty() {
            warn!("no movie files found under {}", cli.dir.display());
        }

        let locations = resolve_locations(&mut parser, &movies);
        info!("resolved {} of {} movies", locations.len(), movies.len());

        if cli.locations {
            let out = PathBuf::from("atlas_locations.json");
            fs::write(&out, serde_json::to_string_pretty(&locations)?)?;
            info!("wrote {}", out.display());
        }

        if cli.plot {
            save_plots(&locations);
        }
    }

    if cli.atlas || cli.preview {
        let grids = discover_grids(&parser)?;
        if grids.is_empty() {
            warn!(
                "no {GRID_PREFIX}* folders under {}",
                parser.common_grid_root().display()
            );
        }

        for grid in grids {
            let builder = AtlasBuilder::new(parser.atlas_folder(&grid));

            if cli.atlas {
                let hr = PathBuf::from(format!("{GRID_PREFIX}{grid}_atlas.png"));
                let lr = PathBuf::from(format!("{GRID_PREFIX}{grid}_atlas_preview.jpg"));
                match builder.build_full_atlas(&hr, &lr) {
                    Ok((width, height)) => {
                        info!(
                            "wrote {} ({width}x{height}) and {}",
                            hr.display(),
                            lr.display()
                        );
                    }
                    Err(e) => warn!("atlas build failed for grid {grid}: {e}"),
                }
            }

            if cli.preview {
                match builder.raw_overview_file() {
                    Ok(Some(raw)) => {
                        let out = PathBuf::from(format!("{GRID_PREFIX}{grid}_overview.png"));
                        match builder.save_preview(&raw, &out) {
                            Ok(()) => info!("wrote {}", out.display()),
                            Err(e) => warn!("preview failed for {}: {e}", raw.display()),
                        }
                    }
                    Ok(None) => warn!("no raw overview image for grid {grid}"),
                    Err(e) => warn!("cannot scan atlas folder for grid {grid}: {e}"),
                }
            }
        }
    }

    Ok(())
}
