//! Just enough MRC to pull a displayable raster out of EPU atlas files.
//!
//! Reads the fixed 1024-byte header, skips the extended header, decodes the
//! first section and stretches it to 8-bit grayscale. Anything beyond pixel
//! extraction (symmetry records, voxel sizes, stacks) is out of scope.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use image::GrayImage;

const HEADER_LEN: u64 = 1024;
// Byte offset of NSYMBT, the extended-header length in bytes.
const NSYMBT_OFFSET: u64 = 92;

const MODE_INT8: i32 = 0;
const MODE_INT16: i32 = 1;
const MODE_FLOAT32: i32 = 2;
const MODE_UINT16: i32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum MrcError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unsupported MRC mode {0}")]
    UnsupportedMode(i32),

    #[error("bad MRC dimensions {nx}x{ny}x{nz}")]
    BadDimensions { nx: i32, ny: i32, nz: i32 },
}

#[derive(Debug, Clone, Copy)]
pub struct MrcHeader {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
    pub mode: i32,
    pub extended_len: u32,
}

pub fn read_header<R: Read + Seek>(reader: &mut R) -> Result<MrcHeader, MrcError> {
    let nx = reader.read_i32::<LittleEndian>()?;
    let ny = reader.read_i32::<LittleEndian>()?;
    let nz = reader.read_i32::<LittleEndian>()?;
    let mode = reader.read_i32::<LittleEndian>()?;

    reader.seek(SeekFrom::Start(NSYMBT_OFFSET))?;
    let extended_len = reader.read_i32::<LittleEndian>()?;

    if nx <= 0 || ny <= 0 || nz <= 0 {
        return Err(MrcError::BadDimensions { nx, ny, nz });
    }

    Ok(MrcHeader {
        nx: nx as u32,
        ny: ny as u32,
        nz: nz as u32,
        mode,
        extended_len: extended_len.max(0) as u32,
    })
}

/// Decodes the first section of an MRC file into 8-bit grayscale, stretching
/// the observed sample range onto 0..=255.
pub fn read_luma8(path: &Path) -> Result<GrayImage, MrcError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let header = read_header(&mut reader)?;
    reader.seek(SeekFrom::Start(HEADER_LEN + u64::from(header.extended_len)))?;

    let len = header.nx as usize * header.ny as usize;
    let mut samples = vec![0f32; len];

    match header.mode {
        MODE_INT8 => {
            let mut raw = vec![0u8; len];
            reader.read_exact(&mut raw)?;
            for (sample, byte) in samples.iter_mut().zip(&raw) {
                *sample = f32::from(*byte as i8);
            }
        }
        MODE_INT16 => {
            for sample in samples.iter_mut() {
                *sample = f32::from(reader.read_i16::<LittleEndian>()?);
            }
        }
        MODE_FLOAT32 => {
            for sample in samples.iter_mut() {
                *sample = reader.read_f32::<LittleEndian>()?;
            }
        }
        MODE_UINT16 => {
            for sample in samples.iter_mut() {
                *sample = f32::from(reader.read_u16::<LittleEndian>()?);
            }
        }
        other => return Err(MrcError::UnsupportedMode(other)),
    }

    Ok(stretch_to_u8(&samples, header.nx, header.ny))
}

fn stretch_to_u8(samples: &[f32], width: u32, height: u32) -> GrayImage {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &sample in samples {
        min = min.min(sample);
        max = max.max(sample);
    }

    let range = max - min;
    let scale = if range > 0.0 { 255.0 / range } else { 0.0 };

    let mut image = GrayImage::new(width, height);
    for (pixel, &sample) in image.pixels_mut().zip(samples) {
        pixel.0[0] = ((sample - min) * scale) as u8;
    }
    image
}
