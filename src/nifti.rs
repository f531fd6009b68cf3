//! NIfTI-1 loading and saving.
//!
//! Only single-file images (`.nii`, optionally gzip-compressed) are handled.
//! Voxel data is stored with X varying fastest; arrays returned here are
//! indexed `[x, y, z]` regardless of memory layout.

use crate::error::{EvalError, Result};
use crate::types::Volume;
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array3, ShapeBuilder};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Size of a NIfTI-1 header in bytes.
pub const HEADER_SIZE: usize = 348;
/// Offset of voxel data in files written by this module.
const VOX_OFFSET: usize = 352;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const NIFTI2_HEADER_SIZE: i32 = 540;

/// NIfTI-1 datatype codes.
pub mod datatype {
    pub const UINT8: i16 = 2;
    pub const INT16: i16 = 4;
    pub const INT32: i16 = 8;
    pub const FLOAT32: i16 = 16;
    pub const FLOAT64: i16 = 64;
    pub const INT8: i16 = 256;
    pub const UINT16: i16 = 512;
    pub const UINT32: i16 = 768;
    pub const INT64: i16 = 1024;
    pub const UINT64: i16 = 1280;
}

/// The header fields needed to decode voxel data.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// `dim[0..8]`: rank followed by axis lengths.
    pub dim: [i16; 8],
    pub datatype: i16,
    pub bitpix: i16,
    pub pixdim: [f32; 8],
    pub vox_offset: f32,
    pub scl_slope: f32,
    pub scl_inter: f32,
    pub magic: [u8; 4],
    pub little_endian: bool,
}

impl NiftiHeader {
    /// Parse a header, detecting byte order from `sizeof_hdr`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(EvalError::UnsupportedFormat(format!(
                "file too short for a NIfTI header: {} bytes",
                bytes.len()
            )));
        }

        if LittleEndian::read_i32(&bytes[0..4]) == HEADER_SIZE as i32 {
            Self::parse_with::<LittleEndian>(bytes, true)
        } else if BigEndian::read_i32(&bytes[0..4]) == HEADER_SIZE as i32 {
            Self::parse_with::<BigEndian>(bytes, false)
        } else if LittleEndian::read_i32(&bytes[0..4]) == NIFTI2_HEADER_SIZE
            || BigEndian::read_i32(&bytes[0..4]) == NIFTI2_HEADER_SIZE
        {
            Err(EvalError::UnsupportedFormat("NIfTI-2 is not supported".to_string()))
        } else {
            Err(EvalError::UnsupportedFormat("not a NIfTI-1 file".to_string()))
        }
    }

    fn parse_with<B: ByteOrder>(bytes: &[u8], little_endian: bool) -> Result<Self> {
        let mut dim = [0i16; 8];
        B::read_i16_into(&bytes[40..56], &mut dim);
        let mut pixdim = [0f32; 8];
        B::read_f32_into(&bytes[76..108], &mut pixdim);
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[344..348]);

        if &magic != b"n+1\0" {
            return Err(EvalError::UnsupportedFormat(format!(
                "expected single-file magic \"n+1\", found {:?}",
                String::from_utf8_lossy(&magic[..3])
            )));
        }

        Ok(Self {
            dim,
            datatype: B::read_i16(&bytes[70..72]),
            bitpix: B::read_i16(&bytes[72..74]),
            pixdim,
            vox_offset: B::read_f32(&bytes[108..112]),
            scl_slope: B::read_f32(&bytes[112..116]),
            scl_inter: B::read_f32(&bytes[116..120]),
            magic,
            little_endian,
        })
    }

    /// Spatial shape `[X, Y, Z]`.
    ///
    /// Rank 4+ images are accepted as long as every extra axis has length 1.
    pub fn shape(&self) -> Result<[usize; 3]> {
        let rank = self.dim[0];
        if !(3..=7).contains(&rank) {
            return Err(EvalError::InvalidVolume(format!(
                "expected a 3D image, header declares {} dimensions",
                rank
            )));
        }
        if self.dim[4..=rank as usize].iter().any(|&d| d > 1) {
            return Err(EvalError::InvalidVolume(format!(
                "expected a 3D image, got dims {:?}",
                &self.dim[1..=rank as usize]
            )));
        }

        let mut shape = [0usize; 3];
        for (axis, len) in shape.iter_mut().enumerate() {
            let d = self.dim[axis + 1];
            if d < 1 {
                return Err(EvalError::InvalidVolume(format!("axis {} has length {}", axis, d)));
            }
            *len = d as usize;
        }
        Ok(shape)
    }

    /// Linear scaling to apply to stored values, if any.
    fn scaling(&self) -> Option<(f64, f64)> {
        let slope = self.scl_slope as f64;
        if slope == 0.0 || !slope.is_finite() {
            return None;
        }
        let inter = self.scl_inter as f64;
        Some((slope, if inter.is_finite() { inter } else { 0.0 }))
    }
}

/// Load a NIfTI-1 image as `f64` intensities indexed `[x, y, z]`.
///
/// Gzip compression is detected from the file contents, not the extension.
/// `scl_slope`/`scl_inter` are applied when the slope is finite and nonzero.
pub fn load_intensities<P: AsRef<Path>>(path: P) -> Result<Array3<f64>> {
    let path = path.as_ref();
    let mut raw = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut raw)?;

    let bytes = if raw.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        MultiGzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
        decoded
    } else {
        raw
    };

    let image = decode(&bytes)?;
    log::debug!("loaded {} with shape {:?}", path.display(), image.dim());
    Ok(image)
}

/// Load a NIfTI-1 image as a binary mask (nonzero is foreground).
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<Volume> {
    Volume::from_values(&load_intensities(path)?)
}

/// Decode an uncompressed NIfTI-1 byte stream.
pub fn decode(bytes: &[u8]) -> Result<Array3<f64>> {
    let header = NiftiHeader::parse(bytes)?;
    let [nx, ny, nz] = header.shape()?;
    let count = nx * ny * nz;

    let offset = header.vox_offset as usize;
    if offset < HEADER_SIZE || offset > bytes.len() {
        return Err(EvalError::UnsupportedFormat(format!(
            "invalid vox_offset {}",
            header.vox_offset
        )));
    }

    let mut values = if header.little_endian {
        read_voxels::<LittleEndian>(&bytes[offset..], header.datatype, count)?
    } else {
        read_voxels::<BigEndian>(&bytes[offset..], header.datatype, count)?
    };

    if let Some((slope, inter)) = header.scaling() {
        for v in values.iter_mut() {
            *v = *v * slope + inter;
        }
    }

    Array3::from_shape_vec((nx, ny, nz).f(), values)
        .map_err(|e| EvalError::InvalidVolume(e.to_string()))
}

fn read_voxels<B: ByteOrder>(data: &[u8], datatype: i16, count: usize) -> Result<Vec<f64>> {
    let width = match datatype {
        datatype::UINT8 | datatype::INT8 => 1,
        datatype::INT16 | datatype::UINT16 => 2,
        datatype::INT32 | datatype::UINT32 | datatype::FLOAT32 => 4,
        datatype::INT64 | datatype::UINT64 | datatype::FLOAT64 => 8,
        other => {
            return Err(EvalError::UnsupportedFormat(format!(
                "unsupported datatype code {}",
                other
            )))
        }
    };

    let needed = count * width;
    if data.len() < needed {
        return Err(EvalError::InvalidVolume(format!(
            "expected {} bytes of voxel data, found {}",
            needed,
            data.len()
        )));
    }
    let chunks = data[..needed].chunks_exact(width);

    let values = match datatype {
        datatype::UINT8 => chunks.map(|c| c[0] as f64).collect(),
        datatype::INT8 => chunks.map(|c| c[0] as i8 as f64).collect(),
        datatype::INT16 => chunks.map(|c| B::read_i16(c) as f64).collect(),
        datatype::UINT16 => chunks.map(|c| B::read_u16(c) as f64).collect(),
        datatype::INT32 => chunks.map(|c| B::read_i32(c) as f64).collect(),
        datatype::UINT32 => chunks.map(|c| B::read_u32(c) as f64).collect(),
        datatype::FLOAT32 => chunks.map(|c| B::read_f32(c) as f64).collect(),
        datatype::INT64 => chunks.map(|c| B::read_i64(c) as f64).collect(),
        datatype::UINT64 => chunks.map(|c| B::read_u64(c) as f64).collect(),
        _ => chunks.map(|c| B::read_f64(c)).collect(),
    };
    Ok(values)
}

/// Save a binary mask as a uint8 NIfTI-1 image with unit voxel spacing.
///
/// The file is gzip-compressed when the path ends in `.gz`.
pub fn save_volume<P: AsRef<Path>>(volume: &Volume, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(volume)?;
    let file = BufWriter::new(File::create(path)?);

    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        file.write_all(&bytes)?;
        file.flush()?;
    }

    log::debug!("saved {} ({} foreground voxels)", path.display(), volume.count_foreground());
    Ok(())
}

/// Encode a binary mask as an uncompressed little-endian NIfTI-1 byte stream.
pub fn encode(volume: &Volume) -> Result<Vec<u8>> {
    let shape = volume.shape();
    let mut dim = [1i16; 8];
    dim[0] = 3;
    for axis in 0..3 {
        dim[axis + 1] = i16::try_from(shape[axis]).map_err(|_| {
            EvalError::InvalidVolume(format!("axis {} too long for NIfTI-1: {}", axis, shape[axis]))
        })?;
    }

    let mut out = Vec::with_capacity(VOX_OFFSET + volume.num_voxels());
    out.write_i32::<LittleEndian>(HEADER_SIZE as i32)?;
    out.resize(40, 0);
    for d in dim {
        out.write_i16::<LittleEndian>(d)?;
    }
    out.resize(70, 0);
    out.write_i16::<LittleEndian>(datatype::UINT8)?;
    out.write_i16::<LittleEndian>(8)?;
    out.resize(76, 0);
    for _ in 0..8 {
        out.write_f32::<LittleEndian>(1.0)?;
    }
    out.write_f32::<LittleEndian>(VOX_OFFSET as f32)?;
    out.write_f32::<LittleEndian>(1.0)?;
    out.write_f32::<LittleEndian>(0.0)?;
    out.resize(344, 0);
    out.extend_from_slice(b"n+1\0");
    // Empty extension block.
    out.extend_from_slice(&[0u8; 4]);

    // X fastest on disk.
    let data = volume.data();
    for z in 0..shape[2] {
        for y in 0..shape[1] {
            for x in 0..shape[0] {
                out.push(u8::from(data[[x, y, z]]));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_volume() -> Volume {
        let mut volume = Volume::zeros([4, 3, 2]);
        volume.set([3, 0, 0], true).unwrap();
        volume.set([0, 2, 1], true).unwrap();
        volume.set([1, 1, 1], true).unwrap();
        volume
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&sample_volume()).unwrap();
        assert_eq!(bytes.len(), VOX_OFFSET + 24);
        assert_eq!(&bytes[344..348], b"n+1\0");
        // [3, 0, 0] is the fourth voxel on disk.
        assert_eq!(bytes[VOX_OFFSET + 3], 1);
        // [0, 2, 1] = x + 4 * (y + 3 * z) = 20
        assert_eq!(bytes[VOX_OFFSET + 20], 1);
    }

    #[test]
    fn test_decode_encoded() {
        let volume = sample_volume();
        let image = decode(&encode(&volume).unwrap()).unwrap();
        assert_eq!(image.dim(), (4, 3, 2));
        assert_eq!(image[[3, 0, 0]], 1.0);
        assert_eq!(image[[1, 1, 1]], 1.0);
        assert_eq!(image[[0, 0, 0]], 0.0);
        assert_eq!(Volume::from_values(&image).unwrap(), volume);
    }

    #[test]
    fn test_header_fields() {
        let bytes = encode(&sample_volume()).unwrap();
        let header = NiftiHeader::parse(&bytes).unwrap();
        assert!(header.little_endian);
        assert_eq!(header.datatype, datatype::UINT8);
        assert_eq!(header.bitpix, 8);
        assert_eq!(header.shape().unwrap(), [4, 3, 2]);
        assert_eq!(header.vox_offset, 352.0);
    }

    #[test]
    fn test_big_endian_float32_with_scaling() {
        let mut bytes = vec![0u8; VOX_OFFSET];
        BigEndian::write_i32(&mut bytes[0..4], 348);
        BigEndian::write_i16_into(&[3, 2, 1, 1, 1, 1, 1, 1], &mut bytes[40..56]);
        BigEndian::write_i16(&mut bytes[70..72], datatype::FLOAT32);
        BigEndian::write_i16(&mut bytes[72..74], 32);
        BigEndian::write_f32(&mut bytes[108..112], VOX_OFFSET as f32);
        BigEndian::write_f32(&mut bytes[112..116], 2.0);
        BigEndian::write_f32(&mut bytes[116..120], 1.0);
        bytes[344..348].copy_from_slice(b"n+1\0");
        let mut voxel = [0u8; 4];
        BigEndian::write_f32(&mut voxel, 0.0);
        bytes.extend_from_slice(&voxel);
        BigEndian::write_f32(&mut voxel, 1.5);
        bytes.extend_from_slice(&voxel);

        let image = decode(&bytes).unwrap();
        assert_eq!(image.dim(), (2, 1, 1));
        assert_eq!(image[[0, 0, 0]], 1.0);
        assert_eq!(image[[1, 0, 0]], 4.0);
    }

    #[test]
    fn test_rejects_4d_with_multiple_volumes() {
        let mut bytes = encode(&sample_volume()).unwrap();
        LittleEndian::write_i16(&mut bytes[40..42], 4);
        LittleEndian::write_i16(&mut bytes[48..50], 2);
        assert!(matches!(decode(&bytes), Err(EvalError::InvalidVolume(_))));
    }

    #[test]
    fn test_accepts_4d_singleton() {
        let mut bytes = encode(&sample_volume()).unwrap();
        LittleEndian::write_i16(&mut bytes[40..42], 4);
        assert_eq!(decode(&bytes).unwrap().dim(), (4, 3, 2));
    }

    #[test]
    fn test_rejects_pair_magic() {
        let mut bytes = encode(&sample_volume()).unwrap();
        bytes[344..348].copy_from_slice(b"ni1\0");
        assert!(matches!(decode(&bytes), Err(EvalError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_rejects_truncated_data() {
        let bytes = encode(&sample_volume()).unwrap();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1]),
            Err(EvalError::InvalidVolume(_))
        ));
        assert!(decode(&bytes[..100]).is_err());
    }

    #[test]
    fn test_rejects_unknown_datatype() {
        let mut bytes = encode(&sample_volume()).unwrap();
        LittleEndian::write_i16(&mut bytes[70..72], 32); // complex64
        assert!(matches!(decode(&bytes), Err(EvalError::UnsupportedFormat(_))));
    }
}
