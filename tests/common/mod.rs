//! Fixture writers shared by the integration tests
//!
//! `Level5Writer` produces classic MAT-files byte for byte the way MATLAB lays
//! them out (little-endian, column-major, optional zlib compression). The HDF5
//! helpers mimic v7.3 files: axes reversed on disk and an optional 512-byte
//! user block carrying a MAT header.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use mat_images::Result;
use ndarray::ArrayD;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

const MX_CHAR: u8 = 4;
const MX_DOUBLE: u8 = 6;
const MX_SINGLE: u8 = 7;
const MX_INT16: u8 = 10;
const MX_UINT8: u8 = 9;
const MX_UINT16: u8 = 11;
const MX_INT32: u8 = 12;
const MX_UINT32: u8 = 13;

const FLAG_LOGICAL: u32 = 0x0200;

/// Numeric type that can be written as a MATLAB array
pub trait MatNumeric: Copy {
    const CLASS: u8;
    const MI: u32;
    fn put(self, out: &mut Vec<u8>, big_endian: bool);
}

macro_rules! mat_numeric {
    ($($ty:ty => ($class:expr, $mi:expr)),* $(,)?) => {
        $(
            impl MatNumeric for $ty {
                const CLASS: u8 = $class;
                const MI: u32 = $mi;
                fn put(self, out: &mut Vec<u8>, big_endian: bool) {
                    if big_endian {
                        out.extend_from_slice(&self.to_be_bytes());
                    } else {
                        out.extend_from_slice(&self.to_le_bytes());
                    }
                }
            }
        )*
    };
}

mat_numeric! {
    f64 => (MX_DOUBLE, MI_DOUBLE),
    f32 => (MX_SINGLE, MI_SINGLE),
    u8 => (MX_UINT8, MI_UINT8),
    u16 => (MX_UINT16, MI_UINT16),
    i16 => (MX_INT16, MI_INT16),
    i32 => (MX_INT32, MI_INT32),
    u32 => (MX_UINT32, MI_UINT32),
}

fn pad8(out: &mut Vec<u8>) {
    while out.len() % 8 != 0 {
        out.push(0);
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32, big_endian: bool) {
    value.put(out, big_endian);
}

fn sub_element(out: &mut Vec<u8>, mi: u32, data: &[u8], big_endian: bool) {
    if data.len() <= 4 && !data.is_empty() {
        // Packed small element
        put_u32(out, ((data.len() as u32) << 16) | mi, big_endian);
        let mut packed = [0u8; 4];
        packed[..data.len()].copy_from_slice(data);
        out.extend_from_slice(&packed);
    } else {
        put_u32(out, mi, big_endian);
        put_u32(out, data.len() as u32, big_endian);
        out.extend_from_slice(data);
        pad8(out);
    }
}

/// 128-byte little-endian MAT header with the given version
pub fn mat_header(version: u16) -> Vec<u8> {
    mat_header_with(version, false)
}

/// 128-byte MAT header; big-endian files carry "MI" as their endian indicator
pub fn mat_header_with(version: u16, big_endian: bool) -> Vec<u8> {
    let mut header = b"MATLAB 5.0 MAT-file, Platform: GLNXA64, Created by: mat_images tests".to_vec();
    header.resize(116, b' ');
    header.extend_from_slice(&[0u8; 8]);
    if big_endian {
        header.extend_from_slice(&version.to_be_bytes());
        header.extend_from_slice(b"MI");
    } else {
        header.extend_from_slice(&version.to_le_bytes());
        header.extend_from_slice(b"IM");
    }
    header
}

/// Builder for Level 5 MAT-files
pub struct Level5Writer {
    bytes: Vec<u8>,
    compress: bool,
    big_endian: bool,
}

impl Level5Writer {
    pub fn new(compress: bool) -> Self {
        Self {
            bytes: mat_header(0x0100),
            compress,
            big_endian: false,
        }
    }

    /// Writer producing a big-endian ("MI") file
    pub fn big_endian(compress: bool) -> Self {
        Self {
            bytes: mat_header_with(0x0100, true),
            compress,
            big_endian: true,
        }
    }

    fn push_matrix(&mut self, class: u8, flags: u32, dims: &[usize], name: &str, mi: u32, data: &[u8]) {
        let be = self.big_endian;
        let mut body = Vec::new();
        let mut flag_bytes = Vec::new();
        put_u32(&mut flag_bytes, u32::from(class) | flags, be);
        put_u32(&mut flag_bytes, 0, be);
        sub_element(&mut body, MI_UINT32, &flag_bytes, be);

        let mut dim_bytes = Vec::new();
        for &d in dims {
            (d as i32).put(&mut dim_bytes, be);
        }
        sub_element(&mut body, MI_INT32, &dim_bytes, be);
        sub_element(&mut body, MI_INT8, name.as_bytes(), be);
        sub_element(&mut body, mi, data, be);

        let mut element = Vec::new();
        put_u32(&mut element, MI_MATRIX, be);
        put_u32(&mut element, body.len() as u32, be);
        element.extend_from_slice(&body);

        if self.compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&element).expect("zlib into memory");
            let compressed = encoder.finish().expect("zlib into memory");
            put_u32(&mut self.bytes, MI_COMPRESSED, be);
            put_u32(&mut self.bytes, compressed.len() as u32, be);
            self.bytes.extend_from_slice(&compressed);
        } else {
            self.bytes.extend_from_slice(&element);
        }
    }

    /// Add a numeric array stored in its own type
    pub fn numeric<T: MatNumeric>(mut self, name: &str, array: &ArrayD<T>) -> Self {
        let mut data = Vec::new();
        // Column-major order
        for &v in array.t().iter() {
            v.put(&mut data, self.big_endian);
        }
        self.push_matrix(T::CLASS, 0, array.shape(), name, T::MI, &data);
        self
    }

    /// Add a double array whose values are stored as uint8, as MATLAB does for small integers
    pub fn double_stored_as_u8(mut self, name: &str, array: &ArrayD<u8>) -> Self {
        let data: Vec<u8> = array.t().iter().copied().collect();
        self.push_matrix(MX_DOUBLE, 0, array.shape(), name, MI_UINT8, &data);
        self
    }

    /// Add a MATLAB logical array
    pub fn logical(mut self, name: &str, array: &ArrayD<bool>) -> Self {
        let data: Vec<u8> = array.t().iter().map(|&b| u8::from(b)).collect();
        self.push_matrix(MX_UINT8, FLAG_LOGICAL, array.shape(), name, MI_UINT8, &data);
        self
    }

    /// Add a char array of the given shape filled with `fill`
    pub fn chars(mut self, name: &str, dims: &[usize], fill: char) -> Self {
        let count: usize = dims.iter().product();
        let mut data = Vec::with_capacity(count * 2);
        for _ in 0..count {
            (fill as u16).put(&mut data, self.big_endian);
        }
        self.push_matrix(MX_CHAR, 0, dims, name, MI_UINT16, &data);
        self
    }

    /// Add a double matrix whose data holds fewer values than its dimensions need
    pub fn truncated_double(mut self, name: &str, dims: &[usize]) -> Self {
        let mut data = Vec::new();
        for v in [1.0f64, 2.0] {
            v.put(&mut data, self.big_endian);
        }
        self.push_matrix(MX_DOUBLE, 0, dims, name, MI_DOUBLE, &data);
        self
    }

    /// Append raw bytes, for corrupting files on purpose
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write<P: AsRef<Path>>(self, path: P) -> Result<()> {
        std::fs::write(path, self.bytes)?;
        Ok(())
    }
}

/// A variable for [`write_hdf5_mat`]: MATLAB-order array plus optional on-disk chunks
pub struct Hdf5Var<'a> {
    pub name: &'a str,
    pub data: ArrayD<f64>,
    /// Chunk shape in on-disk (reversed) order
    pub chunks: Option<Vec<usize>>,
}

/// Write a v7.3-style file: every array is stored with its axes reversed
///
/// With `mat_header` set, a 512-byte user block is reserved and a version
/// 0x0200 MAT header written into it, exactly like MATLAB does.
pub fn write_hdf5_mat<P: AsRef<Path>>(path: P, vars: &[Hdf5Var<'_>], mat_header_block: bool) -> Result<()> {
    let path = path.as_ref();
    {
        let file = if mat_header_block {
            hdf5::File::with_options()
                .with_fcpl(|p| p.userblock(512))
                .create(path)?
        } else {
            hdf5::File::create(path)?
        };
        for var in vars {
            let disk = var.data.t().as_standard_layout().into_owned();
            let mut builder = file.new_dataset::<f64>().shape(disk.shape().to_vec());
            if let Some(chunks) = &var.chunks {
                builder = builder.chunk(chunks.clone());
            }
            let dataset = builder.create(var.name)?;
            dataset.write(&disk)?;
        }
    }
    if mat_header_block {
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&mat_header(0x0200))?;
    }
    Ok(())
}

/// Add a plain (non-numeric) group to an existing HDF5 file
pub fn add_hdf5_group<P: AsRef<Path>>(path: P, name: &str) -> Result<()> {
    let file = hdf5::File::open_rw(path)?;
    file.create_group(name)?;
    Ok(())
}

/// Add a variable-length string dataset, the way MATLAB never stores numbers
pub fn add_hdf5_string_dataset<P: AsRef<Path>>(path: P, name: &str, shape: &[usize]) -> Result<()> {
    let file = hdf5::File::open_rw(path)?;
    file.new_dataset::<hdf5::types::VarLenUnicode>()
        .shape(shape.to_vec())
        .create(name)?;
    Ok(())
}
