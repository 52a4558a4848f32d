//! Level 5 MAT-file decoding
//!
//! Classic (pre-7.3) MAT-files are a 128-byte header followed by a flat sequence
//! of data elements, one per variable.
//!
//! # File Layout
//!
//! ```text
//! Bytes   0-115: Descriptive text
//! Bytes 116-123: Subsystem data offset
//! Bytes 124-125: Version (0x0100 for Level 5, 0x0200 for v7.3/HDF5)
//! Bytes 126-127: Endian indicator ("IM" = little-endian, "MI" = big-endian)
//! ```
//!
//! Each element starts with an 8-byte tag (type, byte count), or a packed 4-byte
//! tag when the payload fits in 4 bytes. Variables are `miMATRIX` elements,
//! optionally wrapped in a zlib `miCOMPRESSED` element. A matrix holds array
//! flags, dimensions and a name, then the real (and optional imaginary) data.
//!
//! Enumeration reads only those first three sub-elements; for compressed
//! variables only the leading bytes of the zlib stream are inflated.

use crate::array::{element_count, DynArray};
use crate::data_source::{LoadedArray, LoadedVariables, SkippedVariable, VariableCatalog, VariableDescriptor};
use crate::dtype::{DType, Element};
use crate::errors::{MatImagesError, Result};
use flate2::read::ZlibDecoder;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// =============================================================================
// Constants
// =============================================================================

/// Size of the Level 5 file header in bytes
pub const HEADER_LEN: usize = 128;

const TEXT_LEN: usize = 116;

/// Header version written by MATLAB for Level 5 files
pub const VERSION_LEVEL5: u16 = 0x0100;

/// Header version written by MATLAB for v7.3 (HDF5) files
pub const VERSION_HDF5: u16 = 0x0200;

const TAG_LEN: u64 = 8;

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;

// Array classes
const MX_DOUBLE: u8 = 6;
const MX_SINGLE: u8 = 7;
const MX_INT8: u8 = 8;
const MX_UINT8: u8 = 9;
const MX_INT16: u8 = 10;
const MX_UINT16: u8 = 11;
const MX_INT32: u8 = 12;
const MX_UINT32: u8 = 13;
const MX_INT64: u8 = 14;
const MX_UINT64: u8 = 15;

// Array flag bits (second byte of the flags word)
const FLAG_COMPLEX: u32 = 0x0800;
const FLAG_LOGICAL: u32 = 0x0200;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order declared by the endian indicator of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

macro_rules! byte_order_readers {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(self, bytes: &[u8]) -> $ty {
                match self {
                    ByteOrder::LittleEndian => <$ty>::from_le_bytes(fixed(bytes)),
                    ByteOrder::BigEndian => <$ty>::from_be_bytes(fixed(bytes)),
                }
            }
        )*
    };
}

impl ByteOrder {
    byte_order_readers! {
        read_u16 => u16,
        read_i16 => i16,
        read_u32 => u32,
        read_i32 => i32,
        read_u64 => u64,
        read_i64 => i64,
        read_f32 => f32,
        read_f64 => f64,
    }
}

// =============================================================================
// ClassicHeader
// =============================================================================

/// Parsed 128-byte MAT-file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicHeader {
    /// Descriptive text, trailing padding removed
    pub description: String,
    pub version: u16,
    pub byte_order: ByteOrder,
}

impl ClassicHeader {
    /// Parse a header from the first bytes of a file
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` if the input is short or lacks the endian indicator.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(MatImagesError::format(format!(
                "file too small for a MAT-file header ({} bytes)",
                bytes.len()
            )));
        }
        let byte_order = match &bytes[126..128] {
            b"IM" => ByteOrder::LittleEndian,
            b"MI" => ByteOrder::BigEndian,
            other => {
                return Err(MatImagesError::format(format!(
                    "missing endian indicator, found {:?}",
                    other
                )))
            }
        };
        let version = byte_order.read_u16(&bytes[124..126]);
        let description = String::from_utf8_lossy(&bytes[..TEXT_LEN])
            .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string();

        Ok(Self {
            description,
            version,
            byte_order,
        })
    }

    /// Ensure the classic decoder can read this file
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedVersion` for anything but a Level 5 header.
    pub fn check_version(self) -> Result<Self> {
        if self.version == VERSION_LEVEL5 {
            Ok(self)
        } else {
            Err(MatImagesError::UnsupportedVersion {
                version: self.version,
            })
        }
    }
}

// =============================================================================
// Element tags
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Tag {
    data_type: u32,
    num_bytes: usize,
    /// Payload of a packed (small) element
    packed: Option<[u8; 4]>,
}

fn read_tag<R: Read + ?Sized>(reader: &mut R, order: ByteOrder) -> Result<Tag> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    let first = order.read_u32(&buf[0..4]);
    if first >> 16 != 0 {
        Ok(Tag {
            data_type: first & 0xFFFF,
            num_bytes: (first >> 16) as usize,
            packed: Some(fixed(&buf[4..8])),
        })
    } else {
        Ok(Tag {
            data_type: first,
            num_bytes: order.read_u32(&buf[4..8]) as usize,
            packed: None,
        })
    }
}

/// Read one sub-element, returning its type and payload with padding consumed
fn read_element<R: Read + ?Sized>(reader: &mut R, order: ByteOrder) -> Result<(u32, Vec<u8>)> {
    let tag = read_tag(reader, order)?;
    if let Some(packed) = tag.packed {
        if tag.num_bytes > 4 {
            return Err(MatImagesError::decode(format!(
                "packed element claims {} bytes",
                tag.num_bytes
            )));
        }
        return Ok((tag.data_type, packed[..tag.num_bytes].to_vec()));
    }

    let mut payload = Vec::new();
    (&mut *reader)
        .take(tag.num_bytes as u64)
        .read_to_end(&mut payload)?;
    if payload.len() != tag.num_bytes {
        return Err(MatImagesError::decode(format!(
            "element truncated: expected {} bytes, found {}",
            tag.num_bytes,
            payload.len()
        )));
    }
    // The last element of a matrix may legitimately omit its padding
    let padding = (8 - tag.num_bytes % 8) % 8;
    io::copy(&mut (&mut *reader).take(padding as u64), &mut io::sink())?;
    Ok((tag.data_type, payload))
}

// =============================================================================
// Matrix headers and data
// =============================================================================

/// Array flags, dimensions and name of one `miMATRIX` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixHeader {
    pub class: u8,
    pub flags: u32,
    /// Dimensions in MATLAB (column-major) order
    pub dims: Vec<usize>,
    pub name: String,
}

impl MatrixHeader {
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.flags & FLAG_COMPLEX != 0
    }

    #[must_use]
    pub fn is_logical(&self) -> bool {
        self.flags & FLAG_LOGICAL != 0
    }

    /// Element type this matrix loads as, `None` if it is not a real numeric array
    ///
    /// Logical arrays are stored as uint8 and load as such.
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        if self.is_complex() {
            return None;
        }
        match self.class {
            MX_DOUBLE => Some(DType::Float64),
            MX_SINGLE => Some(DType::Float32),
            MX_INT8 => Some(DType::Int8),
            MX_UINT8 => Some(DType::UInt8),
            MX_INT16 => Some(DType::Int16),
            MX_UINT16 => Some(DType::UInt16),
            MX_INT32 => Some(DType::Int32),
            MX_UINT32 => Some(DType::UInt32),
            MX_INT64 => Some(DType::Int64),
            MX_UINT64 => Some(DType::UInt64),
            _ => None,
        }
    }
}

fn read_matrix_header<R: Read + ?Sized>(reader: &mut R, order: ByteOrder) -> Result<MatrixHeader> {
    let (flags_type, flags_bytes) = read_element(reader, order)?;
    if flags_type != MI_UINT32 || flags_bytes.len() < 8 {
        return Err(MatImagesError::decode("array flags sub-element missing"));
    }
    let flags = order.read_u32(&flags_bytes[0..4]);

    let (dims_type, dims_bytes) = read_element(reader, order)?;
    if dims_type != MI_INT32 || dims_bytes.len() % 4 != 0 {
        return Err(MatImagesError::decode("dimensions sub-element missing"));
    }
    let dims = dims_bytes
        .chunks_exact(4)
        .map(|c| {
            let d = order.read_i32(c);
            usize::try_from(d)
                .map_err(|_| MatImagesError::decode(format!("negative dimension {d}")))
        })
        .collect::<Result<Vec<usize>>>()?;

    let (name_type, name_bytes) = read_element(reader, order)?;
    if name_type != MI_INT8 && name_type != MI_UTF8 {
        return Err(MatImagesError::decode("array name sub-element missing"));
    }
    let name = String::from_utf8_lossy(&name_bytes)
        .trim_end_matches('\0')
        .to_string();

    Ok(MatrixHeader {
        class: (flags & 0xFF) as u8,
        flags,
        dims,
        name,
    })
}

/// Convert stored values of type `$mi` into a `Vec<$dst>`
///
/// MATLAB is free to store e.g. a double array as `miUINT8` when every value fits.
macro_rules! decode_as {
    ($dst:ty, $mi:expr, $bytes:expr, $order:expr) => {
        match $mi {
            MI_INT8 => $bytes.iter().map(|&b| b as i8 as $dst).collect::<Vec<$dst>>(),
            MI_UINT8 => $bytes.iter().map(|&b| b as $dst).collect::<Vec<$dst>>(),
            MI_INT16 => $bytes.chunks_exact(2).map(|c| $order.read_i16(c) as $dst).collect(),
            MI_UINT16 => $bytes.chunks_exact(2).map(|c| $order.read_u16(c) as $dst).collect(),
            MI_INT32 => $bytes.chunks_exact(4).map(|c| $order.read_i32(c) as $dst).collect(),
            MI_UINT32 => $bytes.chunks_exact(4).map(|c| $order.read_u32(c) as $dst).collect(),
            MI_INT64 => $bytes.chunks_exact(8).map(|c| $order.read_i64(c) as $dst).collect(),
            MI_UINT64 => $bytes.chunks_exact(8).map(|c| $order.read_u64(c) as $dst).collect(),
            MI_SINGLE => $bytes.chunks_exact(4).map(|c| $order.read_f32(c) as $dst).collect(),
            MI_DOUBLE => $bytes.chunks_exact(8).map(|c| $order.read_f64(c) as $dst).collect(),
            other => {
                return Err(MatImagesError::decode(format!(
                    "unsupported numeric storage type {other}"
                )))
            }
        }
    };
}

fn column_major<T: Element>(data: Vec<T>, dims: &[usize]) -> Result<DynArray> {
    let expected = element_count(dims).ok_or_else(|| {
        MatImagesError::decode(format!("dimensions {:?} overflow the element count", dims))
    })?;
    if data.len() != expected {
        return Err(MatImagesError::decode(format!(
            "{} values stored for dimensions {:?}",
            data.len(),
            dims
        )));
    }
    Ok(DynArray::new(ArrayD::from_shape_vec(IxDyn(dims).f(), data)?))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_lossless
)]
fn decode_numeric(dtype: DType, mi: u32, bytes: &[u8], order: ByteOrder, dims: &[usize]) -> Result<DynArray> {
    match dtype {
        DType::Float64 => column_major(decode_as!(f64, mi, bytes, order), dims),
        DType::Float32 => column_major(decode_as!(f32, mi, bytes, order), dims),
        DType::Int8 => column_major(decode_as!(i8, mi, bytes, order), dims),
        DType::UInt8 => column_major(decode_as!(u8, mi, bytes, order), dims),
        DType::Int16 => column_major(decode_as!(i16, mi, bytes, order), dims),
        DType::UInt16 => column_major(decode_as!(u16, mi, bytes, order), dims),
        DType::Int32 => column_major(decode_as!(i32, mi, bytes, order), dims),
        DType::UInt32 => column_major(decode_as!(u32, mi, bytes, order), dims),
        DType::Int64 => column_major(decode_as!(i64, mi, bytes, order), dims),
        DType::UInt64 => column_major(decode_as!(u64, mi, bytes, order), dims),
        DType::Bool => Err(MatImagesError::decode("Level 5 files have no boolean storage class")),
    }
}

fn read_matrix_data<R: Read + ?Sized>(
    reader: &mut R,
    order: ByteOrder,
    header: &MatrixHeader,
    dtype: DType,
) -> Result<DynArray> {
    let (mi, bytes) = read_element(reader, order)?;
    decode_numeric(dtype, mi, &bytes, order, &header.dims)
}

/// Treat byte-level failures inside one element as local to that variable
fn local_to_element(error: MatImagesError, offset: u64) -> MatImagesError {
    match error {
        MatImagesError::IoError(e) => {
            MatImagesError::decode(format!("element at offset {offset}: {e}"))
        }
        other => other,
    }
}

// =============================================================================
// ClassicReader
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct ElementEntry {
    offset: u64,
    data_type: u32,
    num_bytes: u64,
}

/// Reader for Level 5 MAT-files
#[derive(Debug, Clone)]
pub struct ClassicReader {
    path: PathBuf,
    header: ClassicHeader,
    file_len: u64,
}

impl ClassicReader {
    /// Open a Level 5 file and validate its header
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read, `FormatError` if the header is
    /// invalid and `UnsupportedVersion` if it belongs to another MAT-file version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut head = Vec::with_capacity(HEADER_LEN);
        (&mut file).take(HEADER_LEN as u64).read_to_end(&mut head)?;
        let header = ClassicHeader::parse(&head)?.check_version()?;

        debug!(
            path = %path.display(),
            byte_order = ?header.byte_order,
            "opened Level 5 MAT-file"
        );
        Ok(Self {
            path,
            header,
            file_len,
        })
    }

    #[must_use]
    pub fn header(&self) -> &ClassicHeader {
        &self.header
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Walk the top-level element tags, skipping payloads
    fn entries(&self, reader: &mut BufReader<File>) -> Result<Vec<ElementEntry>> {
        let mut entries = Vec::new();
        let mut offset = HEADER_LEN as u64;
        while offset + TAG_LEN <= self.file_len {
            reader.seek(SeekFrom::Start(offset))?;
            let tag = read_tag(reader, self.order())?;
            let num_bytes = if tag.packed.is_some() { 0 } else { tag.num_bytes as u64 };
            let mut end = offset + TAG_LEN + num_bytes;
            if end > self.file_len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("element at offset {offset} runs past end of file"),
                )
                .into());
            }
            if tag.data_type != MI_COMPRESSED {
                end = (end + 7) & !7;
            }
            entries.push(ElementEntry {
                offset,
                data_type: tag.data_type,
                num_bytes,
            });
            offset = end;
        }
        Ok(entries)
    }

    /// Position a reader at the start of the matrix sub-elements of `entry`
    fn open_matrix<'a>(
        &self,
        reader: &'a mut BufReader<File>,
        entry: ElementEntry,
    ) -> Result<Option<Box<dyn Read + 'a>>> {
        if entry.num_bytes == 0 {
            return Ok(None);
        }
        reader.seek(SeekFrom::Start(entry.offset + TAG_LEN))?;
        let body = reader.take(entry.num_bytes);
        match entry.data_type {
            MI_MATRIX => Ok(Some(Box::new(body))),
            MI_COMPRESSED => {
                let mut inflated = ZlibDecoder::new(body);
                let inner = read_tag(&mut inflated, self.order())?;
                if inner.data_type != MI_MATRIX || inner.num_bytes == 0 {
                    return Ok(None);
                }
                Ok(Some(Box::new(inflated.take(inner.num_bytes as u64))))
            }
            other => {
                debug!(offset = entry.offset, data_type = other, "skipping non-matrix element");
                Ok(None)
            }
        }
    }

    fn read_header_at(
        &self,
        reader: &mut BufReader<File>,
        entry: ElementEntry,
    ) -> Result<Option<MatrixHeader>> {
        let order = self.order();
        match self.open_matrix(reader, entry)? {
            Some(mut body) => Ok(Some(read_matrix_header(&mut body, order)?)),
            None => Ok(None),
        }
    }

    fn read_value_at(
        &self,
        reader: &mut BufReader<File>,
        entry: ElementEntry,
        dtype: DType,
    ) -> Result<DynArray> {
        let order = self.order();
        let mut body = self
            .open_matrix(reader, entry)?
            .ok_or_else(|| MatImagesError::decode("matrix element vanished between reads"))?;
        let header = read_matrix_header(&mut body, order)?;
        read_matrix_data(&mut body, order, &header, dtype)
    }

    fn open_buffered(&self) -> Result<BufReader<File>> {
        Ok(BufReader::new(File::open(&self.path)?))
    }
}

impl VariableCatalog for ClassicReader {
    fn variables(&self) -> Result<Vec<VariableDescriptor>> {
        let mut reader = self.open_buffered()?;
        let mut variables = Vec::new();
        for entry in self.entries(&mut reader)? {
            let header = match self.read_header_at(&mut reader, entry) {
                Ok(Some(header)) => header,
                Ok(None) => continue,
                Err(e) => {
                    let e = local_to_element(e, entry.offset);
                    if !e.is_variable_local() {
                        return Err(e);
                    }
                    warn!(offset = entry.offset, error = %e, "skipping unreadable element header");
                    continue;
                }
            };
            if header.name.is_empty() {
                continue;
            }
            variables.push(VariableDescriptor {
                dtype: header.dtype(),
                name: header.name,
                shape: header.dims,
            });
        }
        Ok(variables)
    }

    fn load(&self, names: &[String]) -> Result<LoadedVariables> {
        let mut reader = self.open_buffered()?;
        let mut loaded = LoadedVariables::default();
        for entry in self.entries(&mut reader)? {
            let header = match self.read_header_at(&mut reader, entry) {
                Ok(Some(header)) => header,
                Ok(None) => continue,
                Err(e) => {
                    let e = local_to_element(e, entry.offset);
                    if !e.is_variable_local() {
                        return Err(e);
                    }
                    warn!(offset = entry.offset, error = %e, "skipping unreadable element header");
                    continue;
                }
            };
            if !names.contains(&header.name) {
                continue;
            }
            let Some(dtype) = header.dtype() else {
                debug!(
                    var = %header.name,
                    class = header.class,
                    complex = header.is_complex(),
                    "discarding value that is not a real numeric array"
                );
                continue;
            };

            match self.read_value_at(&mut reader, entry, dtype) {
                Ok(array) => {
                    debug!(var = %header.name, shape = ?array.shape(), dtype = %dtype, "loaded variable");
                    loaded
                        .arrays
                        .push((header.name, LoadedArray::Eager(array.squeeze())));
                }
                Err(e) => {
                    let e = local_to_element(e, entry.offset);
                    if !e.is_variable_local() {
                        return Err(e);
                    }
                    warn!(var = %header.name, error = %e, "skipping variable");
                    loaded.skipped.push(SkippedVariable {
                        name: header.name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(loaded)
    }
}
