//! Memory-mapped keyed array store
//!
//! A store is a safetensors file: a JSON header naming every array with its
//! element type, shape and byte range, followed by the raw little-endian data.
//! [`KeyedArrayStore`] maps the file read-only and decodes rows on demand, so
//! a dataset never holds more than the sample being read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use memmap2::{Mmap, MmapOptions};
use ndarray::{ArrayD, IxDyn};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};

use sampleset_core::array::{ElementType, RawArray};
use sampleset_core::error::{Error as CoreError, Result as CoreResult};

use crate::error::{Error, Result};

/// Size of the little-endian header length prefix
const HEADER_LEN_BYTES: usize = 8;

/// Element type for a safetensors dtype, `None` when unsupported
pub fn element_type_of(dtype: Dtype) -> Option<ElementType> {
    match dtype {
        Dtype::U8 => Some(ElementType::UInt8),
        Dtype::I32 => Some(ElementType::Int32),
        Dtype::I64 => Some(ElementType::Int64),
        Dtype::F32 => Some(ElementType::Float32),
        Dtype::F64 => Some(ElementType::Float64),
        _ => None,
    }
}

/// Safetensors dtype for an element type
pub fn dtype_of(element_type: ElementType) -> Dtype {
    match element_type {
        ElementType::UInt8 => Dtype::U8,
        ElementType::Int32 => Dtype::I32,
        ElementType::Int64 => Dtype::I64,
        ElementType::Float32 => Dtype::F32,
        ElementType::Float64 => Dtype::F64,
    }
}

/// Location and layout of one stored array
#[derive(Debug, Clone)]
struct StoredArray {
    /// Stored dtype
    dtype: Dtype,

    /// Array shape
    shape: Vec<usize>,

    /// Absolute byte offset of the first element in the file
    start: usize,

    /// Absolute byte offset one past the last element
    end: usize,
}

/// Read-only view of a keyed array file
pub struct KeyedArrayStore {
    /// The path to the file
    path: PathBuf,

    /// The memory map
    mmap: Mmap,

    /// Arrays by name
    arrays: BTreeMap<String, StoredArray>,

    /// Free-form string metadata from the header
    metadata: HashMap<String, String>,
}

impl KeyedArrayStore {
    /// Map a store file for reading
    #[allow(unsafe_code)]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        // The map is read-only and the store is not written while a reader holds it.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let (header_len, header) = SafeTensors::read_metadata(&mmap[..])?;
        let data_start = HEADER_LEN_BYTES + header_len;

        let mut arrays = BTreeMap::new();
        for (name, info) in header.tensors() {
            let (begin, end) = info.data_offsets;
            let stored = StoredArray {
                dtype: info.dtype,
                shape: info.shape.clone(),
                start: data_start + begin,
                end: data_start + end,
            };
            if stored.end > mmap.len() {
                return Err(Error::Format(format!(
                    "array {name} ends at byte {} but {} is only {} bytes",
                    stored.end,
                    path.display(),
                    mmap.len()
                )));
            }
            arrays.insert(name, stored);
        }
        let metadata = header.metadata().clone().unwrap_or_default();

        tracing::debug!(path = %path.display(), arrays = arrays.len(), "opened keyed array store");

        Ok(Self {
            path,
            mmap,
            arrays,
            metadata,
        })
    }

    /// Get the path to the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an array named `key` is stored
    pub fn contains(&self, key: &str) -> bool {
        self.arrays.contains_key(key)
    }

    /// Get a handle to the array named `key`
    pub fn get(&self, key: &str) -> Option<ArrayHandle<'_>> {
        self.arrays
            .get_key_value(key)
            .map(|(name, stored)| ArrayHandle {
                store: self,
                name,
                stored,
            })
    }

    /// Names of all stored arrays, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Handles to all stored arrays, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = ArrayHandle<'_>> {
        self.arrays.iter().map(|(name, stored)| ArrayHandle {
            store: self,
            name,
            stored,
        })
    }

    /// Number of stored arrays
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Whether the store holds no arrays
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// String metadata written alongside the arrays
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Release the file mapping
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for KeyedArrayStore {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "closed keyed array store");
    }
}

impl std::fmt::Debug for KeyedArrayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedArrayStore")
            .field("path", &self.path)
            .field("arrays", &self.arrays.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A stored array, read lazily from the mapping
#[derive(Clone, Copy)]
pub struct ArrayHandle<'a> {
    store: &'a KeyedArrayStore,
    name: &'a str,
    stored: &'a StoredArray,
}

impl<'a> ArrayHandle<'a> {
    /// Name of the array
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Shape of the array
    pub fn shape(&self) -> &'a [usize] {
        &self.stored.shape
    }

    /// Stored dtype
    pub fn dtype(&self) -> Dtype {
        self.stored.dtype
    }

    /// Element type, `None` when the dtype cannot be decoded
    pub fn element_type(&self) -> Option<ElementType> {
        element_type_of(self.stored.dtype)
    }

    /// Size of the first dimension, `None` for 0-d arrays
    pub fn first_dim(&self) -> Option<usize> {
        self.stored.shape.first().copied()
    }

    /// Read the `index`-th slice along the first dimension
    pub fn row(&self, index: usize) -> CoreResult<RawArray> {
        let element_type = self.decodable_type()?;
        let len = self.first_dim().ok_or_else(|| {
            CoreError::InvalidArgument(format!("array {} is 0-dimensional", self.name))
        })?;
        if index >= len {
            return Err(CoreError::IndexOutOfBounds { index, len });
        }

        let row_shape = &self.stored.shape[1..];
        let row_bytes = row_shape.iter().product::<usize>() * element_type.size_bytes();
        let start = self.stored.start + index * row_bytes;
        let bytes = &self.store.mmap[start..start + row_bytes];
        decode(element_type, row_shape, bytes)
    }

    /// Read the whole array
    pub fn read(&self) -> CoreResult<RawArray> {
        let element_type = self.decodable_type()?;
        let bytes = &self.store.mmap[self.stored.start..self.stored.end];
        decode(element_type, &self.stored.shape, bytes)
    }

    fn decodable_type(&self) -> CoreResult<ElementType> {
        self.element_type().ok_or_else(|| {
            CoreError::TypeMismatch(format!(
                "array {} has unsupported dtype {:?}",
                self.name, self.stored.dtype
            ))
        })
    }
}

impl std::fmt::Debug for ArrayHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayHandle")
            .field("name", &self.name)
            .field("dtype", &self.stored.dtype)
            .field("shape", &self.stored.shape)
            .finish()
    }
}

/// Read elements of type `U` as stored and convert each one from little-endian
fn le_values<U: Pod, T>(bytes: &[u8], convert: impl Fn(U) -> T) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<U>())
        .map(|chunk| convert(bytemuck::pod_read_unaligned(chunk)))
        .collect()
}

/// Decode little-endian bytes into an array of `shape`
fn decode(element_type: ElementType, shape: &[usize], bytes: &[u8]) -> CoreResult<RawArray> {
    let shape = IxDyn(shape);
    Ok(match element_type {
        ElementType::UInt8 => RawArray::from(ArrayD::from_shape_vec(shape, bytes.to_vec())?),
        ElementType::Int32 => RawArray::from(ArrayD::from_shape_vec(shape, le_values(bytes, i32::from_le))?),
        ElementType::Int64 => RawArray::from(ArrayD::from_shape_vec(shape, le_values(bytes, i64::from_le))?),
        ElementType::Float32 => RawArray::from(ArrayD::from_shape_vec(
            shape,
            le_values(bytes, |bits: u32| f32::from_bits(u32::from_le(bits))),
        )?),
        ElementType::Float64 => RawArray::from(ArrayD::from_shape_vec(
            shape,
            le_values(bytes, |bits: u64| f64::from_bits(u64::from_le(bits))),
        )?),
    })
}

fn encode<T: Copy, const N: usize>(array: &ArrayD<T>, to_le_bytes: fn(T) -> [u8; N]) -> Vec<u8> {
    array.iter().flat_map(|&x| to_le_bytes(x)).collect()
}

/// Writes named arrays to a new store file
#[derive(Debug, Clone, Default)]
pub struct StoreWriter {
    /// Arrays in insertion order
    arrays: Vec<(String, RawArray)>,

    /// String metadata for the header
    metadata: HashMap<String, String>,
}

impl StoreWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an array under `name`
    #[must_use]
    pub fn array(mut self, name: impl Into<String>, array: RawArray) -> Self {
        self.arrays.push((name.into(), array));
        self
    }

    /// Add a metadata entry
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Write the store to `path`, replacing any existing file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut seen = HashSet::new();
        let mut encoded = Vec::with_capacity(self.arrays.len());
        for (name, array) in &self.arrays {
            if !seen.insert(name.as_str()) {
                return Err(Error::Configuration(format!("duplicate array name {name}")));
            }
            let bytes = match array {
                RawArray::UInt8(a) => encode(a, u8::to_le_bytes),
                RawArray::Int32(a) => encode(a, i32::to_le_bytes),
                RawArray::Int64(a) => encode(a, i64::to_le_bytes),
                RawArray::Float32(a) => encode(a, f32::to_le_bytes),
                RawArray::Float64(a) => encode(a, f64::to_le_bytes),
            };
            encoded.push((name, dtype_of(array.element_type()), array.shape().to_vec(), bytes));
        }

        let views = encoded
            .iter()
            .map(|(name, dtype, shape, bytes)| {
                Ok((name.as_str(), TensorView::new(*dtype, shape.clone(), bytes)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata = if self.metadata.is_empty() {
            None
        } else {
            Some(self.metadata.clone())
        };
        safetensors::serialize_to_file(
            views.iter().map(|(name, view)| (*name, view)),
            &metadata,
            path.as_ref(),
        )?;

        tracing::debug!(path = %path.as_ref().display(), arrays = views.len(), "wrote keyed array store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use proptest::prelude::*;
    use test_case::test_case;

    fn write_store(dir: &tempfile::TempDir) -> anyhow::Result<PathBuf> {
        let path = dir.path().join("store.safetensors");
        StoreWriter::new()
            .array("images", RawArray::from(array![[[1u8, 2], [3, 4]], [[5, 6], [7, 8]], [[9, 10], [11, 12]]]))
            .array("labels", RawArray::from(array![0i64, 1, 2]))
            .array("weights", RawArray::from(array![0.5f32, 1.5, 2.5]))
            .metadata("source", "unit-test")
            .write(&path)?;
        Ok(path)
    }

    #[test]
    fn test_open_lists_arrays() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = KeyedArrayStore::open(write_store(&dir)?)?;

        assert_eq!(store.len(), 3);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["images", "labels", "weights"]);
        assert!(store.contains("labels"));
        assert!(!store.contains("missing"));
        assert_eq!(store.metadata().get("source").map(String::as_str), Some("unit-test"));

        let images = store.get("images").unwrap();
        assert_eq!(images.shape(), &[3, 2, 2]);
        assert_eq!(images.first_dim(), Some(3));
        assert_eq!(images.element_type(), Some(ElementType::UInt8));
        Ok(())
    }

    #[test_case("images", 1, RawArray::from(array![[5u8, 6], [7, 8]]) ; "u8 matrix row")]
    #[test_case("labels", 2, RawArray::from(ndarray::arr0(2i64)) ; "i64 scalar row")]
    #[test_case("weights", 0, RawArray::from(ndarray::arr0(0.5f32)) ; "f32 scalar row")]
    fn test_row(key: &str, index: usize, expected: RawArray) {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyedArrayStore::open(write_store(&dir).unwrap()).unwrap();
        assert_eq!(store.get(key).unwrap().row(index).unwrap(), expected);
    }

    #[test]
    fn test_decode_reads_little_endian() {
        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|x| x.to_le_bytes()).collect();
        assert_eq!(
            decode(ElementType::Float32, &[2], &bytes).unwrap(),
            RawArray::from(array![1.5f32, -2.0])
        );

        let bytes: Vec<u8> = [258i64, -1].iter().flat_map(|x| x.to_le_bytes()).collect();
        assert_eq!(
            decode(ElementType::Int64, &[2, 1], &bytes).unwrap(),
            RawArray::from(array![[258i64], [-1]])
        );
    }

    #[test]
    fn test_writer_stores_little_endian() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("le.safetensors");
        StoreWriter::new()
            .array("v", RawArray::from(array![1i32, 258]))
            .write(&path)?;

        let file = std::fs::read(&path)?;
        assert!(file.ends_with(&[1, 0, 0, 0, 2, 1, 0, 0]));
        Ok(())
    }

    #[test]
    fn test_read_whole_array() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = KeyedArrayStore::open(write_store(&dir)?)?;
        assert_eq!(
            store.get("labels").unwrap().read()?,
            RawArray::from(array![0i64, 1, 2])
        );
        Ok(())
    }

    #[test]
    fn test_row_out_of_bounds() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = KeyedArrayStore::open(write_store(&dir)?)?;
        assert!(matches!(
            store.get("labels").unwrap().row(3),
            Err(CoreError::IndexOutOfBounds { index: 3, len: 3 })
        ));
        Ok(())
    }

    #[test]
    fn test_open_rejects_garbage() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("garbage.safetensors");
        std::fs::write(&path, b"definitely not a store")?;
        assert!(matches!(KeyedArrayStore::open(&path), Err(Error::SafeTensors(_))));
        assert!(matches!(
            KeyedArrayStore::open(dir.path().join("missing.safetensors")),
            Err(Error::Io(_))
        ));
        Ok(())
    }

    #[test]
    fn test_writer_rejects_duplicate_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = StoreWriter::new()
            .array("a", RawArray::from(array![1u8]))
            .array("a", RawArray::from(array![2u8]))
            .write(dir.path().join("dup.safetensors"));
        assert!(matches!(result, Err(Error::Configuration(_))));
        Ok(())
    }

    proptest! {
        #[test]
        fn test_rows_match_written_array(
            rows in 1usize..6,
            cols in 1usize..5,
            seed in proptest::collection::vec(-1.0e6f64..1.0e6, 30),
        ) {
            let data: Vec<f64> = seed.iter().copied().cycle().take(rows * cols).collect();
            let array = Array2::from_shape_vec((rows, cols), data).unwrap().into_dyn();
            let raw = RawArray::from(array);

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("prop.safetensors");
            StoreWriter::new().array("m", raw.clone()).write(&path).unwrap();
            let store = KeyedArrayStore::open(&path).unwrap();
            let handle = store.get("m").unwrap();

            for i in 0..rows {
                prop_assert_eq!(handle.row(i).unwrap(), raw.row(i).unwrap());
            }
        }
    }
}
