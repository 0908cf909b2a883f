//! Chunked, typed, resizable arrays.
//!
//! Every array has a fixed row shape and a fixed number of rows per chunk;
//! only the number of rows (axis 0) can change. Rows that were never written
//! read back as zero.
//!
//! Two backends are provided: [`MemoryArray`] keeps everything in one
//! `ndarray` buffer, [`NpyChunkedArray`] stores one `.npy` file per chunk
//! next to an `array.json` metadata file:
//!
//! ```text
//! <dir>/array.json      {"shape": [N, ...], "chunks": [chunk, ...], "dtype": "<i2"}
//! <dir>/chunk_0.npy     rows 0..chunk
//! <dir>/chunk_1.npy     rows chunk..2*chunk
//! ```

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::marker::PhantomData;
use std::ops::Range;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use ndarray_npy::{read_npy, write_npy, ReadableElement, WritableElement};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

pub const META_FILE: &str = "array.json";

/// Element types the store can hold
pub trait Element:
    Copy + Default + PartialEq + fmt::Debug + ReadableElement + WritableElement + 'static
{
    /// numpy type string, as written to the metadata
    const DTYPE: &'static str;
}

impl Element for i16 {
    const DTYPE: &'static str = "<i2";
}

impl Element for f32 {
    const DTYPE: &'static str = "<f4";
}

/// Narrow interface the dataset needs from an array store
pub trait ChunkedArray<T: Element> {
    fn name(&self) -> &str;

    /// Shape of one row (everything but axis 0)
    fn row_shape(&self) -> &[usize];

    fn chunk_rows(&self) -> usize;

    /// Number of rows
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow or shrink to `rows` rows; new rows are zero
    fn resize(&mut self, rows: usize) -> Result<()>;

    /// Write `rows` (shape `[n, row_shape..]`) starting at row `offset`.
    /// Fails without writing if the window exceeds the current length.
    fn write_rows(&mut self, offset: usize, rows: ArrayViewD<'_, T>) -> Result<()>;

    fn read_rows(&self, offset: usize, count: usize) -> Result<ArrayD<T>>;
}

fn full_shape(rows: usize, row_shape: &[usize]) -> Vec<usize> {
    let mut shape = Vec::with_capacity(row_shape.len() + 1);
    shape.push(rows);
    shape.extend_from_slice(row_shape);
    shape
}

/// Number of rows in `rows`, after checking the row shape matches
fn check_rows<T>(name: &str, row_shape: &[usize], rows: &ArrayViewD<'_, T>) -> Result<usize> {
    let shape = rows.shape();
    if shape.is_empty() || &shape[1..] != row_shape {
        return Err(ExportError::ShapeMismatch {
            array: name.to_string(),
            expected: row_shape.to_vec(),
            found: shape.get(1..).unwrap_or(&[]).to_vec(),
        });
    }
    Ok(shape[0])
}

/// Write `path` through a sibling `.tmp` file renamed over it, so readers
/// see either the old or the new contents
fn replace_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    write(&tmp)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn check_window(offset: usize, count: usize, len: usize) -> Result<()> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(ExportError::CapacityExceeded {
            offset,
            rows: count,
            capacity: len,
        }),
    }
}

/// Part of a row window that falls into one chunk
struct ChunkSpan {
    index: usize,
    /// Rows inside the chunk
    in_chunk: Range<usize>,
    /// The same rows relative to the start of the window
    in_window: Range<usize>,
}

fn chunk_spans(offset: usize, count: usize, chunk_rows: usize) -> Vec<ChunkSpan> {
    let end = offset + count;
    let mut spans = Vec::new();
    let mut row = offset;
    while row < end {
        let index = row / chunk_rows;
        let chunk_start = index * chunk_rows;
        let span_end = (chunk_start + chunk_rows).min(end);
        spans.push(ChunkSpan {
            index,
            in_chunk: row - chunk_start..span_end - chunk_start,
            in_window: row - offset..span_end - offset,
        });
        row = span_end;
    }
    spans
}

/// Array held entirely in memory
pub struct MemoryArray<T: Element> {
    name: String,
    row_shape: Vec<usize>,
    chunk_rows: usize,
    data: ArrayD<T>,
}

impl<T: Element> MemoryArray<T> {
    pub fn new(name: &str, row_shape: &[usize], chunk_rows: usize) -> Self {
        Self {
            name: name.to_string(),
            row_shape: row_shape.to_vec(),
            chunk_rows,
            data: ArrayD::from_elem(IxDyn(&full_shape(0, row_shape)), T::default()),
        }
    }
}

impl<T: Element> ChunkedArray<T> for MemoryArray<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_shape(&self) -> &[usize] {
        &self.row_shape
    }

    fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    fn resize(&mut self, rows: usize) -> Result<()> {
        let mut data = ArrayD::from_elem(IxDyn(&full_shape(rows, &self.row_shape)), T::default());
        let keep = Slice::from(0..rows.min(self.len()));
        data.slice_axis_mut(Axis(0), keep)
            .assign(&self.data.slice_axis(Axis(0), keep));
        self.data = data;
        Ok(())
    }

    fn write_rows(&mut self, offset: usize, rows: ArrayViewD<'_, T>) -> Result<()> {
        let count = check_rows(&self.name, &self.row_shape, &rows)?;
        check_window(offset, count, self.len())?;
        self.data
            .slice_axis_mut(Axis(0), Slice::from(offset..offset + count))
            .assign(&rows);
        Ok(())
    }

    fn read_rows(&self, offset: usize, count: usize) -> Result<ArrayD<T>> {
        check_window(offset, count, self.len())?;
        Ok(self
            .data
            .slice_axis(Axis(0), Slice::from(offset..offset + count))
            .to_owned())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArrayMeta {
    shape: Vec<usize>,
    chunks: Vec<usize>,
    dtype: String,
}

/// Array stored as a directory of `.npy` chunk files
pub struct NpyChunkedArray<T: Element> {
    name: String,
    dir: PathBuf,
    row_shape: Vec<usize>,
    chunk_rows: usize,
    len: usize,
    _element: PhantomData<T>,
}

impl<T: Element> NpyChunkedArray<T> {
    /// Create an empty array in `dir`
    pub fn create<P: AsRef<Path>>(
        dir: P,
        name: &str,
        row_shape: &[usize],
        chunk_rows: usize,
    ) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let array = Self {
            name: name.to_string(),
            dir: dir.as_ref().to_path_buf(),
            row_shape: row_shape.to_vec(),
            chunk_rows,
            len: 0,
            _element: PhantomData,
        };
        array.write_meta()?;
        Ok(array)
    }

    /// Open an array previously created in `dir`
    pub fn open<P: AsRef<Path>>(dir: P, name: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let file = File::open(dir.join(META_FILE))?;
        let meta: ArrayMeta = serde_json::from_reader(BufReader::new(file))?;

        if meta.dtype != T::DTYPE {
            return Err(ExportError::DtypeMismatch {
                array: name.to_string(),
                expected: T::DTYPE.to_string(),
                found: meta.dtype,
            });
        }
        if meta.shape.is_empty()
            || meta.shape.len() != meta.chunks.len()
            || meta.shape[1..] != meta.chunks[1..]
            || meta.chunks[0] == 0
        {
            return Err(ExportError::ShapeMismatch {
                array: name.to_string(),
                expected: meta.shape,
                found: meta.chunks,
            });
        }

        Ok(Self {
            name: name.to_string(),
            dir,
            row_shape: meta.shape[1..].to_vec(),
            chunk_rows: meta.chunks[0],
            len: meta.shape[0],
            _element: PhantomData,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_meta(&self) -> Result<()> {
        let meta = ArrayMeta {
            shape: full_shape(self.len, &self.row_shape),
            chunks: full_shape(self.chunk_rows, &self.row_shape),
            dtype: T::DTYPE.to_string(),
        };
        replace_file(&self.dir.join(META_FILE), |tmp| {
            let file = File::create(tmp)?;
            serde_json::to_writer_pretty(BufWriter::new(file), &meta)?;
            Ok(())
        })
    }

    fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("chunk_{index}.npy"))
    }

    fn chunk_count(&self, rows: usize) -> usize {
        rows.div_ceil(self.chunk_rows)
    }

    fn load_chunk(&self, index: usize) -> Result<ArrayD<T>> {
        let chunk_shape = full_shape(self.chunk_rows, &self.row_shape);
        let path = self.chunk_path(index);
        if !path.exists() {
            return Ok(ArrayD::from_elem(IxDyn(&chunk_shape), T::default()));
        }

        let chunk: ArrayD<T> = read_npy(&path)?;
        if chunk.shape() != chunk_shape.as_slice() {
            return Err(ExportError::ShapeMismatch {
                array: self.name.clone(),
                expected: chunk_shape,
                found: chunk.shape().to_vec(),
            });
        }
        Ok(chunk)
    }

    fn store_chunk(&self, index: usize, chunk: &ArrayD<T>) -> Result<()> {
        replace_file(&self.chunk_path(index), |tmp| {
            write_npy(tmp, chunk)?;
            Ok(())
        })
    }
}

impl<T: Element> ChunkedArray<T> for NpyChunkedArray<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_shape(&self) -> &[usize] {
        &self.row_shape
    }

    fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    fn len(&self) -> usize {
        self.len
    }

    fn resize(&mut self, rows: usize) -> Result<()> {
        if rows < self.len {
            for index in self.chunk_count(rows)..self.chunk_count(self.len) {
                let path = self.chunk_path(index);
                if path.exists() {
                    fs::remove_file(path)?;
                }
            }

            // Zero the tail of a partially kept chunk so growing again
            // exposes zeros, not stale rows
            let tail = rows % self.chunk_rows;
            let index = rows / self.chunk_rows;
            if tail != 0 && self.chunk_path(index).exists() {
                let mut chunk = self.load_chunk(index)?;
                chunk
                    .slice_axis_mut(Axis(0), Slice::from(tail..))
                    .fill(T::default());
                self.store_chunk(index, &chunk)?;
            }
        }

        self.len = rows;
        self.write_meta()
    }

    fn write_rows(&mut self, offset: usize, rows: ArrayViewD<'_, T>) -> Result<()> {
        let count = check_rows(&self.name, &self.row_shape, &rows)?;
        check_window(offset, count, self.len)?;

        for span in chunk_spans(offset, count, self.chunk_rows) {
            let mut chunk = self.load_chunk(span.index)?;
            chunk
                .slice_axis_mut(Axis(0), Slice::from(span.in_chunk))
                .assign(&rows.slice_axis(Axis(0), Slice::from(span.in_window)));
            self.store_chunk(span.index, &chunk)?;
        }
        Ok(())
    }

    fn read_rows(&self, offset: usize, count: usize) -> Result<ArrayD<T>> {
        check_window(offset, count, self.len)?;

        let mut out = ArrayD::from_elem(IxDyn(&full_shape(count, &self.row_shape)), T::default());
        for span in chunk_spans(offset, count, self.chunk_rows) {
            let chunk = self.load_chunk(span.index)?;
            out.slice_axis_mut(Axis(0), Slice::from(span.in_window))
                .assign(&chunk.slice_axis(Axis(0), Slice::from(span.in_chunk)));
        }
        Ok(out)
    }
}
