//! The three aligned arrays of an export plus the commit watermark.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chesszero_core::{BOARD_HEIGHT, BOARD_WIDTH, NB_CHANNELS, NB_LABELS};
use log::debug;
use ndarray::{Array1, Array2, Array3, Array4, ArrayView1, ArrayView3, Axis, Ix1, Ix2, Ix4};
use serde::{Deserialize, Serialize};

use crate::data::TrainingExample;
use crate::error::{ExportError, Result};
use crate::storage::{ChunkedArray, Element, MemoryArray, NpyChunkedArray};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const PLANES_ARRAY: &str = "x";
pub const VALUES_ARRAY: &str = "y_value";
pub const POLICY_ARRAY: &str = "y_policy";

pub const DEFAULT_CHUNK_ROWS: usize = 128;

/// Fixed shape parameters of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub labels: usize,

    /// Rows per chunk, shared by all three arrays
    pub chunk_rows: usize,

    /// Hard cap on the number of rows, if any
    pub max_rows: Option<usize>,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            channels: NB_CHANNELS,
            height: BOARD_HEIGHT,
            width: BOARD_WIDTH,
            labels: NB_LABELS,
            chunk_rows: DEFAULT_CHUNK_ROWS,
            max_rows: None,
        }
    }
}

impl DatasetLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_rows(mut self, rows: usize) -> Self {
        self.chunk_rows = rows.max(1);
        self
    }

    pub fn with_max_rows(mut self, rows: usize) -> Self {
        self.max_rows = Some(rows);
        self
    }

    /// Fails unless every dimension and the chunk size are positive
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("channels", self.channels),
            ("height", self.height),
            ("width", self.width),
            ("labels", self.labels),
            ("chunk_rows", self.chunk_rows),
        ];
        match dims.iter().find(|(_, n)| *n == 0) {
            Some((name, _)) => Err(ExportError::InvalidLayout(format!(
                "{name} must be positive"
            ))),
            None => Ok(()),
        }
    }

    pub fn plane_shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Capacity needed to hold rows up to `end`: the next multiple of the
    /// chunk size, capped by `max_rows`
    fn capacity_for(&self, end: usize) -> usize {
        let grown = end.div_ceil(self.chunk_rows) * self.chunk_rows;
        match self.max_rows {
            Some(max) => grown.min(max),
            None => grown,
        }
    }
}

/// How far a row has progressed through the two write phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Not written, or written by a game that was never finalized
    Empty,
    /// Planes and policy written, value pending
    PositionCommitted,
    /// Below the commit watermark
    FullyCommitted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    layout: DatasetLayout,
    #[serde(default)]
    normalize_planes: bool,
    committed_len: usize,
    games: usize,
}

/// Three aligned arrays addressed by one row offset.
///
/// `x` holds `[N, C, H, W]` planes, `y_value` holds `[N]` values and
/// `y_policy` holds `[N, L]` policies. They are always resized together.
/// Rows below [`Dataset::committed_len`] are complete and never rewritten.
pub struct Dataset {
    layout: DatasetLayout,
    normalize_planes: bool,
    root: Option<PathBuf>,
    planes: Box<dyn ChunkedArray<i16>>,
    values: Box<dyn ChunkedArray<i16>>,
    policy: Box<dyn ChunkedArray<f32>>,
    committed_len: usize,
    written_len: usize,
    games: usize,
}

impl Dataset {
    /// Dataset backed by memory only
    ///
    /// `normalize_planes` records how the stored planes were encoded.
    pub fn in_memory(layout: DatasetLayout, normalize_planes: bool) -> Result<Self> {
        layout.validate()?;
        Ok(Self {
            layout,
            normalize_planes,
            root: None,
            planes: Box::new(MemoryArray::new(
                PLANES_ARRAY,
                &layout.plane_shape(),
                layout.chunk_rows,
            )),
            values: Box::new(MemoryArray::new(VALUES_ARRAY, &[], layout.chunk_rows)),
            policy: Box::new(MemoryArray::new(
                POLICY_ARRAY,
                &[layout.labels],
                layout.chunk_rows,
            )),
            committed_len: 0,
            written_len: 0,
            games: 0,
        })
    }

    /// Create a new on-disk dataset under `root`.
    ///
    /// Fails with [`ExportError::DatasetExists`] if `root` already holds one.
    pub fn create<P: AsRef<Path>>(
        root: P,
        layout: DatasetLayout,
        normalize_planes: bool,
    ) -> Result<Self> {
        layout.validate()?;
        let root = root.as_ref().to_path_buf();
        if root.join(MANIFEST_FILE).exists() {
            return Err(ExportError::DatasetExists(root));
        }
        fs::create_dir_all(&root)?;

        let dataset = Self {
            layout,
            normalize_planes,
            planes: Box::new(NpyChunkedArray::<i16>::create(
                root.join(PLANES_ARRAY),
                PLANES_ARRAY,
                &layout.plane_shape(),
                layout.chunk_rows,
            )?),
            values: Box::new(NpyChunkedArray::<i16>::create(
                root.join(VALUES_ARRAY),
                VALUES_ARRAY,
                &[],
                layout.chunk_rows,
            )?),
            policy: Box::new(NpyChunkedArray::<f32>::create(
                root.join(POLICY_ARRAY),
                POLICY_ARRAY,
                &[layout.labels],
                layout.chunk_rows,
            )?),
            root: Some(root),
            committed_len: 0,
            written_len: 0,
            games: 0,
        };
        dataset.write_manifest()?;
        Ok(dataset)
    }

    /// Open an existing on-disk dataset.
    ///
    /// Rows past the watermark are treated as unwritten and will be
    /// overwritten by the next export; see [`Dataset::truncate_to_committed`]
    /// to drop them from disk.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let file = File::open(root.join(MANIFEST_FILE))?;
        let manifest: Manifest = serde_json::from_reader(BufReader::new(file))?;
        let layout = manifest.layout;
        layout.validate()?;

        let planes = NpyChunkedArray::<i16>::open(root.join(PLANES_ARRAY), PLANES_ARRAY)?;
        let values = NpyChunkedArray::<i16>::open(root.join(VALUES_ARRAY), VALUES_ARRAY)?;
        let policy = NpyChunkedArray::<f32>::open(root.join(POLICY_ARRAY), POLICY_ARRAY)?;

        check_row_shape(&planes, &layout.plane_shape())?;
        check_row_shape(&values, &[])?;
        check_row_shape(&policy, &[layout.labels])?;

        let dataset = Self {
            layout,
            normalize_planes: manifest.normalize_planes,
            root: Some(root),
            planes: Box::new(planes),
            values: Box::new(values),
            policy: Box::new(policy),
            committed_len: manifest.committed_len,
            written_len: manifest.committed_len,
            games: manifest.games,
        };
        dataset.check_aligned()?;
        if dataset.committed_len > dataset.len() {
            return Err(ExportError::CorruptManifest {
                committed: dataset.committed_len,
                len: dataset.len(),
            });
        }
        Ok(dataset)
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Whether the stored planes carry normalized move counters
    pub fn normalize_planes(&self) -> bool {
        self.normalize_planes
    }

    /// Directory of an on-disk dataset
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Allocated rows (shared by all three arrays)
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commit watermark: rows `0..committed_len` are complete
    pub fn committed_len(&self) -> usize {
        self.committed_len
    }

    /// One past the highest row holding planes and policy
    pub fn written_len(&self) -> usize {
        self.written_len
    }

    /// Number of committed games
    pub fn games(&self) -> usize {
        self.games
    }

    pub fn has_uncommitted_rows(&self) -> bool {
        self.written_len > self.committed_len
    }

    pub fn row_state(&self, offset: usize) -> RowState {
        if offset < self.committed_len {
            RowState::FullyCommitted
        } else if offset < self.written_len {
            RowState::PositionCommitted
        } else {
            RowState::Empty
        }
    }

    /// Fails if the three arrays disagree on their length
    pub fn check_aligned(&self) -> Result<()> {
        let (x, value, policy) = (self.planes.len(), self.values.len(), self.policy.len());
        if x != value || x != policy {
            return Err(ExportError::MisalignedArrays { x, value, policy });
        }
        Ok(())
    }

    /// Grow all three arrays so rows `offset..offset + count` fit
    pub fn ensure_capacity(&mut self, offset: usize, count: usize) -> Result<()> {
        let capacity_error = || ExportError::CapacityExceeded {
            offset,
            rows: count,
            capacity: self.layout.max_rows.unwrap_or(usize::MAX),
        };
        let end = offset.checked_add(count).ok_or_else(capacity_error)?;
        if end <= self.len() {
            return Ok(());
        }

        let capacity = self.layout.capacity_for(end);
        if capacity < end {
            return Err(capacity_error());
        }

        debug!("Growing dataset from {} to {} rows", self.len(), capacity);
        self.planes.resize(capacity)?;
        self.values.resize(capacity)?;
        self.policy.resize(capacity)?;
        self.check_aligned()
    }

    /// Write the planes and policy of one position
    pub fn write_position(
        &mut self,
        offset: usize,
        planes: ArrayView3<'_, i16>,
        policy: ArrayView1<'_, f32>,
    ) -> Result<()> {
        self.check_writable(offset)?;
        self.ensure_capacity(offset, 1)?;

        self.planes
            .write_rows(offset, planes.insert_axis(Axis(0)).into_dyn())?;
        self.policy
            .write_rows(offset, policy.insert_axis(Axis(0)).into_dyn())?;
        self.written_len = self.written_len.max(offset + 1);
        Ok(())
    }

    /// Write the value rows `offset..offset + values.len()`
    pub fn write_values(&mut self, offset: usize, values: ArrayView1<'_, i16>) -> Result<()> {
        self.check_writable(offset)?;
        self.ensure_capacity(offset, values.len())?;
        self.values.write_rows(offset, values.into_dyn())
    }

    /// Advance the watermark to `end` and persist the manifest
    pub(crate) fn commit(&mut self, end: usize) -> Result<()> {
        self.committed_len = end;
        self.written_len = self.written_len.max(end);
        self.games += 1;
        self.write_manifest()
    }

    fn check_writable(&self, offset: usize) -> Result<()> {
        if offset < self.committed_len {
            return Err(ExportError::CommittedRow {
                offset,
                committed: self.committed_len,
            });
        }
        Ok(())
    }

    fn check_committed(&self, offset: usize, count: usize) -> Result<()> {
        match offset.checked_add(count) {
            Some(end) if end <= self.committed_len => Ok(()),
            _ => Err(ExportError::Uncommitted {
                offset,
                committed: self.committed_len,
            }),
        }
    }

    /// Planes of committed rows, `[count, C, H, W]`
    pub fn read_planes(&self, offset: usize, count: usize) -> Result<Array4<i16>> {
        self.check_committed(offset, count)?;
        Ok(self
            .planes
            .read_rows(offset, count)?
            .into_dimensionality::<Ix4>()?)
    }

    /// Policies of committed rows, `[count, L]`
    pub fn read_policy(&self, offset: usize, count: usize) -> Result<Array2<f32>> {
        self.check_committed(offset, count)?;
        Ok(self
            .policy
            .read_rows(offset, count)?
            .into_dimensionality::<Ix2>()?)
    }

    /// Values of committed rows, `[count]`
    pub fn read_values(&self, offset: usize, count: usize) -> Result<Array1<i16>> {
        self.check_committed(offset, count)?;
        Ok(self
            .values
            .read_rows(offset, count)?
            .into_dimensionality::<Ix1>()?)
    }

    /// One committed row across all three arrays
    pub fn read_example(&self, offset: usize) -> Result<TrainingExample> {
        let planes: Array3<i16> = self.read_planes(offset, 1)?.index_axis_move(Axis(0), 0);
        let policy: Array1<f32> = self.read_policy(offset, 1)?.index_axis_move(Axis(0), 0);
        let value = self.read_values(offset, 1)?[0];
        Ok(TrainingExample {
            planes,
            policy,
            value,
        })
    }

    /// Drop every row past the watermark
    pub fn truncate_to_committed(&mut self) -> Result<()> {
        let len = self.committed_len;
        self.planes.resize(len)?;
        self.values.resize(len)?;
        self.policy.resize(len)?;
        self.written_len = len;
        self.check_aligned()?;
        self.write_manifest()
    }

    /// Atomically replace the manifest of an on-disk dataset
    fn write_manifest(&self) -> Result<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };

        let manifest = Manifest {
            layout: self.layout,
            normalize_planes: self.normalize_planes,
            committed_len: self.committed_len,
            games: self.games,
        };
        let tmp = root.join(format!("{MANIFEST_FILE}.tmp"));
        {
            let file = File::create(&tmp)?;
            serde_json::to_writer_pretty(BufWriter::new(file), &manifest)?;
        }
        fs::rename(tmp, root.join(MANIFEST_FILE))?;
        Ok(())
    }
}

fn check_row_shape<T: Element, A: ChunkedArray<T>>(array: &A, expected: &[usize]) -> Result<()> {
    if array.row_shape() != expected {
        return Err(ExportError::ShapeMismatch {
            array: array.name().to_string(),
            expected: expected.to_vec(),
            found: array.row_shape().to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array1, Array3};

    fn small_layout() -> DatasetLayout {
        DatasetLayout {
            channels: 2,
            height: 2,
            width: 2,
            labels: 3,
            chunk_rows: 4,
            max_rows: None,
        }
    }

    fn planes(fill: i16) -> Array3<i16> {
        Array3::from_elem((2, 2, 2), fill)
    }

    #[test]
    fn test_default_layout() {
        let layout = DatasetLayout::default();
        assert_eq!(layout.plane_shape(), [20, 8, 8]);
        assert_eq!(layout.labels, 1858);
        assert_eq!(layout.chunk_rows, 128);
    }

    #[test]
    fn test_growth_in_whole_chunks() {
        let mut dataset = Dataset::in_memory(small_layout(), false).unwrap();
        assert!(dataset.is_empty());

        dataset
            .write_position(0, planes(1).view(), arr1(&[1.0, 0.0, 0.0]).view())
            .unwrap();
        assert_eq!(dataset.len(), 4);

        dataset
            .write_position(4, planes(1).view(), arr1(&[1.0, 0.0, 0.0]).view())
            .unwrap();
        assert_eq!(dataset.len(), 8);
        dataset.check_aligned().unwrap();
    }

    #[test]
    fn test_growth_capped_by_max_rows() {
        let mut dataset = Dataset::in_memory(small_layout().with_max_rows(6), false).unwrap();
        dataset.ensure_capacity(4, 1).unwrap();
        assert_eq!(dataset.len(), 6);

        let err = dataset.ensure_capacity(5, 2).unwrap_err();
        assert!(matches!(
            err,
            ExportError::CapacityExceeded {
                offset: 5,
                rows: 2,
                capacity: 6
            }
        ));
        assert_eq!(dataset.len(), 6);
    }

    #[test]
    fn test_row_states_and_reads() {
        let mut dataset = Dataset::in_memory(small_layout(), false).unwrap();
        for offset in 0..3 {
            dataset
                .write_position(offset, planes(offset as i16).view(), arr1(&[0.5, 0.5, 0.0]).view())
                .unwrap();
        }
        assert_eq!(dataset.row_state(0), RowState::PositionCommitted);
        assert!(matches!(
            dataset.read_example(0),
            Err(ExportError::Uncommitted {
                offset: 0,
                committed: 0
            })
        ));

        dataset.write_values(0, arr1(&[1, -1]).view()).unwrap();
        dataset.commit(2).unwrap();

        assert_eq!(dataset.row_state(1), RowState::FullyCommitted);
        assert_eq!(dataset.row_state(2), RowState::PositionCommitted);
        assert_eq!(dataset.row_state(3), RowState::Empty);
        assert!(dataset.has_uncommitted_rows());

        let example = dataset.read_example(1).unwrap();
        assert_eq!(example.planes, planes(1));
        assert_eq!(example.policy, arr1(&[0.5, 0.5, 0.0]));
        assert_eq!(example.value, -1);
        assert_eq!(dataset.read_values(0, 2).unwrap(), arr1(&[1i16, -1]));
    }

    #[test]
    fn test_committed_rows_are_not_rewritten() {
        let mut dataset = Dataset::in_memory(small_layout(), false).unwrap();
        dataset
            .write_position(0, planes(1).view(), arr1(&[1.0, 0.0, 0.0]).view())
            .unwrap();
        dataset.write_values(0, arr1(&[1]).view()).unwrap();
        dataset.commit(1).unwrap();

        assert!(matches!(
            dataset.write_position(0, planes(2).view(), arr1(&[0.0, 1.0, 0.0]).view()),
            Err(ExportError::CommittedRow {
                offset: 0,
                committed: 1
            })
        ));
        assert_eq!(dataset.read_planes(0, 1).unwrap().sum(), 8);
    }

    #[test]
    fn test_committed_values_are_not_rewritten() {
        let mut dataset = Dataset::in_memory(small_layout(), false).unwrap();
        for offset in 0..3 {
            dataset
                .write_position(offset, planes(1).view(), arr1(&[1.0, 0.0, 0.0]).view())
                .unwrap();
        }
        dataset.write_values(0, arr1(&[1, -1]).view()).unwrap();
        dataset.commit(2).unwrap();

        // Starts below the watermark even though it reaches past it
        assert!(matches!(
            dataset.write_values(1, arr1(&[0, 0]).view()),
            Err(ExportError::CommittedRow {
                offset: 1,
                committed: 2
            })
        ));
        assert_eq!(dataset.read_values(0, 2).unwrap(), arr1(&[1i16, -1]));
        dataset.write_values(2, arr1(&[0]).view()).unwrap();
    }

    #[test]
    fn test_zero_chunk_rows_rejected() {
        let layout = DatasetLayout {
            chunk_rows: 0,
            ..small_layout()
        };
        assert!(matches!(
            Dataset::in_memory(layout, false),
            Err(ExportError::InvalidLayout(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Dataset::create(dir.path().join("data"), layout, false),
            Err(ExportError::InvalidLayout(_))
        ));
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_manifest_committing_past_arrays_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        let mut dataset = Dataset::create(&root, small_layout(), true).unwrap();
        dataset
            .write_position(0, planes(1).view(), arr1(&[1.0, 0.0, 0.0]).view())
            .unwrap();
        dataset.write_values(0, arr1(&[1]).view()).unwrap();
        dataset.commit(1).unwrap();
        drop(dataset);

        let reopened = Dataset::open(&root).unwrap();
        assert!(reopened.normalize_planes());
        assert_eq!(reopened.committed_len(), 1);

        let manifest = Manifest {
            layout: small_layout(),
            normalize_planes: true,
            committed_len: 9,
            games: 1,
        };
        fs::write(
            root.join(MANIFEST_FILE),
            serde_json::to_string(&manifest).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            Dataset::open(&root),
            Err(ExportError::CorruptManifest {
                committed: 9,
                len: 4
            })
        ));
    }

    #[test]
    fn test_truncate_to_committed() {
        let mut dataset = Dataset::in_memory(small_layout(), false).unwrap();
        for offset in 0..6 {
            dataset
                .write_position(offset, planes(3).view(), Array1::zeros(3).view())
                .unwrap();
        }
        dataset.write_values(0, arr1(&[0, 0]).view()).unwrap();
        dataset.commit(2).unwrap();

        dataset.truncate_to_committed().unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.written_len(), 2);
        assert!(!dataset.has_uncommitted_rows());
        dataset.check_aligned().unwrap();
    }
}
