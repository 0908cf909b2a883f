//! Writes self-play positions into a [`Dataset`] and commits whole games.

use std::path::Path;

use chess::ChessMove;
use chesszero_core::Board;
use chesszero_search::{retrieve_legal_moves, smoothed_policy, SearchNode, SearchResult};
use log::{debug, info, warn};

use crate::config::ExportConfig;
use crate::data::{CommittedGame, GameRecord, GameResult, PositionCommit};
use crate::dataset::Dataset;
use crate::encode::{encode_planes, encode_policy};
use crate::error::{ExportError, Result};
use crate::value::assign_values;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameState {
    Idle,
    Recording(GameRecord),
}

/// Single writer over a dataset.
///
/// Positions are written as soon as they are recorded, values once the game
/// is finalized. The first integrity or capacity failure poisons the
/// exporter: every later call returns [`ExportError::Aborted`] and the
/// dataset is valid up to its commit watermark.
pub struct Exporter {
    dataset: Dataset,
    config: ExportConfig,
    cursor: usize,
    game: GameState,
    failed_at: Option<usize>,
}

impl Exporter {
    /// Export into `dataset`, starting at its commit watermark.
    ///
    /// Fails if `config` encodes planes differently from the rows already
    /// stored in `dataset`.
    pub fn new(dataset: Dataset, config: ExportConfig) -> Result<Self> {
        if dataset.normalize_planes() != config.normalize_planes {
            return Err(ExportError::EncodingMismatch {
                stored: dataset.normalize_planes(),
                requested: config.normalize_planes,
            });
        }
        if dataset.has_uncommitted_rows() {
            warn!(
                "Overwriting uncommitted rows {}..{}",
                dataset.committed_len(),
                dataset.written_len()
            );
        }
        let cursor = dataset.committed_len();
        Ok(Self {
            dataset,
            config,
            cursor,
            game: GameState::Idle,
            failed_at: None,
        })
    }

    /// Export into a new on-disk dataset at `path`
    pub fn create<P: AsRef<Path>>(path: P, config: ExportConfig) -> Result<Self> {
        let dataset = Dataset::create(path, config.layout, config.normalize_planes)?;
        Self::new(dataset, config)
    }

    /// Resume exporting into an existing on-disk dataset
    pub fn open<P: AsRef<Path>>(path: P, config: ExportConfig) -> Result<Self> {
        let dataset = Dataset::open(path)?;
        Self::new(dataset, config)
    }

    pub fn in_memory(config: ExportConfig) -> Result<Self> {
        let dataset = Dataset::in_memory(config.layout, config.normalize_planes)?;
        Self::new(dataset, config)
    }

    /// Record the position searched by `result`.
    ///
    /// `board` must be the position the search ran on.
    pub fn record_position(
        &mut self,
        board: &Board,
        result: &SearchResult,
    ) -> Result<PositionCommit> {
        self.check_live()?;
        if result.root != *board {
            let err = ExportError::PositionMismatch {
                offset: self.cursor,
                ply: self.open_ply(),
            };
            return Err(self.abort(err));
        }
        self.record(board, &result.legal_moves, &result.policy)
    }

    /// Record the position of a search-tree node, with its training policy
    /// derived from the child visit counts
    pub fn record_node<N: SearchNode + ?Sized>(&mut self, node: &N) -> Result<PositionCommit> {
        self.check_live()?;
        let policy = smoothed_policy(node, &self.config.smoothing).map_err(ExportError::from);
        let policy = self.guard(policy)?;
        let moves = retrieve_legal_moves(node);
        self.record(node.board(), &moves, &policy)
    }

    /// Write the value targets of the open game and commit it.
    ///
    /// `ply_count` must match the number of recorded positions; otherwise
    /// nothing is written.
    pub fn finalize_game(&mut self, result: GameResult, ply_count: usize) -> Result<CommittedGame> {
        self.check_live()?;

        let record = match self.game {
            GameState::Recording(record) => record,
            GameState::Idle => {
                let err = ExportError::NoOpenGame {
                    offset: self.cursor,
                };
                return Err(self.abort(err));
            }
        };
        if record.plys != ply_count {
            let err = ExportError::PlyCountMismatch {
                start: record.start,
                recorded: record.plys,
                claimed: ply_count,
            };
            return Err(self.abort(err));
        }

        let values = assign_values(result.relative_to(record.first_mover), record.plys);
        let written = self.dataset.write_values(record.start, values.view());
        self.guard(written)?;
        let committed = self.dataset.commit(record.end());
        self.guard(committed)?;
        self.game = GameState::Idle;

        info!(
            "Committed game {}..{} ({} plies, {:?})",
            record.start,
            record.end(),
            record.plys,
            result
        );
        Ok(CommittedGame {
            record,
            result,
            values,
        })
    }

    /// Record every node of a finished game in order, then commit it
    pub fn export_positions<N: SearchNode>(
        &mut self,
        nodes: &[N],
        result: GameResult,
    ) -> Result<CommittedGame> {
        for node in nodes {
            self.record_node(node)?;
        }
        self.finalize_game(result, nodes.len())
    }

    /// Offset the next position is written to
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn committed_len(&self) -> usize {
        self.dataset.committed_len()
    }

    pub fn open_game(&self) -> Option<GameRecord> {
        match self.game {
            GameState::Recording(record) => Some(record),
            GameState::Idle => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.failed_at.is_some()
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    fn record(
        &mut self,
        board: &Board,
        moves: &[ChessMove],
        probabilities: &[f32],
    ) -> Result<PositionCommit> {
        let offset = self.cursor;
        let ply = self.open_ply();

        let policy = encode_policy(moves, probabilities, board.side_to_move())
            .map_err(|source| ExportError::Encode {
                offset,
                ply,
                source,
            });
        let policy = self.guard(policy)?;
        let planes = encode_planes(board, self.config.normalize_planes);

        let written = self
            .dataset
            .write_position(offset, planes.view(), policy.view());
        self.guard(written)?;

        let mut record = self
            .open_game()
            .unwrap_or_else(|| GameRecord::new(offset, board.side_to_move()));
        record.plys += 1;
        self.game = GameState::Recording(record);
        self.cursor += 1;

        debug!("Recorded ply {} at offset {}", ply, offset);
        Ok(PositionCommit { offset, ply })
    }

    fn open_ply(&self) -> usize {
        self.open_game().map_or(0, |record| record.plys)
    }

    fn check_live(&self) -> Result<()> {
        match self.failed_at {
            Some(offset) => Err(ExportError::Aborted { offset }),
            None => Ok(()),
        }
    }

    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|err| self.abort(err))
    }

    fn abort(&mut self, err: ExportError) -> ExportError {
        warn!(
            "Aborting export at offset {} (committed {}): {}",
            self.cursor,
            self.dataset.committed_len(),
            err
        );
        self.failed_at = Some(self.cursor);
        err
    }
}
