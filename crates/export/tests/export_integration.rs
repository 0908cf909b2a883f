use chesszero_core::{label_table, Board, Perspective, NB_LABELS};
use chesszero_export::{
    encode_planes, play_game, Dataset, DatasetLayout, ExportConfig, ExportError, Exporter,
    GameResult, RowState, SelfPlayConfig,
};
use chesszero_search::{SearchConfig, SearchResult, UniformSearch};
use ndarray::{arr1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn small_chunks() -> ExportConfig {
    ExportConfig::new().with_layout(DatasetLayout::default().with_chunk_rows(4))
}

/// Record `plys` positions of a fixed line, each with all mass on the move played
fn record_line(exporter: &mut Exporter, plys: usize) -> Vec<(Board, chess::ChessMove)> {
    let mut board = Board::new();
    let mut played = Vec::new();
    for _ in 0..plys {
        let moves = board.legal_moves();
        let mv = moves[moves.len() / 2];
        let policy = moves.iter().map(|&m| if m == mv { 1.0 } else { 0.0 }).collect();
        let result = SearchResult::new(board, moves, policy);

        exporter.record_position(&board, &result).unwrap();
        played.push((board, mv));
        board.do_move(mv).unwrap();
    }
    played
}

#[test]
fn test_game_straddling_chunks_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");

    let mut exporter = Exporter::create(&path, small_chunks()).unwrap();
    record_line(&mut exporter, 3);
    exporter.finalize_game(GameResult::Draw, 3).unwrap();

    // Offsets 3..10 cross the chunk boundaries at 4 and 8
    let played = record_line(&mut exporter, 7);
    let game = exporter.finalize_game(GameResult::WhiteWin, 7).unwrap();
    assert_eq!(game.record.range(), 3..10);
    drop(exporter);

    let dataset = Dataset::open(&path).unwrap();
    assert_eq!(dataset.committed_len(), 10);
    assert_eq!(dataset.games(), 2);
    assert_eq!(dataset.len(), 12);

    assert_eq!(
        dataset.read_values(3, 7).unwrap(),
        arr1(&[1, -1, 1, -1, 1, -1, 1])
    );

    for (ply, (board, mv)) in played.iter().enumerate() {
        let example = dataset.read_example(3 + ply).unwrap();
        assert_eq!(example.planes, encode_planes(board, false));

        let table = label_table(Perspective::for_side(board.side_to_move()));
        let label = table.index_of(*mv).unwrap();
        assert_eq!(example.policy.len(), NB_LABELS);
        assert_eq!(example.policy[label], 1.0);
        assert_eq!(example.policy.sum(), 1.0);
    }

    let planes = dataset.read_planes(0, 10).unwrap();
    assert_eq!(planes.len_of(Axis(0)), 10);
}

#[test]
fn test_reopen_resumes_at_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");

    {
        let mut exporter = Exporter::create(&path, small_chunks()).unwrap();
        record_line(&mut exporter, 2);
        exporter.finalize_game(GameResult::BlackWin, 2).unwrap();

        // Abandoned mid-game
        record_line(&mut exporter, 3);
        assert_eq!(exporter.dataset().row_state(4), RowState::PositionCommitted);
    }

    let mut exporter = Exporter::open(&path, small_chunks()).unwrap();
    assert_eq!(exporter.cursor(), 2);
    assert_eq!(exporter.dataset().row_state(3), RowState::Empty);

    record_line(&mut exporter, 1);
    let game = exporter.finalize_game(GameResult::Draw, 1).unwrap();
    assert_eq!(game.record.range(), 2..3);

    let dataset = exporter.into_dataset();
    assert_eq!(dataset.read_values(0, 3).unwrap(), arr1(&[-1, 1, 0]));
}

#[test]
fn test_truncate_to_committed_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");

    let mut exporter = Exporter::create(&path, small_chunks()).unwrap();
    record_line(&mut exporter, 5);
    exporter.finalize_game(GameResult::Draw, 5).unwrap();
    record_line(&mut exporter, 6);
    let mut dataset = exporter.into_dataset();
    assert_eq!(dataset.len(), 12);

    dataset.truncate_to_committed().unwrap();
    assert_eq!(dataset.len(), 5);
    assert!(!path.join("x").join("chunk_2.npy").exists());

    let reopened = Dataset::open(&path).unwrap();
    assert_eq!(reopened.len(), 5);
    assert_eq!(reopened.committed_len(), 5);
    assert!(reopened.read_example(4).is_ok());
    assert!(matches!(
        reopened.read_example(5),
        Err(ExportError::Uncommitted { .. })
    ));
}

#[test]
fn test_reopen_with_other_plane_encoding_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");

    {
        let mut exporter =
            Exporter::create(&path, small_chunks().with_normalize_planes(true)).unwrap();
        record_line(&mut exporter, 2);
        exporter.finalize_game(GameResult::Draw, 2).unwrap();
    }
    assert!(Dataset::open(&path).unwrap().normalize_planes());

    assert!(matches!(
        Exporter::open(&path, small_chunks()),
        Err(ExportError::EncodingMismatch {
            stored: true,
            requested: false
        })
    ));

    let mut exporter = Exporter::open(&path, small_chunks().with_normalize_planes(true)).unwrap();
    assert_eq!(exporter.cursor(), 2);
    record_line(&mut exporter, 1);
    exporter.finalize_game(GameResult::Draw, 1).unwrap();
}

#[test]
fn test_create_refuses_existing_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");
    Exporter::create(&path, ExportConfig::default()).unwrap();

    assert!(matches!(
        Exporter::create(&path, ExportConfig::default()),
        Err(ExportError::DatasetExists(_))
    ));
}

#[test]
fn test_selfplay_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");

    let mut exporter = Exporter::create(&path, small_chunks()).unwrap();
    let mut search = UniformSearch::new();
    let mut rng = StdRng::seed_from_u64(42);
    let config = SelfPlayConfig::new()
        .with_search(SearchConfig::default().with_simulations(8))
        .with_max_plies(10);

    let mut lines = Vec::new();
    let mut total = 0;
    for _ in 0..2 {
        let summary = play_game(&mut exporter, &mut search, &config, &mut rng, |result| {
            lines.push(result.to_string())
        })
        .unwrap();
        assert_eq!(summary.committed.values.len(), summary.len());
        total += summary.len();
    }
    assert_eq!(lines.len(), total);
    assert!(lines.iter().all(|l| l.starts_with("info score cp ")));

    let dataset = Dataset::open(&path).unwrap();
    assert_eq!(dataset.committed_len(), total);
    assert_eq!(dataset.games(), 2);
    dataset.check_aligned().unwrap();

    let policy = dataset.read_policy(0, total).unwrap();
    for row in policy.axis_iter(Axis(0)) {
        assert!((row.sum() - 1.0).abs() < 1e-4);
    }
}
