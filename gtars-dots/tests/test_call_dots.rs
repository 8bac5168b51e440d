//! End-to-end dot calling on a synthetic chromosome: a flat background with
//! one bright 3x3 blob whose centre is the brightest pixel.

use gtars_dots::tiling::heatmap_tiles_generator_diag;
use gtars_dots::{
    DotCallerConfig, DotCallerError, FdrMode, Kernel, KernelSet, KernelType, Tile, call_dots,
    write_dots,
};
use gtars_hic::{Bin, BinTable, ContactMatrix, ExpectedTable, InMemoryContacts, Span};

use pretty_assertions::assert_eq;
use rstest::*;

const N_BINS: u64 = 50;
const BINSIZE: u64 = 1000;
const BACKGROUND: f64 = 10.0;

fn bins() -> BinTable {
    let bins = (0..N_BINS)
        .map(|i| Bin {
            chrom: "chr1".to_string(),
            start: i * BINSIZE,
            end: (i + 1) * BINSIZE,
        })
        .collect();
    BinTable::new(bins)
        .with_weights("weight", vec![1.0; N_BINS as usize])
        .unwrap()
}

fn contacts(with_blob: bool) -> InMemoryContacts {
    let mut pixels = Vec::new();
    for i in 0..N_BINS {
        for j in i..N_BINS {
            let count = match (i, j) {
                (21, 31) if with_blob => 60.0,
                (20..=22, 30..=32) if with_blob => 40.0,
                _ => BACKGROUND,
            };
            pixels.push((i, j, count));
        }
    }
    InMemoryContacts::from_pixels(bins(), pixels).unwrap()
}

fn hot_pixel_contacts(bin1: u64, bin2: u64, count: f64) -> InMemoryContacts {
    let mut pixels = Vec::new();
    for i in 0..N_BINS {
        for j in i..N_BINS {
            let value = if (i, j) == (bin1, bin2) { count } else { BACKGROUND };
            pixels.push((i, j, value));
        }
    }
    InMemoryContacts::from_pixels(bins(), pixels).unwrap()
}

fn expected() -> ExpectedTable {
    ExpectedTable::new().with_profile("chr1", vec![BACKGROUND; N_BINS as usize])
}

fn whole_chromosome() -> Vec<Tile> {
    vec![Tile::unpadded(
        "chr1",
        Span::new(0, N_BINS),
        Span::new(0, N_BINS),
    )]
}

fn config(fdr_mode: FdrMode, n_threads: usize) -> DotCallerConfig {
    DotCallerConfig {
        fdr_mode,
        n_threads,
        clustering_radius: 2.0,
        ..Default::default()
    }
}

#[fixture]
fn kernels() -> KernelSet {
    KernelSet::hiccups(3, 1).unwrap()
}

#[rstest]
#[case(FdrMode::Global)]
#[case(FdrMode::LambdaChunk)]
fn test_single_dot_at_blob_centre(kernels: KernelSet, #[case] fdr_mode: FdrMode) {
    let store = contacts(true);
    let dots = call_dots(
        &store,
        &expected(),
        &whole_chromosome(),
        &kernels,
        &config(fdr_mode, 1),
    )
    .unwrap();

    assert_eq!(dots.len(), 1);
    let dot = &dots[0];
    assert_eq!(dot.chrom1, "chr1");
    assert_eq!((dot.start1, dot.end1), (21_000, 22_000));
    assert_eq!((dot.start2, dot.end2), (31_000, 32_000));
    assert_eq!(dot.obs_raw, 60.0);
    assert_eq!(dot.exp_raw, BACKGROUND);
    assert_eq!(dot.la_exp, vec![BACKGROUND; 4]);
    assert!(dot.qvals.iter().all(|q| *q < 0.02));
}

#[rstest]
#[case(FdrMode::Global, 0.1, 1)]
#[case(FdrMode::LambdaChunk, 0.1, 1)]
#[case(FdrMode::Global, 0.0, 0)]
#[case(FdrMode::LambdaChunk, 0.0, 0)]
fn test_donut_only(#[case] fdr_mode: FdrMode, #[case] fdr: f64, #[case] n_dots: usize) {
    let donut = KernelSet::new()
        .with_kernel("donut", Kernel::build(KernelType::Donut, 3, 1).unwrap())
        .unwrap();
    let store = contacts(true);
    let config = DotCallerConfig {
        fdr,
        ..config(fdr_mode, 1)
    };
    let dots = call_dots(&store, &expected(), &whole_chromosome(), &donut, &config).unwrap();

    assert_eq!(dots.len(), n_dots);
    if let Some(dot) = dots.first() {
        assert_eq!((dot.start1, dot.start2), (21_000, 31_000));
        assert_eq!(dot.la_exp, vec![BACKGROUND]);
    }
}

#[rstest]
fn test_global_mode_clusters_the_whole_blob(kernels: KernelSet) {
    let store = contacts(true);
    let dots = call_dots(
        &store,
        &expected(),
        &whole_chromosome(),
        &kernels,
        &config(FdrMode::Global, 1),
    )
    .unwrap();

    assert_eq!(dots[0].c_size, 9);
    assert_eq!((dots[0].cstart1, dots[0].cstart2), (21_000.0, 31_000.0));
}

#[rstest]
#[case(FdrMode::Global)]
#[case(FdrMode::LambdaChunk)]
fn test_flat_matrix_has_no_dots(kernels: KernelSet, #[case] fdr_mode: FdrMode) {
    let store = contacts(false);
    let dots = call_dots(
        &store,
        &expected(),
        &whole_chromosome(),
        &kernels,
        &config(fdr_mode, 1),
    )
    .unwrap();
    assert!(dots.is_empty());
}

#[rstest]
fn test_zero_fdr_lambda_chunk_calls_nothing(kernels: KernelSet) {
    let store = contacts(true);
    let config = DotCallerConfig {
        fdr: 0.0,
        ..config(FdrMode::LambdaChunk, 1)
    };
    let dots = call_dots(&store, &expected(), &whole_chromosome(), &kernels, &config).unwrap();
    assert!(dots.is_empty());
}

#[rstest]
#[case(FdrMode::Global)]
#[case(FdrMode::LambdaChunk)]
fn test_padded_tiles_match_a_single_tile(kernels: KernelSet, #[case] fdr_mode: FdrMode) {
    let store = contacts(true);
    let config = config(fdr_mode, 1);
    let tiles = heatmap_tiles_generator_diag(
        &store,
        &["chr1"],
        kernels.max_half_width() as u64,
        10,
        config.max_loci_separation,
    )
    .unwrap();
    assert!(tiles.len() > 1);

    let tiled = call_dots(&store, &expected(), &tiles, &kernels, &config).unwrap();
    let single = call_dots(&store, &expected(), &whole_chromosome(), &kernels, &config).unwrap();

    let summary = |dots: &[gtars_dots::Dot]| {
        dots.iter()
            .map(|d| (d.start1, d.start2, d.obs_raw, d.la_exp.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&tiled), summary(&single));
}

#[rstest]
#[case(FdrMode::Global)]
#[case(FdrMode::LambdaChunk)]
fn test_dot_in_short_last_tile(#[case] fdr_mode: FdrMode) {
    // 50 bins in tiles of 8 leave a last diagonal block of 2 bins, below the padding of 3
    let donut = KernelSet::new()
        .with_kernel("donut", Kernel::build(KernelType::Donut, 3, 1).unwrap())
        .unwrap();
    let store = hot_pixel_contacts(48, 49, 60.0);
    let config = DotCallerConfig {
        max_nans_tolerated: 100,
        ..config(fdr_mode, 1)
    };
    let tiles = heatmap_tiles_generator_diag(
        &store,
        &["chr1"],
        donut.max_half_width() as u64,
        8,
        config.max_loci_separation,
    )
    .unwrap();
    assert_eq!(tiles.iter().filter(|t| t.owns(48, 49)).count(), 1);

    let tiled = call_dots(&store, &expected(), &tiles, &donut, &config).unwrap();
    let single = call_dots(&store, &expected(), &whole_chromosome(), &donut, &config).unwrap();

    for dots in [&tiled, &single] {
        assert_eq!(dots.len(), 1);
        assert_eq!((dots[0].start1, dots[0].start2), (48_000, 49_000));
        assert_eq!(dots[0].obs_raw, 60.0);
    }
}

#[rstest]
#[case(FdrMode::Global)]
#[case(FdrMode::LambdaChunk)]
fn test_parallel_matches_serial(kernels: KernelSet, #[case] fdr_mode: FdrMode) {
    let store = contacts(true);
    let tiles = heatmap_tiles_generator_diag(&store, &["chr1"], 3, 8, 200).unwrap();

    let serial = call_dots(&store, &expected(), &tiles, &kernels, &config(fdr_mode, 1)).unwrap();
    let parallel = call_dots(&store, &expected(), &tiles, &kernels, &config(fdr_mode, 4)).unwrap();

    assert_eq!(serial, parallel);
}

#[rstest]
fn test_missing_weight_column(kernels: KernelSet) {
    let store = contacts(true);
    let config = DotCallerConfig {
        weight_name: "KR".to_string(),
        ..Default::default()
    };
    let err = call_dots(&store, &expected(), &whole_chromosome(), &kernels, &config).unwrap_err();
    assert!(matches!(err, DotCallerError::MissingWeightColumn(name) if name == "KR"));
}

#[rstest]
fn test_missing_expected_profile(kernels: KernelSet) {
    let store = contacts(true);
    let err = call_dots(
        &store,
        &ExpectedTable::new(),
        &whole_chromosome(),
        &kernels,
        &DotCallerConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, DotCallerError::MissingExpected(chrom) if chrom == "chr1"));
}

#[rstest]
fn test_scores_dump_and_dot_table(kernels: KernelSet) {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("scores.tsv.gz");
    let output = dir.path().join("dots.tsv");

    let store = contacts(true);
    let config = DotCallerConfig {
        scores_dump: Some(dump.clone()),
        ..config(FdrMode::Global, 1)
    };
    let dots = call_dots(&store, &expected(), &whole_chromosome(), &kernels, &config).unwrap();
    write_dots(&output, &dots, &kernels).unwrap();

    assert!(dump.exists());
    let table = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("chrom1\tstart1\tend1\tchrom2"));
    assert!(lines[1].starts_with("chr1\t21000\t22000\tchr1\t31000\t32000"));
    assert_eq!(store.bins().len(), N_BINS as usize);
}
