use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{debug, info, warn};

use gtars_dots::consts::{
    DEFAULT_CLUSTERING_RADIUS_BP, DEFAULT_EXPECTED_COLUMN, DEFAULT_MAX_LOCI_SEPARATION_BP,
    DEFAULT_TILE_SIZE_BP,
};
use gtars_dots::tiling::heatmap_tiles_generator_diag;
use gtars_dots::{DotCallerConfig, FdrMode, KernelSet, call_dots, recommend_kernel_params, write_dots};
use gtars_hic::ContactMatrix;
use gtars_hic::utils::{read_bins, read_expected, read_pixels};

use super::cli::DEFAULT_OUT;

/// Whole bins covered by `bp`, at least one.
fn bp_to_bins(bp: u64, binsize: u64) -> u64 {
    (bp / binsize).max(1)
}

///
/// Load a [DotCallerConfig] from a `.toml`, `.yaml`/`.yml` or `.json` file.
/// Missing keys keep their defaults.
///
fn load_config(path: &Path) -> Result<DotCallerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let config = match ext.as_str() {
        "toml" => toml::from_str(&content)?,
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "json" => serde_json::from_str(&content)?,
        _ => anyhow::bail!("Unsupported config file extension: {}", path.display()),
    };
    Ok(config)
}

/// Defaults with the genomic distances converted to bins.
fn default_config(binsize: u64) -> DotCallerConfig {
    DotCallerConfig {
        max_loci_separation: bp_to_bins(DEFAULT_MAX_LOCI_SEPARATION_BP, binsize),
        clustering_radius: DEFAULT_CLUSTERING_RADIUS_BP as f64 / binsize as f64,
        tile_size: bp_to_bins(DEFAULT_TILE_SIZE_BP, binsize),
        ..Default::default()
    }
}

///
/// Layer the explicit flags over a base configuration.
///
fn apply_flags(mut config: DotCallerConfig, matches: &ArgMatches, binsize: u64) -> Result<DotCallerConfig> {
    if let Some(weight_name) = matches.get_one::<String>("weight-name") {
        config.weight_name = weight_name.clone();
    }
    if let Some(mode) = matches.get_one::<String>("fdr-mode") {
        config.fdr_mode = match FdrMode::from_str(mode) {
            Ok(mode) => mode,
            Err(_err) => anyhow::bail!("Unknown FDR mode supplied: {}", mode),
        };
    }
    if let Some(fdr) = matches.get_one::<f64>("fdr") {
        config.fdr = *fdr;
    }
    if let Some(max_nans) = matches.get_one::<u32>("max-nans") {
        config.max_nans_tolerated = *max_nans;
    }
    if let Some(bp) = matches.get_one::<u64>("max-loci-separation") {
        config.max_loci_separation = bp_to_bins(*bp, binsize);
    }
    if let Some(bp) = matches.get_one::<u64>("dots-clustering-radius") {
        config.clustering_radius = *bp as f64 / binsize as f64;
    }
    if let Some(bp) = matches.get_one::<u64>("tile-size") {
        config.tile_size = bp_to_bins(*bp, binsize);
    }
    if let Some(threads) = matches.get_one::<usize>("threads") {
        config.n_threads = *threads;
    }
    if let Some(path) = matches.get_one::<String>("scores-dump") {
        config.scores_dump = Some(PathBuf::from(path));
    }
    if let Some(factor) = matches.get_one::<f64>("balance-factor") {
        config.balance_factor = Some(*factor);
    }
    if matches.get_flag("progress") {
        config.progress = true;
    }
    Ok(config)
}

pub fn run_dots(matches: &ArgMatches) -> Result<()> {
    // get arguments from CLI
    let bins_path = matches
        .get_one::<String>("bins")
        .expect("A path to a bin table is required.");
    let pixels_path = matches
        .get_one::<String>("pixels")
        .expect("A path to a pixel table is required.");
    let expected_path = matches
        .get_one::<String>("expected")
        .expect("A path to an expected table is required.");

    let expected_column = matches
        .get_one::<String>("expected-column")
        .map(String::as_str)
        .unwrap_or(DEFAULT_EXPECTED_COLUMN);
    let default_out = DEFAULT_OUT.to_string();
    let output = matches.get_one::<String>("output").unwrap_or(&default_out);

    // load the matrix
    let bins = read_bins(bins_path).context("Failed to read bin table")?;
    let binsize = bins
        .binsize()
        .context("Bin table is empty, cannot infer the bin size")?;
    let store = read_pixels(pixels_path, bins).context("Failed to read pixel table")?;
    let expected =
        read_expected(expected_path, expected_column).context("Failed to read expected table")?;
    info!("Loaded {} pixels at {} bp resolution", store.nnz(), binsize);
    debug!(
        "Balancing weight columns: {}",
        store.bins().weight_columns().collect::<Vec<_>>().join(", ")
    );

    // build the configuration
    let base = match matches.get_one::<String>("config") {
        Some(path) => load_config(Path::new(path))?,
        None => default_config(binsize),
    };
    let config = apply_flags(base, matches, binsize)?;

    // kernels
    let (w, p) = match (
        matches.get_one::<usize>("kernel-width"),
        matches.get_one::<usize>("kernel-peak"),
    ) {
        (Some(w), Some(p)) => (*w, *p),
        (None, None) => recommend_kernel_params(binsize),
        _ => anyhow::bail!("--kernel-width and --kernel-peak must be given together"),
    };
    let kernels = KernelSet::hiccups(w, p)?;
    info!("Using HiCCUPS kernels with w={}, p={}", w, p);

    // tiles over every chromosome with an expected profile
    let chroms: Vec<String> = store
        .bins()
        .chromnames()
        .filter(|chrom| {
            let known = expected.contains(chrom);
            if !known {
                warn!("No expected profile for {}, skipping it", chrom);
            }
            known
        })
        .map(String::from)
        .collect();
    let tiles = heatmap_tiles_generator_diag(
        &store,
        &chroms,
        kernels.max_half_width() as u64,
        config.tile_size,
        config.max_loci_separation,
    )?;

    let dots = call_dots(&store, &expected, &tiles, &kernels, &config)?;
    write_dots(output, &dots, &kernels)?;
    info!("Wrote {} dots to {}", dots.len(), output);

    Ok(())
}
