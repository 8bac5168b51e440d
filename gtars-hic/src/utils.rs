use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::debug;

use crate::errors::{HicError, Result};
use crate::models::{Bin, BinTable, ExpectedTable};
use crate::store::InMemoryContacts;

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = File::open(path)
        .map_err(|e| HicError::FileReadError(format!("{}: {}", path.display(), e)))?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::new(file))
}

/// Tab-separated table with a header line; yields `(line_number, fields)`.
struct HeaderedTable {
    file: String,
    columns: HashMap<String, usize>,
    lines: std::io::Lines<BufReader<Box<dyn Read>>>,
    line_number: usize,
}

impl HeaderedTable {
    fn open(path: &Path) -> Result<Self> {
        let file = path.display().to_string();
        let mut lines = get_dynamic_reader(path)?.lines();

        let header = lines
            .next()
            .ok_or_else(|| HicError::EmptyFile(file.clone()))??;

        let columns = header
            .trim_start_matches('#')
            .split('\t')
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        Ok(HeaderedTable {
            file,
            columns,
            lines,
            line_number: 1,
        })
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| HicError::MissingColumn {
                file: self.file.clone(),
                column: name.to_string(),
            })
    }

    fn parse_error(&self, reason: String) -> HicError {
        HicError::ParseError {
            file: self.file.clone(),
            line: self.line_number,
            reason,
        }
    }

    fn next_record(&mut self) -> Option<Result<Vec<String>>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            return Some(Ok(line.split('\t').map(|s| s.to_string()).collect()));
        }
    }

    fn field<T: std::str::FromStr>(&self, fields: &[String], idx: usize, name: &str) -> Result<T> {
        let raw = fields
            .get(idx)
            .ok_or_else(|| self.parse_error(format!("missing field '{}'", name)))?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| self.parse_error(format!("can't parse '{}' as {}", raw, name)))
    }
}

/// Parse a weight value; empty fields and `nan`/`NA` mean "bad bin".
fn parse_weight(raw: &str) -> Option<f64> {
    match raw.trim() {
        "" | "NA" | "nan" | "NaN" => Some(f64::NAN),
        other => other.parse::<f64>().ok(),
    }
}

///
/// Read a bin table. The header must contain `chrom`, `start` and `end`;
/// every other column is loaded as a balancing-weight column.
///
pub fn read_bins<T: AsRef<Path>>(path: T) -> Result<BinTable> {
    let mut table = HeaderedTable::open(path.as_ref())?;
    let chrom_idx = table.column("chrom")?;
    let start_idx = table.column("start")?;
    let end_idx = table.column("end")?;

    let mut weight_columns: Vec<(String, usize)> = table
        .columns
        .iter()
        .filter(|(_, idx)| ![chrom_idx, start_idx, end_idx].contains(idx))
        .map(|(name, idx)| (name.clone(), *idx))
        .collect();
    weight_columns.sort_by_key(|(_, idx)| *idx);

    let mut bins: Vec<Bin> = Vec::new();
    let mut weights: Vec<Vec<f64>> = vec![Vec::new(); weight_columns.len()];

    while let Some(fields) = table.next_record() {
        let fields = fields?;
        bins.push(Bin {
            chrom: table.field::<String>(&fields, chrom_idx, "chrom")?,
            start: table.field(&fields, start_idx, "start")?,
            end: table.field(&fields, end_idx, "end")?,
        });
        for (values, (name, idx)) in weights.iter_mut().zip(weight_columns.iter()) {
            let raw = fields.get(*idx).map(|s| s.as_str()).unwrap_or("");
            let value = parse_weight(raw)
                .ok_or_else(|| table.parse_error(format!("can't parse '{}' as {}", raw, name)))?;
            values.push(value);
        }
    }

    if bins.is_empty() {
        return Err(HicError::EmptyFile(table.file));
    }

    let mut bin_table = BinTable::new(bins);
    for ((name, _), values) in weight_columns.into_iter().zip(weights) {
        bin_table = bin_table.with_weights(&name, values)?;
    }

    debug!(
        "Loaded {} bins on {} chromosomes",
        bin_table.len(),
        bin_table.chromnames().count()
    );

    Ok(bin_table)
}

///
/// Read raw pixels (`bin1_id`, `bin2_id`, `count`) into an in-memory store
/// over the given bins.
///
pub fn read_pixels<T: AsRef<Path>>(path: T, bins: BinTable) -> Result<InMemoryContacts> {
    let mut table = HeaderedTable::open(path.as_ref())?;
    let bin1_idx = table.column("bin1_id")?;
    let bin2_idx = table.column("bin2_id")?;
    let count_idx = table.column("count")?;

    let mut pixels: Vec<(u64, u64, f64)> = Vec::new();
    while let Some(fields) = table.next_record() {
        let fields = fields?;
        pixels.push((
            table.field(&fields, bin1_idx, "bin1_id")?,
            table.field(&fields, bin2_idx, "bin2_id")?,
            table.field(&fields, count_idx, "count")?,
        ));
    }

    debug!("Loaded {} pixels from {}", pixels.len(), table.file);

    InMemoryContacts::from_pixels(bins, pixels)
}

///
/// Read a cis expected table. The header must contain `chrom`, `diag` and
/// the requested value column (e.g. `balanced.avg`).
///
pub fn read_expected<T: AsRef<Path>>(path: T, value_column: &str) -> Result<ExpectedTable> {
    let mut table = HeaderedTable::open(path.as_ref())?;
    let chrom_idx = table.column("chrom")?;
    let diag_idx = table.column("diag")?;
    let value_idx = table.column(value_column)?;

    let mut profiles: HashMap<String, Vec<f64>> = HashMap::new();
    while let Some(fields) = table.next_record() {
        let fields = fields?;
        let chrom: String = table.field(&fields, chrom_idx, "chrom")?;
        let diag: usize = table.field(&fields, diag_idx, "diag")?;
        let raw = fields.get(value_idx).map(|s| s.as_str()).unwrap_or("");
        let value = parse_weight(raw).ok_or_else(|| {
            table.parse_error(format!("can't parse '{}' as {}", raw, value_column))
        })?;

        let profile = profiles.entry(chrom).or_default();
        if profile.len() <= diag {
            profile.resize(diag + 1, f64::NAN);
        }
        profile[diag] = value;
    }

    if profiles.is_empty() {
        return Err(HicError::EmptyFile(table.file));
    }

    let mut expected = ExpectedTable::new();
    for (chrom, profile) in profiles {
        expected.insert(&chrom, profile);
    }

    Ok(expected)
}
