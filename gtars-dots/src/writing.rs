use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::errors::Result;
use crate::filter::Dot;
use crate::kernels::KernelSet;
use crate::scoring::ScoredPixel;

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
    fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = BufWriter::new(File::create(path)?);
        let is_gzipped = path.extension().is_some_and(|ext| ext == "gz");
        Ok(if is_gzipped {
            Sink::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Sink::Plain(file)
        })
    }

    fn finish(self) -> Result<()> {
        match self {
            Sink::Plain(mut w) => w.flush()?,
            Sink::Gzip(w) => {
                w.finish()?.flush()?;
            }
        }
        Ok(())
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "NaN".to_string())
}

///
/// Append-only tab-separated dump of scored pixels. A `.gz` path is
/// compressed.
///
pub struct ScoredPixelWriter {
    sink: Sink,
    n_kernels: usize,
    with_qvals: bool,
}

impl ScoredPixelWriter {
    ///
    /// Create the dump and write its header:
    /// `bin1_id bin2_id la_exp.<k>.value la_exp.<k>.nnans la_exp.<k>.pval
    /// [la_exp.<k>.qval] ... exp.raw obs.raw`.
    ///
    pub fn create<P: AsRef<Path>>(path: P, kernels: &KernelSet, with_qvals: bool) -> Result<Self> {
        let mut sink = Sink::create(path.as_ref())?;

        let mut header = vec!["bin1_id".to_string(), "bin2_id".to_string()];
        for name in kernels.names() {
            header.push(format!("la_exp.{}.value", name));
            header.push(format!("la_exp.{}.nnans", name));
            header.push(format!("la_exp.{}.pval", name));
            if with_qvals {
                header.push(format!("la_exp.{}.qval", name));
            }
        }
        header.push("exp.raw".to_string());
        header.push("obs.raw".to_string());
        writeln!(sink, "{}", header.join("\t"))?;

        Ok(ScoredPixelWriter {
            sink,
            n_kernels: kernels.len(),
            with_qvals,
        })
    }

    pub fn write_pixels(&mut self, pixels: &[ScoredPixel]) -> Result<()> {
        for px in pixels {
            let mut fields = vec![px.bin1_id.to_string(), px.bin2_id.to_string()];
            for score in px.kernels.iter().take(self.n_kernels) {
                fields.push(score.value.to_string());
                fields.push(score.nnans.to_string());
                fields.push(fmt_opt(score.pval));
                if self.with_qvals {
                    fields.push(fmt_opt(score.qval));
                }
            }
            fields.push(px.exp_raw.to_string());
            fields.push(px.obs_raw.to_string());
            writeln!(self.sink, "{}", fields.join("\t"))?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        self.sink.finish()
    }
}

///
/// Write the final dot table.
///
pub fn write_dots<P: AsRef<Path>>(path: P, dots: &[Dot], kernels: &KernelSet) -> Result<()> {
    let mut sink = Sink::create(path.as_ref())?;

    let mut header: Vec<String> = [
        "chrom1", "start1", "end1", "chrom2", "start2", "end2", "cstart1", "cstart2", "c_label",
        "c_size", "obs.raw", "exp.raw",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(kernels.names().map(|k| format!("la_exp.{}.value", k)));
    let with_kerobs = dots.iter().any(|d| d.lowleft_kerobs.is_some());
    if with_kerobs {
        header.push("factor_balance.lowleft.KerObs".to_string());
    }
    header.extend(kernels.names().map(|k| format!("la_exp.{}.qval", k)));
    writeln!(sink, "{}", header.join("\t"))?;

    for dot in dots {
        let mut fields = vec![
            dot.chrom1.clone(),
            dot.start1.to_string(),
            dot.end1.to_string(),
            dot.chrom2.clone(),
            dot.start2.to_string(),
            dot.end2.to_string(),
            dot.cstart1.to_string(),
            dot.cstart2.to_string(),
            dot.c_label.to_string(),
            dot.c_size.to_string(),
            dot.obs_raw.to_string(),
            dot.exp_raw.to_string(),
        ];
        fields.extend(dot.la_exp.iter().map(|v| v.to_string()));
        if with_kerobs {
            fields.push(fmt_opt(dot.lowleft_kerobs));
        }
        fields.extend(dot.qvals.iter().map(|q| q.to_string()));
        writeln!(sink, "{}", fields.join("\t"))?;
    }

    sink.finish()
}
