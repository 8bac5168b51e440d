use clap::{Arg, ArgAction, Command, arg, value_parser};

pub const DOTS_CMD: &str = "dots";
pub const DEFAULT_OUT: &str = "dots.tsv";

pub fn create_dots_cli() -> Command {
    Command::new(DOTS_CMD)
        .author("Databio")
        .about("Call dots (enriched pixels) in a Hi-C contact matrix using local-background kernels.")
        .arg(
            Arg::new("bins")
                .long("bins")
                .required(true)
                .help("Bin table (chrom, start, end, weight columns...), optionally gzipped"),
        )
        .arg(
            Arg::new("pixels")
                .long("pixels")
                .required(true)
                .help("Raw pixel table (bin1_id, bin2_id, count), optionally gzipped"),
        )
        .arg(
            Arg::new("expected")
                .long("expected")
                .required(true)
                .help("Expected profile per chromosome and diagonal"),
        )
        .arg(
            Arg::new("expected-column")
                .long("expected-column")
                .help("Value column of the expected table [default: balanced.avg]"),
        )
        .arg(
            Arg::new("weight-name")
                .long("weight-name")
                .help("Balancing weight column of the bin table [default: weight]"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file (.toml, .yaml or .json); flags take precedence"),
        )
        .arg(arg!(--"fdr-mode" <MODE> "Multiple-testing procedure: lambda-chunk or global"))
        .arg(arg!(--fdr <FDR> "False discovery rate").value_parser(value_parser!(f64)))
        .arg(
            arg!(--"max-nans" <N> "Pixels need fewer missing neighbours than this in every kernel")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(--"max-loci-separation" <BP> "Largest genomic separation scanned, in bp")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"dots-clustering-radius" <BP> "Radius used to cluster significant pixels, in bp")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"kernel-width" <W> "Half-width of the HiCCUPS kernels, in bins")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--"kernel-peak" <P> "Half-width of the masked kernel centre, in bins")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--"tile-size" <BP> "Side of the square tiles, in bp")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--threads <N> "Number of worker threads")
                .short('p')
                .value_parser(value_parser!(usize)),
        )
        .arg(arg!(--"scores-dump" <PATH> "Dump every scored pixel to this file (Global mode only)"))
        .arg(
            arg!(--"balance-factor" <F> "Report factor_balance.lowleft.KerObs scaled by this factor")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--progress "Show progress bars")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Output dot table [default: dots.tsv]"),
        )
}
