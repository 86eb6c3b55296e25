use clap::{Parser, Subcommand};
use std::path::PathBuf;

use indextools::pipeline::{run_partition, CancelToken, ContigSource, PartitionConfig};
use indextools::IndexToolsError;

#[derive(Parser)]
#[command(name = "indextools")]
#[command(about = "Balanced genomic partitions estimated from alignment index files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition the genome into equal-volume intervals using a BAM index
    Partition {
        /// Input BAI index
        #[arg(short = 'I', long = "index", value_name = "BAI")]
        index: PathBuf,

        /// BAM file providing contig sizes (only the header is read)
        #[arg(short = 'i', long = "bam", value_name = "BAM", conflicts_with = "contig_sizes")]
        bam: Option<PathBuf>,

        /// Contig sizes file: contig_name<TAB>length_bp per line
        #[arg(short = 'z', long = "contig-sizes", value_name = "TSV")]
        contig_sizes: Option<PathBuf>,

        /// Restrict partitions to targets from a BED file
        #[arg(short = 't', long = "targets", value_name = "BED")]
        targets: Option<PathBuf>,

        /// Restrict partitions to a region such as 'chr1:1001-2000' (repeatable)
        #[arg(short = 'r', long = "region", value_name = "REGION")]
        regions: Vec<String>,

        /// Number of partitions to generate
        #[arg(short = 'n', long = "partitions", value_name = "INT")]
        partitions: usize,

        /// Output BED file (gzip-compressed when it ends with .gz)
        #[arg(short = 'o', long = "output", value_name = "BED")]
        output: PathBuf,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here with a zero status
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .format_target(false)
        .init();

    match run(cli) {
        Ok(()) => {}
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> indextools::Result<()> {
    match cli.command {
        Commands::Partition {
            index,
            bam,
            contig_sizes,
            targets,
            regions,
            partitions,
            output,
        } => {
            if partitions < 1 {
                return Err(IndexToolsError::Usage(
                    "-n/--partitions must be at least 1".into(),
                ));
            }

            let contigs = match (bam, contig_sizes) {
                (Some(bam), None) => ContigSource::Bam(bam),
                (None, Some(tsv)) => ContigSource::Tsv(tsv),
                (None, None) => {
                    return Err(IndexToolsError::Usage(
                        "one of -i/--bam or -z/--contig-sizes is required".into(),
                    ));
                }
                (Some(_), Some(_)) => {
                    return Err(IndexToolsError::Usage(
                        "-i/--bam and -z/--contig-sizes are mutually exclusive".into(),
                    ));
                }
            };

            let config = PartitionConfig {
                index,
                contigs,
                targets,
                regions,
                partitions,
                output,
            };
            let summary = run_partition(&config, &CancelToken::new())?;

            log::info!(
                "wrote {} partitions (total volume {}) to {}",
                summary.partitions.len(),
                summary.total_volume,
                config.output.display()
            );
            Ok(())
        }
    }
}
