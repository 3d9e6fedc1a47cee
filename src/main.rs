// main.rs

// --- External Crate Imports ---
use anyhow::{anyhow, Context, Error, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

use tpm_profile::{
    AggregatorConfig, AnnotationLoader, AnnotationSource, ExpressionAggregator,
    ExpressionDataManager, FsQuantSource,
};

// --- Main Function ---
fn main() -> Result<(), Error> {
    let total_time_start = Instant::now();
    let cli_args = cli::CliArgs::parse();

    // Initialize logger
    let log_level = cli_args
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or_else(|_| {
            eprintln!(
                "Warning: Invalid log level '{}' provided. Defaulting to Info.",
                cli_args.log_level
            );
            log::LevelFilter::Info
        });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_micros()
        .init();

    info!("Starting tpm_profile with args: {:?}", cli_args);

    // Configure Rayon thread pool
    let num_threads = cli_args.threads.unwrap_or_else(num_cpus::get);
    info!("Using {} threads for sample parsing.", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    // --- 1. Wire the loaders ---
    let config = AggregatorConfig::default().with_organism_prefix(cli_args.organism_prefix.clone());
    let pb_style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples ({percent}%) ETA: {eta}",
        )
        .map_err(|e| anyhow!("Failed to create progress bar style: {}", e))?
        .progress_chars("=> ");
    let quant_source = FsQuantSource::new(&cli_args.quant_dir)
        .with_progress(ProgressBar::new(0).with_style(pb_style));
    info!("Quantification root: {}", quant_source.root().display());
    let manager = ExpressionDataManager::new(
        AnnotationLoader::new(AnnotationSource::Path(cli_args.annotation.clone())),
        ExpressionAggregator::new(quant_source, config),
    );
    info!("Aggregator config: {:?}", manager.expression().config());

    // --- 2. Annotation Table ---
    let annotation = manager
        .load_annotation_data()
        .with_context(|| format!("Failed to load annotation table {}", cli_args.annotation.display()))?;
    info!("Annotation table holds {} gene(s).", annotation.len());

    // --- 3. Expression Matrix ---
    let matrix = manager
        .load_quant_data()
        .with_context(|| format!("Failed to aggregate quantifications in {}", cli_args.quant_dir.display()))?;
    let query = manager.query();
    info!("Sample groups: {:?}", query.sample_groups());
    for (genotype, groups) in query.groups_by_genotype() {
        info!("  {}: {:?}", genotype, groups);
    }

    // --- 4. Write Outputs ---
    output_writer::ensure_parent_dir(&cli_args.output_prefix)?;
    info!(
        "Writing results to files with prefix '{}'...",
        cli_args.output_prefix
    );
    output_writer::write_matrix(&cli_args.output_prefix, &matrix)?;
    output_writer::write_options(&cli_args.output_prefix, &annotation)?;

    let mut failed_genes = Vec::new();
    for gene in &cli_args.genes {
        match annotation.iter().find(|row| &row.agi == gene) {
            Some(row) => info!("Profiling {}", row.label()),
            None => warn!("{} is not listed in the annotation table; profiling anyway.", gene),
        }
        let profile = match manager.expression_profile(gene) {
            Ok(profile) => profile,
            Err(e) => {
                error!("Failed to build profile for {}: {}", gene, e);
                failed_genes.push(gene.clone());
                continue;
            }
        };
        if let Some(message) = &profile.message {
            warn!("{}", message);
            continue;
        }
        output_writer::write_profile(&cli_args.output_prefix, gene, &profile)?;
    }
    if !failed_genes.is_empty() {
        return Err(anyhow!("Failed to profile gene(s): {}", failed_genes.join(", ")));
    }

    info!(
        "tpm_profile finished successfully in {:.2?}.",
        total_time_start.elapsed()
    );
    Ok(())
}

// --- Module Implementations ---

mod cli {
    use std::path::PathBuf;
    use clap::Parser;

    #[derive(Parser, Debug)]
    #[command(author, version, about = "Replicate-group TPM profiles from per-sample quant.sf files.", long_about = None, propagate_version = true)]
    pub(crate) struct CliArgs {
        #[arg(short = 'a', long = "annotation", required = true)]
        pub(crate) annotation: PathBuf,

        #[arg(short = 'q', long = "quant-dir", required = true)]
        pub(crate) quant_dir: PathBuf,

        #[arg(short = 'g', long = "gene")]
        pub(crate) genes: Vec<String>,

        #[arg(short, long = "out", required = true)]
        pub(crate) output_prefix: String,

        #[arg(long, default_value = tpm_profile::config::DEFAULT_ORGANISM_PREFIX)]
        pub(crate) organism_prefix: String,

        #[arg(short = 't', long)]
        pub(crate) threads: Option<usize>,

        #[arg(long, default_value = "Info")]
        pub(crate) log_level: String,
    }
}

mod output_writer {
    use super::{anyhow, info, BufWriter, File, PathBuf, Result, Write};
    use tpm_profile::{AnnotationTable, ExpressionMatrix, ExpressionProfile};

    fn create_output_file(prefix: &str, suffix: &str) -> Result<BufWriter<File>> {
        let filename = format!("{}.{}", prefix, suffix);
        File::create(&filename)
            .map(BufWriter::new)
            .map_err(|e| anyhow!("Failed to create output file {}: {}", filename, e))
    }

    fn fmt_value(value: f64) -> String {
        if value.is_nan() {
            "NA".to_string()
        } else {
            format!("{:.6}", value)
        }
    }

    pub(crate) fn ensure_parent_dir(output_prefix: &str) -> Result<()> {
        let output_prefix_path = PathBuf::from(output_prefix);
        if let Some(parent) = output_prefix_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow!("Failed to create output directory {}: {}", parent.display(), e)
                })?;
                info!("Created output directory: {}", parent.display());
            }
        }
        Ok(())
    }

    pub(crate) fn write_matrix(output_prefix: &str, matrix: &ExpressionMatrix) -> Result<()> {
        if matrix.is_empty() {
            info!("Expression matrix is empty, skipping matrix output.");
            return Ok(());
        }
        let mut writer = create_output_file(output_prefix, "matrix.tsv")?;
        info!("Writing expression matrix to {}.matrix.tsv", output_prefix);

        write!(writer, "Feature\tStat")?;
        for group in matrix.groups() {
            write!(writer, "\t{}", group)?;
        }
        writeln!(writer)?;

        for (row, feature) in matrix.features().iter().enumerate() {
            for stat in tpm_profile::Stat::ALL {
                write!(writer, "{}\t{}", feature.id, stat)?;
                for value in matrix.row_at(row, stat) {
                    write!(writer, "\t{}", fmt_value(*value))?;
                }
                writeln!(writer)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub(crate) fn write_options(output_prefix: &str, annotation: &AnnotationTable) -> Result<()> {
        let mut writer = create_output_file(output_prefix, "genes.tsv")?;
        info!("Writing gene selection list to {}.genes.tsv", output_prefix);

        writeln!(writer, "Label\tValue")?;
        for (label, value) in annotation.options() {
            writeln!(writer, "{}\t{}", label, value)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub(crate) fn write_profile(
        output_prefix: &str,
        gene: &str,
        profile: &ExpressionProfile,
    ) -> Result<()> {
        let suffix = format!("{}.profile.tsv", gene);
        let mut writer = create_output_file(output_prefix, &suffix)?;
        info!("Writing {} to {}.{}", profile.title, output_prefix, suffix);

        writeln!(writer, "Series\tGenotype\tGroup\tX\tMean\tStd")?;
        for series in &profile.series {
            for (i, group) in series.groups.iter().enumerate() {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{:.2}\t{}\t{}",
                    series.feature_id,
                    series.genotype,
                    group,
                    series.x[i],
                    fmt_value(series.mean[i]),
                    fmt_value(series.std[i])
                )?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}
