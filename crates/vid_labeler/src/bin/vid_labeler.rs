//! Command-line front end for the virtual-people labeler

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vid_labeler::{
    to_node_list, Labeler, LabelerConfig, LabelerInput, LogFormat, ModelConfig,
};

#[derive(Parser)]
#[command(name = "vid-labeler")]
#[command(about = "Assign events to virtual people with a compiled model tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label JSON-lines inputs with a model
    Label {
        /// Model JSON file (`root` or `nodes` representation)
        #[arg(short, long)]
        model: PathBuf,

        /// Input file, one labeler input JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Include the final event in every output
        #[arg(long)]
        debug_trace: bool,

        /// Label on a thread pool
        #[arg(long)]
        parallel: bool,
    },

    /// Rewrite a model with embedded children as an indexed node list
    Flatten {
        /// Model JSON file using the `root` representation
        #[arg(short, long)]
        model: PathBuf,

        /// Where to write the node-list model
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the canonical hash of a model
    Hash {
        /// Model JSON file
        #[arg(short, long)]
        model: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Label {
            model,
            input,
            output,
            config,
            debug_trace,
            parallel,
        } => {
            let mut config = match &config {
                Some(path) => LabelerConfig::load_from_file(path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => LabelerConfig::default(),
            };
            config.apply_env();
            config.labeler.debug_trace |= debug_trace;
            config.labeler.parallel |= parallel;
            init_logging(&config)?;
            label(&config, &model, &input, output.as_deref())?;
        }
        Commands::Flatten { model, output } => {
            init_logging(&LabelerConfig::load_from_env())?;
            flatten(&model, &output)?;
        }
        Commands::Hash { model } => {
            init_logging(&LabelerConfig::load_from_env())?;
            let model = load_model(&model)?;
            println!("{}", model.hash_hex()?);
        }
    }
    Ok(())
}

fn init_logging(config: &LabelerConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // logs go to stderr so labeled output can be piped from stdout
    match config.logging.format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(io::stderr))
            .init(),
    }
    Ok(())
}

fn load_model(path: &Path) -> Result<ModelConfig> {
    ModelConfig::load_json(path)
        .with_context(|| format!("Failed to load model from {}", path.display()))
}

fn read_inputs(path: &Path) -> Result<Vec<LabelerInput>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input {}", path.display()))?;
    let mut inputs = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let input = serde_json::from_str(&line)
            .with_context(|| format!("Invalid labeler input on line {}", line_no + 1))?;
        inputs.push(input);
    }
    Ok(inputs)
}

fn label(
    config: &LabelerConfig,
    model_path: &Path,
    input_path: &Path,
    output_path: Option<&Path>,
) -> Result<()> {
    let model = load_model(model_path)?;
    let labeler = Labeler::from_model(&model)
        .context("Failed to build labeler")?
        .with_debug_trace(config.labeler.debug_trace);
    let inputs = read_inputs(input_path)?;
    info!("Labeling {} inputs from {}", inputs.len(), input_path.display());

    let outputs = if config.labeler.parallel {
        let threads = config.effective_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("Failed to build thread pool")?;
        info!("Labeling in parallel on {} threads", threads);
        labeler.label_par_in(&pool, &inputs)
    } else {
        labeler.label_batch(&inputs)
    };

    let mut writer: Box<dyn Write> = match output_path {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("Failed to create output {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut failed = 0usize;
    for output in &outputs {
        let line = match output {
            Ok(output) => serde_json::to_string(output)?,
            Err(e) => {
                failed += 1;
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
        };
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;

    info!("Labeled {} inputs, {} failed", outputs.len(), failed);
    if failed > 0 {
        bail!("{} of {} inputs failed to label", failed, outputs.len());
    }
    Ok(())
}

fn flatten(model_path: &Path, output_path: &Path) -> Result<()> {
    let model = load_model(model_path)?;
    let Some(root) = &model.root else {
        bail!("{} is already a node list", model_path.display());
    };
    let flattened = ModelConfig::from_nodes(to_node_list(root)?);
    flattened
        .save_json(output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!(
        "Wrote {} nodes to {}",
        flattened.nodes.len(),
        output_path.display()
    );
    Ok(())
}
