use anyhow::Context as _;
use clap::Parser;
use npy2csv::{ConvertConfig, DEFAULT_INPUT, DEFAULT_OUTPUT, DEFAULT_ROWS};
use std::path::PathBuf;

/// Convert a NumPy `.npy` array into a headerless CSV table.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The `.npy` file to read.
    #[arg(default_value = DEFAULT_INPUT)]
    input: PathBuf,
    /// The CSV file to create or overwrite.
    #[arg(default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
    /// Number of table rows; the column count is derived from the data.
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    rows: usize,
}

impl From<Cli> for ConvertConfig {
    fn from(cli: Cli) -> Self {
        Self { input: cli.input, output: cli.output, rows: cli.rows }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ConvertConfig::from(Cli::parse());
    log::debug!("{config:?}");
    let summary = npy2csv::convert(&config)
        .with_context(|| format!("converting {}", config.input.display()))?;
    log::info!(
        "wrote {} {} values to {}",
        summary.value_count(),
        summary.dtype,
        config.output.display()
    );
    Ok(())
}
