use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write, stderr, stdin, stdout};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, builder::ValueHint};
use clap_complete::{Shell, generate};
use flate2::read::MultiGzDecoder;
use libcaddy_goaccess::{Converter, Filter, LOG_FORMAT};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about, version, args_conflicts_with_subcommands = true)]
struct Args {
    /// Print the log-format to use in GoAccess and exit.
    #[arg(long)]
    print_log_format: bool,

    #[command(flatten)]
    config: Config,

    /// Caddy access logs to convert, in order. Files ending with ".gz" are decompressed. To
    /// read from stdin, use "-".
    #[arg(value_hint = ValueHint::FilePath, allow_hyphen_values = true)]
    files: Vec<String>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser, Clone)]
struct Config {
    /// Only include hosts having this prefix.
    #[arg(long, value_name = "PREFIX")]
    include_hosts: Option<String>,

    /// Ignore clients having this prefix.
    #[arg(long, value_name = "PREFIX")]
    exclude_client: Option<String>,

    /// Ignore URLs having this prefix.
    #[arg(long, value_name = "PREFIX")]
    exclude_urls: Option<String>,
}

impl From<Config> for Filter {
    fn from(config: Config) -> Self {
        Filter {
            include_hosts: config.include_hosts.unwrap_or_default(),
            exclude_client: config.exclude_client.unwrap_or_default(),
            exclude_urls: config.exclude_urls.unwrap_or_default(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completion script for specified shell
    #[command(arg_required_else_help = true)]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Handle shell completion
    if let Some(Commands::Completion { shell }) = args.command {
        let mut cmd = Args::command();
        let bin_name = env!("CARGO_PKG_NAME");
        generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    if args.print_log_format {
        println!("{LOG_FORMAT}");
        return Ok(());
    }

    init_tracing();

    let converter = Converter::new(args.config.into());
    let mut stdout = BufWriter::new(stdout().lock());
    for path in &args.files {
        let result = convert_file(&converter, path, &mut stdout);
        // Lines converted before a failure are still valid output
        let flushed = stdout.flush();
        result.with_context(|| format!("Could not process {path}"))?;
        flushed?;
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(stderr)
        .with_target(false)
        .init();
}

fn convert_file(converter: &Converter, path: &str, out: &mut impl Write) -> Result<()> {
    info!(path, "Converting");

    let reader: Box<dyn BufRead> = if path == "-" {
        Box::new(stdin().lock())
    } else {
        let file = File::open(path)?;
        if path.ends_with(".gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };
    let stats = converter.run(reader, out, stderr().lock())?;

    info!(
        path,
        total = stats.total,
        included = stats.included,
        excluded = stats.excluded,
        "Converted"
    );
    Ok(())
}
