//! sieve: find files matching a boolean expression over their metadata.

use std::io::BufRead;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sieve::Config;

mod commands;

#[derive(Parser)]
#[command(name = "sieve")]
#[command(about = "Find files matching a boolean expression over their metadata")]
#[command(version)]
struct Cli {
    /// Directory to search (default: .)
    dir: Option<PathBuf>,

    /// Filter expression, e.g. 'size > 1kb and name = "*.txt"' (read from stdin when absent)
    #[arg(conflicts_with = "expr_flag")]
    expr: Option<String>,

    /// Additional directory to search (repeatable)
    #[arg(short = 'd', long = "dir")]
    dirs: Vec<PathBuf>,

    /// Filter expression (alternative to the positional argument)
    #[arg(short = 'e', long = "expr")]
    expr_flag: Option<String>,

    /// Follow symbolic links
    #[arg(short = 'L', long = "follow")]
    follow: bool,

    /// Descend at most N directory levels below each start directory
    #[arg(long = "max-depth")]
    max_depth: Option<usize>,

    /// Regex syntax for regex/iregex (emacs, posix-extended, grep, sed, ...)
    #[arg(long = "regex-type")]
    regex_type: Option<String>,

    /// Skip the first N matches
    #[arg(long = "skip", default_value = "0")]
    skip: usize,

    /// Print at most N matches
    #[arg(long = "limit")]
    limit: Option<usize>,

    /// Print the parsed expression instead of searching
    #[arg(long = "print")]
    print: bool,

    /// List available extension functions and exit
    #[arg(long = "list-extensions")]
    list_extensions: bool,

    /// Separate matches with NUL instead of newline
    #[arg(short = '0', long = "print0")]
    print0: bool,
}

/// Install the stderr log subscriber.
///
/// Uses `SIEVE_LOG` if set, otherwise the config's `log_filter`, otherwise `warn`.
fn init_tracing(config: &Config) -> sieve::Result<()> {
    let filter = match std::env::var("SIEVE_LOG") {
        Ok(directive) => EnvFilter::try_new(&directive),
        Err(_) => EnvFilter::try_new(config.log_filter.as_deref().unwrap_or("warn")),
    }
    .map_err(|e| sieve::Error::Config(format!("invalid log filter: {}", e)))?;

    // a subscriber may already be installed by an embedding process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

/// Read the expression from the first line of stdin.
fn read_expression() -> sieve::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

fn run(cli: Cli) -> sieve::Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    if cli.list_extensions {
        return commands::list_extensions(&config);
    }

    let mut roots: Vec<PathBuf> = cli.dir.into_iter().collect();
    roots.extend(cli.dirs);
    if roots.is_empty() {
        roots.push(PathBuf::from("."));
    }

    let expression = match cli.expr_flag.or(cli.expr) {
        Some(expression) => expression,
        None => read_expression()?,
    };

    let args = commands::SearchArgs {
        roots,
        expression,
        follow_links: cli.follow || config.follow_links,
        max_depth: cli.max_depth.or(config.max_depth),
        regex_type: cli.regex_type.unwrap_or_else(|| config.regex_type.clone()),
        skip: cli.skip,
        limit: cli.limit,
        print_ast: cli.print,
        print0: cli.print0,
    };
    commands::search(&config, &args)
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version exit 0; usage errors exit 1 like every other failure
        Err(e) if e.use_stderr() => {
            eprint!("{}", e);
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    if let Err(e) = run(cli) {
        eprintln!("Error: {}: {}", e.kind(), e);
        std::process::exit(1);
    }
}
