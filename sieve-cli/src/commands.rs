//! Command implementations for the sieve CLI.

use std::io::{self, BufWriter, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use sieve::{
    parse_expression, translate_flavor, AttributeTable, Config, Evaluator, ParseOptions, Search,
};

/// Resolved options of one search run.
pub struct SearchArgs {
    pub roots: Vec<PathBuf>,
    pub expression: String,
    pub follow_links: bool,
    pub max_depth: Option<usize>,
    pub regex_type: String,
    pub skip: usize,
    pub limit: Option<usize>,
    pub print_ast: bool,
    pub print0: bool,
}

/// Compile the expression and print every matching path.
///
/// Output is written only after the whole search succeeded.
pub fn search(config: &Config, args: &SearchArgs) -> sieve::Result<()> {
    let flavor = translate_flavor(&args.regex_type)?;
    let registry = config.registry()?;

    let options = ParseOptions::new(flavor).with_registry(&registry);
    let expr = parse_expression(&args.expression, &AttributeTable::builtin(), options)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if args.print_ast {
        writeln!(out, "{}", expr)?;
        out.flush()?;
        return Ok(());
    }

    tracing::debug!(roots = ?args.roots, flavor = %flavor, "starting search");
    let evaluator = Evaluator::new(Some(&registry));
    let found = Search::new()
        .follow_links(args.follow_links)
        .max_depth(args.max_depth)
        .skip(args.skip)
        .limit(args.limit)
        .run(&args.roots, &expr, &evaluator)?;

    let separator: &[u8] = if args.print0 { b"\0" } else { b"\n" };
    for path in &found {
        out.write_all(path.as_os_str().as_bytes())?;
        out.write_all(separator)?;
    }
    out.flush()?;
    Ok(())
}

/// Print one line per registered function: extension, then signature.
pub fn list_extensions(config: &Config) -> sieve::Result<()> {
    let registry = config.registry()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if registry.is_empty() {
        eprintln!("No extension functions found in:");
        for dir in &config.extension_dirs {
            eprintln!("  {}", dir.display());
        }
        return Ok(());
    }

    for function in registry.functions() {
        writeln!(out, "{}\t{}", function.extension, function.signature())?;
    }
    out.flush()?;
    Ok(())
}
