//! sheetlink CLI - evaluate and inspect sheet files

mod pages;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pages::DirectoryResolver;
use sheetlink::prelude::*;
use sheetlink::{read_sheet_file, DependencyGraph, EvaluationStats, ParseCache};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheetlink")]
#[command(
    author,
    version,
    about = "Evaluate spreadsheet pages that reference each other"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a sheet file and print its display form
    Eval {
        #[command(flatten)]
        eval: EvalArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the raw form followed by the display form
    Snapshot {
        #[command(flatten)]
        eval: EvalArgs,
    },

    /// Show each formula cell's references and any local cycles
    Deps {
        /// Input sheet file
        input: PathBuf,
    },
}

#[derive(Args)]
struct EvalArgs {
    /// Input sheet file
    input: PathBuf,

    /// Directory holding other pages as `<id>.sheet` files
    #[arg(short, long)]
    pages: Option<PathBuf>,

    /// Identifier of the input page (default: the file stem)
    #[arg(long)]
    page_id: Option<String>,

    /// Cell that a bare `@[Label](id)` reference reads
    #[arg(long, conflicts_with = "reject_whole_sheet")]
    default_cell: Option<String>,

    /// Treat a bare `@[Label](id)` reference as an error
    #[arg(long)]
    reject_whole_sheet: bool,

    /// Show error tokens without their messages
    #[arg(long)]
    no_messages: bool,

    /// Maximum nesting of cross-page reads
    #[arg(long)]
    max_depth: Option<usize>,
}

impl EvalArgs {
    fn page_id(&self) -> String {
        match &self.page_id {
            Some(id) => id.clone(),
            None => self
                .input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    fn options(&self) -> Result<EvaluationOptions> {
        let mut options = EvaluationOptions::default();

        if self.reject_whole_sheet {
            options.whole_sheet = WholeSheetPolicy::Reject;
        } else if let Some(cell) = &self.default_cell {
            let addr = CellAddress::parse(cell)
                .with_context(|| format!("Invalid --default-cell '{}'", cell))?;
            options.whole_sheet = WholeSheetPolicy::DefaultCell(addr);
        }

        if let Some(depth) = self.max_depth {
            if depth == 0 {
                bail!("--max-depth must be at least 1");
            }
            options.max_depth = depth;
        }

        Ok(options)
    }

    fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            include_error_messages: !self.no_messages,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval { eval, output } => run_eval(&eval, output.as_deref()),
        Commands::Snapshot { eval } => run_snapshot(&eval),
        Commands::Deps { input } => run_deps(&input),
    }
}

fn load_sheet(input: &Path) -> Result<Sheet> {
    read_sheet_file(input).with_context(|| format!("Failed to open '{}'", input.display()))
}

/// Load and evaluate the input sheet, reporting a summary on stderr
fn evaluate_input(args: &EvalArgs) -> Result<(Sheet, EvaluationResult)> {
    let sheet = load_sheet(&args.input)?;
    let options = args.options()?;
    let page_id = args.page_id();

    let resolver: Box<dyn PageResolver> = match &args.pages {
        Some(dir) => {
            if !dir.is_dir() {
                bail!("Pages directory '{}' does not exist", dir.display());
            }
            let resolver = DirectoryResolver::new(dir);
            eprintln!("Resolving pages from '{}'", resolver.root().display());
            Box::new(resolver)
        }
        None => Box::new(NullResolver),
    };

    let result = sheet.evaluate_with_options(&page_id, resolver.as_ref(), &options);
    let stats = EvaluationStats::collect(&sheet, &result);
    eprintln!(
        "Evaluated {} cells ({} formulas, {} errors, {} circular)",
        stats.cells_evaluated, stats.formula_count, stats.errors, stats.circular_references
    );

    Ok((sheet, result))
}

fn run_eval(args: &EvalArgs, output: Option<&Path>) -> Result<()> {
    let (sheet, result) = evaluate_input(args)?;
    let display = to_display_string(&sheet, &result, &args.snapshot_options());

    if let Some(output_path) = output {
        std::fs::write(output_path, &display)
            .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
        eprintln!("Wrote {} cells to '{}'", result.len(), output_path.display());
    } else {
        io::stdout()
            .write_all(display.as_bytes())
            .context("Failed to write to stdout")?;
    }

    Ok(())
}

fn run_snapshot(args: &EvalArgs) -> Result<()> {
    let (sheet, result) = evaluate_input(args)?;
    let serialized = sheetlink::serialize(&sheet, Some(&result), &args.snapshot_options());

    let mut out = serialized.raw;
    out.push('\n');
    out.push_str(serialized.display.as_deref().unwrap_or_default());

    io::stdout()
        .write_all(out.as_bytes())
        .context("Failed to write to stdout")
}

fn run_deps(input: &Path) -> Result<()> {
    let sheet = load_sheet(input)?;
    let report = render_dependencies(&sheet);
    io::stdout()
        .write_all(report.as_bytes())
        .context("Failed to write to stdout")
}

/// One line per formula cell, then the local cycles
fn render_dependencies(sheet: &Sheet) -> String {
    let graph = DependencyGraph::build(sheet, &mut ParseCache::new());
    let mut out = String::new();

    for addr in graph.formula_cells() {
        let mut refs: Vec<String> = graph.precedents(addr).map(|a| a.to_string()).collect();
        refs.extend(
            graph
                .external_dependencies(addr)
                .iter()
                .map(|dep| dep.to_string()),
        );
        let _ = writeln!(out, "{}: {}", addr, refs.join(", "));
    }

    let cycles = graph.find_cycles();
    if !cycles.is_empty() {
        let _ = writeln!(out, "cycles:");
        for cycle in &cycles.cycles {
            let cells: Vec<String> = cycle.iter().map(|a| a.to_string()).collect();
            let _ = writeln!(out, "  {}", cells.join(", "));
        }
    }

    out
}
