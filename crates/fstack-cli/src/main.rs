//! fstack CLI
//!
//! Command-line tool for cataloging, loading and stacking directories of
//! tabular data files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use fstack_core::{
    AggFunc, Catalog, Filter, JobFile, LoadOptions, ScanOptions, SheetDecider,
    SheetList, SheetSelection, StackRequest, Table, TableSet,
};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fstack")]
#[command(about = "Stack and aggregate directories of CSV, text, JSON and Excel files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScanArgs {
    /// Directories to scan; the first rebuilds the catalog, later ones append
    #[arg(short, long, required = true)]
    dir: Vec<PathBuf>,

    /// Accepted file extensions
    #[arg(short, long = "ext", required = true, value_delimiter = ',')]
    extensions: Vec<String>,

    /// Regular expression file names must match
    #[arg(short, long, default_value = "")]
    pattern: String,

    /// Tag recorded on every cataloged file
    #[arg(short, long)]
    tag: Option<String>,
}

#[derive(Args)]
struct LoadArgs {
    /// Load CSV files and sheets in batches of this many rows
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Read at most this many rows per file or sheet
    #[arg(long)]
    nrows: Option<usize>,

    /// Text encoding of CSV and delimited text files (e.g. latin1)
    #[arg(long)]
    encoding: Option<String>,

    /// Offer every sheet of each workbook, asking on the console
    #[arg(long)]
    all_sheets: bool,

    /// Load these sheets instead of asking (implies --all-sheets)
    #[arg(long = "sheet")]
    sheets: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Catalog the data files of one or more directories
    Scan {
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Load cataloged files and list the resulting tables
    Load {
        #[command(flatten)]
        scan: ScanArgs,

        #[command(flatten)]
        load: LoadArgs,

        /// Print the first rows of each table
        #[arg(short, long)]
        verbose: bool,
    },

    /// Stack loaded tables into one, with optional filters and aggregation
    Stack {
        #[command(flatten)]
        scan: ScanArgs,

        #[command(flatten)]
        load: LoadArgs,

        /// Stack request file (JSON); other stack flags override it
        #[arg(short, long)]
        request: Option<PathBuf>,

        /// Shared columns (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Columns to aggregate (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        agg: Vec<String>,

        /// Aggregate functions (comma-separated, e.g. sum,count)
        #[arg(short, long, value_delimiter = ',')]
        funcs: Vec<AggFunc>,

        /// Table positions to stack (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        indices: Vec<usize>,

        /// Filter as JSON, e.g. '{"column":"x","operator":"==","value":5}'
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Add a column with each row's source file name
        #[arg(long)]
        source_column: Option<String>,

        /// Output file; prints to stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Run a job file
    Run {
        /// Path to job file (JSON)
        #[arg(short, long)]
        job: PathBuf,

        /// Output format when the job writes its stacked table
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Create an example stack request file
    CreateRequest {
        /// Output path for the request file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create an example job file
    CreateJob {
        /// Output path for the job file
        #[arg(short, long)]
        output: PathBuf,

        /// Directories to include
        #[arg(short, long)]
        dir: Vec<PathBuf>,
    },
}

/// Asks on the console whether each sheet should be loaded
struct ConsolePrompt;

impl SheetDecider for ConsolePrompt {
    fn include(&mut self, source: &str, sheet: &str) -> bool {
        print!("Parse sheet \"{}\" of {}? Options: 1 = Yes, 0 = No:\t", sheet, source);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => answer.trim() == "1",
            Err(e) => {
                log::warn!("could not read answer: {}", e);
                false
            }
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> fstack_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { scan } => cmd_scan(&scan),
        Commands::Load {
            scan,
            load,
            verbose,
        } => cmd_load(&scan, &load, verbose),
        Commands::Stack {
            scan,
            load,
            request,
            columns,
            agg,
            funcs,
            indices,
            filters,
            source_column,
            output,
            format,
        } => {
            let mut req = match request {
                Some(path) => StackRequest::load(path)?,
                None => StackRequest::default(),
            };
            if !columns.is_empty() {
                req.columns = columns;
            }
            if !agg.is_empty() {
                req.agg_columns = agg;
            }
            if !funcs.is_empty() {
                req.agg_funcs = funcs;
            }
            if !indices.is_empty() {
                req.indices = Some(indices);
            }
            for filter in &filters {
                req.filters.push(serde_json::from_str::<Filter>(filter)?);
            }
            if source_column.is_some() {
                req.concat.source_column = source_column;
            }
            cmd_stack(&scan, &load, &req, output.as_deref(), format)
        }
        Commands::Run { job, format } => cmd_run(&job, format),
        Commands::CreateRequest { output } => cmd_create_request(&output),
        Commands::CreateJob { output, dir } => cmd_create_job(&output, &dir),
    }
}

fn build_catalog(args: &ScanArgs) -> fstack_core::Result<Catalog> {
    let mut catalog = Catalog::new();
    for (i, dir) in args.dir.iter().enumerate() {
        let mut options = ScanOptions::new(dir, args.extensions.iter().cloned())
            .pattern(args.pattern.clone());
        options.tag = args.tag.clone();

        if i == 0 {
            catalog.rebuild(&options)?;
        } else {
            catalog.append(&options)?;
        }
    }
    Ok(catalog)
}

fn load_tables(catalog: &Catalog, args: &LoadArgs) -> fstack_core::Result<TableSet> {
    let options = LoadOptions {
        chunk_size: args.chunk_size,
        nrows: args.nrows,
        encoding: args.encoding.clone(),
        sheets: if args.all_sheets || !args.sheets.is_empty() {
            SheetSelection::All
        } else {
            SheetSelection::First
        },
    };

    if args.sheets.is_empty() {
        TableSet::load_with(catalog, &options, &mut ConsolePrompt)
    } else {
        TableSet::load_with(catalog, &options, &mut SheetList::new(args.sheets.iter().cloned()))
    }
}

fn cmd_scan(args: &ScanArgs) -> fstack_core::Result<()> {
    let catalog = build_catalog(args)?;

    println!("Scanned {} director(ies):", args.dir.len());
    for dir in &args.dir {
        println!("  {}", dir.display());
    }
    println!();
    println!("Found {} files", catalog.len());
    println!();

    for (file_name, entry) in catalog.iter() {
        let tag = entry.tag.as_deref().unwrap_or("-");
        println!(
            "  {}\text={}\tdelim={}\ttag={}\t{}",
            file_name,
            entry.ext,
            entry.delimiter,
            tag,
            entry.dir.display()
        );
    }

    Ok(())
}

fn cmd_load(scan: &ScanArgs, load: &LoadArgs, verbose: bool) -> fstack_core::Result<()> {
    let catalog = build_catalog(scan)?;
    let tables = load_tables(&catalog, load)?;

    println!("Tables ({}):", tables.len());
    println!();

    for (name, meta) in tables.metadata() {
        println!(
            "  [{}] {} ({} rows, {} columns) from {}",
            meta.index,
            name,
            meta.row_count,
            meta.columns.len(),
            meta.source
        );
        if verbose {
            if let Some(table) = tables.get(meta.index) {
                print_table(table, 5);
            }
            println!();
        }
    }

    Ok(())
}

fn cmd_stack(
    scan: &ScanArgs,
    load: &LoadArgs,
    request: &StackRequest,
    output: Option<&Path>,
    format: OutputFormat,
) -> fstack_core::Result<()> {
    let catalog = build_catalog(scan)?;
    let tables = load_tables(&catalog, load)?;
    let stacked = tables.stack(request)?;

    write_output(&stacked, output, format)
}

fn cmd_run(job_path: &Path, format: OutputFormat) -> fstack_core::Result<()> {
    let job = JobFile::load(job_path)?;
    println!("Running job with {} scan(s)", job.scans.len());

    let result = job.run(Some(&mut ConsolePrompt))?;
    println!(
        "Cataloged {} files, loaded {} tables",
        result.catalog.len(),
        result.tables.len()
    );

    match result.stacked {
        Some(stacked) => write_output(&stacked, job.output.as_deref(), format),
        None => {
            for (name, meta) in result.tables.metadata() {
                println!("  [{}] {} ({} rows)", meta.index, name, meta.row_count);
            }
            Ok(())
        }
    }
}

fn cmd_create_request(output: &Path) -> fstack_core::Result<()> {
    StackRequest::template().save(output)?;
    println!("Created request file: {}", output.display());
    println!();
    println!("Edit the file to describe your stack, then run:");
    println!(
        "  fstack stack --dir <path> --ext csv --request {}",
        output.display()
    );

    Ok(())
}

fn cmd_create_job(output: &Path, dirs: &[PathBuf]) -> fstack_core::Result<()> {
    let dirs = if dirs.is_empty() {
        vec![PathBuf::from("data")]
    } else {
        dirs.to_vec()
    };

    let job = JobFile {
        scans: dirs
            .into_iter()
            .map(|d| ScanOptions::new(d, ["csv", "txt", "json", "xlsx"]))
            .collect(),
        load: LoadOptions::default(),
        include_sheets: None,
        stack: Some(StackRequest::template()),
        output: Some(PathBuf::from("stacked.csv")),
    };

    job.save(output)?;
    println!("Created job file: {}", output.display());
    println!();
    println!("Edit the file to configure your job, then run:");
    println!("  fstack run --job {}", output.display());

    Ok(())
}

fn write_output(
    table: &Table,
    output: Option<&Path>,
    format: OutputFormat,
) -> fstack_core::Result<()> {
    match output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            write_table(table, writer, format)?;
            println!("Wrote {} rows to {}", table.row_count(), path.display());
            Ok(())
        }
        None => write_table(table, io::stdout().lock(), format),
    }
}

fn write_table<W: Write>(
    table: &Table,
    writer: W,
    format: OutputFormat,
) -> fstack_core::Result<()> {
    match format {
        OutputFormat::Csv => table.write_csv(writer),
        OutputFormat::Json => table.write_json(writer),
    }
}

/// Print the header and the first rows of a table
fn print_table(table: &Table, limit: usize) {
    let header: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    for row in &table.head(limit).rows {
        let values: Vec<String> = row.cells.iter().map(|c| c.to_string_value()).collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > limit {
        println!("... ({} more rows)", table.row_count() - limit);
    }
}
