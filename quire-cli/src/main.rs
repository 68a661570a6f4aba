use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use quire::operations::MetadataMode;
use quire::storage::{FsStorage, Storage};
use quire::{
    AssemblerConfig, Document, DocumentAssembler, MergeInput, MergeOptions, PageRange, SplitMode,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "quire",
    about = "Split, merge, append and rotate PDF pages",
    version,
    author
)]
struct Cli {
    /// JSON file with assembler configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the number of pages (0 if the file is missing, unreadable or not a PDF)
    Count {
        /// Input PDF file
        input: PathBuf,
    },

    /// Write every page to its own PDF
    Extract {
        /// Input PDF file
        input: PathBuf,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Append the pages of one PDF to another
    Append {
        /// PDF to append to
        dest: PathBuf,

        /// PDF whose pages are appended
        src: PathBuf,

        /// Output file (defaults to overwriting dest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rotate pages in a PDF
    Rotate {
        /// Input PDF file
        input: PathBuf,

        /// Rotation angle (0, 90, 180, 270)
        #[arg(short, long, default_value = "90", allow_hyphen_values = true)]
        angle: i32,

        /// Pages to rotate (e.g., "all", "1,3,5", "2-6")
        #[arg(short = 'p', long, default_value = "all")]
        pages: PageRange,

        /// Output file (defaults to <stem>-rotated-<angle>.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge multiple PDFs into one
    Merge {
        /// Input PDF files, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Page range for each file, in the same order (e.g., "1-5", "all")
        #[arg(short, long, num_args = 1..)]
        pages: Option<Vec<PageRange>>,

        /// Take the information dictionary from this input (1-based)
        #[arg(long)]
        metadata_from: Option<usize>,
    },

    /// Split a PDF into multiple files
    Split {
        /// Input PDF file
        input: PathBuf,

        /// Split mode: pages, chunk:N or at:a,b,...
        #[arg(short, long, default_value = "pages")]
        mode: SplitMode,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show information about a PDF file
    Info {
        /// Input PDF file
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct DocumentInfo {
    file: String,
    version: String,
    pages: usize,
    recovered: bool,
    objects: usize,
    title: Option<String>,
    producer: Option<String>,
    page_details: Vec<PageInfo>,
}

#[derive(Debug, Serialize)]
struct PageInfo {
    number: usize,
    width: f64,
    height: f64,
    rotate: i32,
    orientation: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AssemblerConfig::default(),
    };
    let assembler = DocumentAssembler::new(config);

    match cli.command {
        Commands::Count { input } => {
            let count = match fs::read(&input) {
                Ok(data) => assembler.count_pages(&data),
                Err(e) => {
                    tracing::warn!("Cannot read {}: {}", input.display(), e);
                    0
                }
            };
            println!("{count}");
        }

        Commands::Extract { input, output } => {
            let doc = open(&assembler, &input)?;
            let pages = assembler
                .extract_pages(&doc)
                .with_context(|| format!("Failed to extract pages of {}", input.display()))?;

            let storage = output_storage(output.as_deref(), &input)?;
            store_all(&assembler, &storage, &file_stem(&input), "page", &pages)?;
            eprintln!("✓ Extracted {} pages", pages.len());
        }

        Commands::Append { dest, src, output } => {
            let mut target = open(&assembler, &dest)?;
            let source = open(&assembler, &src)?;
            assembler.append(&mut target, &source).with_context(|| {
                format!("Failed to append {} to {}", src.display(), dest.display())
            })?;

            let output = output.unwrap_or(dest);
            save(&assembler, &target, &output)?;
            println!(
                "✓ {} now has {} pages",
                output.display(),
                target.page_count()
            );
        }

        Commands::Rotate {
            input,
            angle,
            pages,
            output,
        } => {
            let mut doc = open(&assembler, &input)?;
            let rotated = assembler
                .rotate_page_range(&mut doc, &pages, angle)
                .with_context(|| format!("Failed to rotate {}", input.display()))?;

            let output = output.unwrap_or_else(|| {
                input.with_file_name(format!("{}-rotated-{angle}.pdf", file_stem(&input)))
            });
            save(&assembler, &doc, &output)?;
            println!(
                "✓ Rotated {rotated} pages by {angle} degrees into {}",
                output.display()
            );
        }

        Commands::Merge {
            files,
            output,
            pages,
            metadata_from,
        } => {
            let documents = files
                .iter()
                .map(|file| open(&assembler, file))
                .collect::<Result<Vec<_>>>()?;

            let ranges = match pages {
                Some(ranges) if ranges.len() != documents.len() => bail!(
                    "Got {} page ranges for {} files",
                    ranges.len(),
                    documents.len()
                ),
                Some(ranges) => ranges,
                None => vec![PageRange::All; documents.len()],
            };
            let inputs: Vec<_> = documents
                .iter()
                .zip(ranges)
                .map(|(doc, range)| MergeInput::with_pages(doc, range))
                .collect();

            let merged = match metadata_from {
                None => assembler.merge_inputs(&inputs),
                Some(0) => bail!("--metadata-from is 1-based"),
                Some(index) => quire::merge_documents(
                    &inputs,
                    &MergeOptions {
                        metadata_mode: MetadataMode::FromDocument(index - 1),
                    },
                ),
            }
            .context("Failed to merge documents")?;

            save(&assembler, &merged, &output)?;
            println!(
                "✓ Merged {} files ({} pages) into {}",
                files.len(),
                merged.page_count(),
                output.display()
            );
        }

        Commands::Split {
            input,
            mode,
            output,
        } => {
            let doc = open(&assembler, &input)?;
            let parts = assembler
                .split(&doc, &mode)
                .with_context(|| format!("Failed to split {}", input.display()))?;

            let storage = output_storage(output.as_deref(), &input)?;
            store_all(&assembler, &storage, &file_stem(&input), "part", &parts)?;
            eprintln!("✓ Split into {} files", parts.len());
        }

        Commands::Info { input, json } => {
            let doc = open(&assembler, &input)?;
            let info = describe(&input, &doc)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&info);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    // RUST_LOG wins over the flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: &Path) -> Result<AssemblerConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn open(assembler: &DocumentAssembler, path: &Path) -> Result<Document> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    assembler
        .parse(&data)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn save(assembler: &DocumentAssembler, doc: &Document, path: &Path) -> Result<()> {
    let bytes = assembler.serialize(doc)?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

fn output_storage(output: Option<&Path>, input: &Path) -> Result<FsStorage> {
    let root = match output {
        Some(dir) => dir.to_path_buf(),
        None => match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    FsStorage::new(&root).with_context(|| format!("Cannot use {} for output", root.display()))
}

/// Store `docs` as `<stem>-<label>-<n>.pdf` and print their paths.
/// Nothing is left behind if any write fails.
fn store_all(
    assembler: &DocumentAssembler,
    storage: &FsStorage,
    stem: &str,
    label: &str,
    docs: &[Document],
) -> Result<()> {
    let serialized = docs
        .iter()
        .map(|doc| assembler.serialize(doc))
        .collect::<quire::Result<Vec<_>>>()?;

    let mut keys = Vec::with_capacity(serialized.len());
    for (index, bytes) in serialized.iter().enumerate() {
        let name = format!("{stem}-{label}-{}.pdf", index + 1);
        match storage.write(&name, bytes) {
            Ok(stored) => keys.push(stored.key),
            Err(e) => {
                for key in &keys {
                    if let Err(cleanup) = storage.remove(key) {
                        tracing::warn!("Cannot remove partial output {key}: {cleanup}");
                    }
                }
                return Err(e).with_context(|| format!("Failed to write {name}"));
            }
        }
    }

    for key in &keys {
        println!("{}", storage.root().join(key).display());
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn describe(path: &Path, doc: &Document) -> Result<DocumentInfo> {
    let info_string = |key: &str| {
        doc.info()
            .and_then(|info| info.get(key))
            .and_then(|value| value.as_string())
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    };

    let pages = doc.pages().context("Failed to read the page tree")?;
    Ok(DocumentInfo {
        file: path.display().to_string(),
        version: doc.version().to_string(),
        pages: pages.len(),
        recovered: doc.was_recovered(),
        objects: doc.objects().len(),
        title: info_string("Title"),
        producer: info_string("Producer"),
        page_details: pages
            .iter()
            .enumerate()
            .map(|(index, page)| PageInfo {
                number: index + 1,
                width: page.width(),
                height: page.height(),
                rotate: page.rotate,
                orientation: page.orientation.to_string(),
            })
            .collect(),
    })
}

fn print_info(info: &DocumentInfo) {
    println!("PDF Information for: {}", info.file);
    println!("==========================================");
    println!("PDF Version: {}", info.version);
    println!("Pages: {}", info.pages);
    println!("Objects: {}", info.objects);
    if let Some(title) = &info.title {
        println!("Title: {title}");
    }
    if let Some(producer) = &info.producer {
        println!("Producer: {producer}");
    }
    if info.recovered {
        println!("Note: cross-reference table was rebuilt");
    }

    const PAGES_TO_SHOW: usize = 10;
    if !info.page_details.is_empty() {
        println!("\nPage Information:");
        println!("-----------------");
        for page in info.page_details.iter().take(PAGES_TO_SHOW) {
            println!(
                "Page {}: {:.0}x{:.0} pts, {} degrees, {}",
                page.number, page.width, page.height, page.rotate, page.orientation
            );
        }
        if info.page_details.len() > PAGES_TO_SHOW {
            println!(
                "... and {} more pages",
                info.page_details.len() - PAGES_TO_SHOW
            );
        }
    }
}
