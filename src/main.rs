use clap::{Args, Parser, Subcommand};
use comicinfo::archive::{Book, PackOptions};
use comicinfo::codec::CodecId;
use comicinfo::{ComicInfo, ContainerFormat, LoadingMethod, MetadataResolver, ResolverOptions, Source};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "comicinfo", about = "Resolve and store ComicInfo metadata for comic books")]
struct Cli {
    #[command(flatten)]
    resolver: ResolverArgs,
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ResolverArgs {
    /// Ignore metadata attached through extended attributes
    #[arg(long, global = true)]
    no_attached: bool,
    /// Ignore sidecar files
    #[arg(long, global = true)]
    no_sidecar: bool,
    /// Fail if a book stays locked longer than this
    #[arg(long, global = true)]
    lock_timeout_ms: Option<u64>,
    /// Container format: cbx or folder (default: detect from path)
    #[arg(long, global = true)]
    format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved metadata as JSON
    Show {
        input: PathBuf,
        /// Always read the container; its record overrides fallbacks
        #[arg(long)]
        full: bool,
    },
    /// Store metadata from a JSON file
    Store {
        input: PathBuf,
        #[arg(long)]
        from: PathBuf,
    },
    /// List displayable pages
    Pages {
        input: PathBuf,
    },
    /// Pack images into a .cbx book
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// Embed this JSON record as ComicInfo.json
        #[arg(long)]
        info: Option<PathBuf>,
        /// Page codec: none (default) or zstd
        #[arg(short, long, default_value = "none")]
        codec: String,
        #[arg(short, long, default_value = "3")]
        level: i32,
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Show format capabilities and container details
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let resolver = MetadataResolver::new(ResolverOptions {
        disable_attached: cli.resolver.no_attached,
        disable_sidecar:  cli.resolver.no_sidecar,
        lock_timeout:     cli.resolver.lock_timeout_ms.map(Duration::from_millis),
    });
    let source_for = |path: PathBuf| make_source(path, cli.resolver.format.as_deref());

    match cli.command {

        // ── Show ─────────────────────────────────────────────────────────────
        Commands::Show { input, full } => {
            let method = if full { LoadingMethod::Full } else { LoadingMethod::Fast };
            match resolver.load_info(&source_for(input)?, method)? {
                Some(info) => println!("{}", info.to_pretty_string()?),
                None       => println!("No metadata found."),
            }
        }

        // ── Store ────────────────────────────────────────────────────────────
        Commands::Store { input, from } => {
            let info = ComicInfo::from_bytes(&std::fs::read(&from)?)?;
            let source = source_for(input)?;
            if resolver.store_info(&source, &info)? {
                println!("Stored metadata for {source}");
            } else {
                eprintln!("Could not store metadata for {source}");
                std::process::exit(1);
            }
        }

        // ── Pages ────────────────────────────────────────────────────────────
        Commands::Pages { input } => {
            for name in resolver.images(&source_for(input)?)? {
                println!("{name}");
            }
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, info, codec, level, input } => {
            let opts = PackOptions { page_codec: parse_codec(&codec), level };
            let mut book = Book::create(&output, opts)?;
            for path in &input {
                let name = path
                    .file_name()
                    .ok_or_else(|| format!("not a file: {}", path.display()))?
                    .to_string_lossy();
                if !comicinfo::is_supported_image(&name) {
                    eprintln!("  skipped {}", path.display());
                    continue;
                }
                book.add_page(&name, &std::fs::read(path)?)?;
                println!("  packed  {}", path.display());
            }
            if let Some(info) = info {
                book.set_info(&ComicInfo::from_bytes(&std::fs::read(info)?)?)?;
            }
            book.finalize()?;
            println!("Created: {}", output.display());
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let source = source_for(input)?;
            println!("── Book ─────────────────────────────────────────────────");
            println!("  Path           {}", source.path().display());
            println!("  Format         {}", source.format());
            println!("  Update enabled {}", resolver.update_enabled(&source));
            if source.format() == ContainerFormat::Cbx {
                let mut book = Book::open(source.path())?;
                let members = book.members();
                println!("  UUID           {}", book.uuid());
                println!("  Created        {}", format_timestamp(book.created()));
                println!("  Embedded info  {}", book.info()?.is_some());
                println!("  Members ({}):", members.len());
                for m in members {
                    println!("    {:<32} {:>10} {:>10}  {}",
                        m.name, m.original_size, m.compressed_size, hex::encode(&m.content_hash[..6]));
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn make_source(path: PathBuf, format: Option<&str>) -> Result<Source, String> {
    match format {
        None => Ok(Source::detect(path)),
        Some(name) => ContainerFormat::from_name(name)
            .map(|f| Source::new(path, f))
            .ok_or_else(|| format!("unknown container format '{name}'")),
    }
}

fn parse_codec(s: &str) -> CodecId {
    CodecId::from_name(s).unwrap_or_else(|| {
        eprintln!("Unknown codec '{}', defaulting to none", s);
        CodecId::None
    })
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
