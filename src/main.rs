use clap::{Parser, Subcommand, ValueEnum};
use derivcache::imaging::RustBackend;
use derivcache::{DerivativeKind, Engine, Key, Rendition, channel_consumer, config};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "derivcache")]
#[command(about = "Orientation-aware preview and thumbnail cache")]
#[command(long_about = "\
Orientation-aware preview and thumbnail cache

Renditions are scaled to fit a box, honoring EXIF orientation, generated on
a worker pool and kept in a persistent store so later runs reuse them.

Store layout:

  .derivative-cache/
  ├── preview/
  │   ├── .store-manifest.json     # Key → file, production order
  │   └── <sha256>.png
  └── thumbnail/
      └── ...

Run 'derivcache gen-config' to generate a documented config.toml.
Set RUST_LOG=debug to trace scheduling and coalescing.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml; relative store paths resolve against it
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render images through the cache and write the results as PNG
    Render(RenderArgs),
    /// Trim the persistent stores, oldest renditions first
    Trim {
        /// Keep at most this many renditions per store (default: store.max_entries)
        #[arg(long)]
        max_entries: Option<usize>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Source images
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Bounding box width
    #[arg(long)]
    width: u32,

    /// Bounding box height
    #[arg(long)]
    height: u32,

    /// Which profile to render with
    #[arg(long, value_enum, default_value_t = KindArg::Thumbnail)]
    kind: KindArg,

    /// Regenerate even when a cached rendition exists
    #[arg(long)]
    force: bool,

    /// Where to write the rendered PNGs
    #[arg(long, default_value = "renditions")]
    output: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Preview,
    Thumbnail,
}

impl From<KindArg> for DerivativeKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Preview => DerivativeKind::Preview,
            KindArg::Thumbnail => DerivativeKind::Thumbnail,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Render(args) => {
            let engine = open_engine(&cli.config, None)?;
            let failed = render(&engine, &args)?;
            engine.shutdown()?;
            if failed > 0 {
                return Err(format!("{failed} image(s) could not be rendered").into());
            }
        }
        Command::Trim { max_entries } => {
            let engine = open_engine(&cli.config, max_entries)?;
            let store_dir = engine.store_dir().to_path_buf();
            engine.shutdown()?;
            println!("==> Trimmed {}", store_dir.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load config from `dir` and open the engine with the pure-Rust backend.
fn open_engine(dir: &Path, max_entries: Option<usize>) -> Result<Engine, Box<dyn std::error::Error>> {
    let mut config = config::load_config(dir)?;
    let store_dir = Path::new(&config.store.directory);
    if store_dir.is_relative() {
        config.store.directory = dir.join(store_dir).to_string_lossy().into_owned();
    }
    if let Some(max) = max_entries {
        config.store.max_entries = max;
        config.validate()?;
    }
    Ok(Engine::open(&config, Arc::new(RustBackend::new()))?)
}

/// Request every file, wait for the deliveries, write them out. Returns the
/// number of files that could not be rendered.
fn render(engine: &Engine, args: &RenderArgs) -> Result<usize, Box<dyn std::error::Error>> {
    let repo = engine.repository(args.kind.into());
    std::fs::create_dir_all(&args.output)?;
    println!(
        "==> Rendering {} {}(s) into {}x{}",
        args.files.len(),
        repo.kind(),
        args.width,
        args.height
    );

    let (tx, rx) = mpsc::channel();
    let mut waiting = 0;
    let mut failed = 0;
    for file in &args.files {
        let key = Key::new(file, args.width, args.height);
        let immediate = repo.get(&key, args.force, channel_consumer(tx.clone()))?;
        if immediate.is_placeholder() {
            waiting += 1;
        } else {
            write_rendition(&args.output, &key, &immediate, "cached")?;
        }
    }
    drop(tx);

    for delivery in rx.iter().take(waiting) {
        if delivery.rendition.is_placeholder() {
            failed += 1;
            println!("    {} (failed)", delivery.key.source().display());
            continue;
        }
        let label = match delivery.rendition.origin() {
            derivcache::Origin::Restored => "restored",
            _ => "generated",
        };
        write_rendition(&args.output, &delivery.key, &delivery.rendition, label)?;
    }

    println!("Cache: {}", repo.stats());
    Ok(failed)
}

/// `<stem>-<w>x<h>-<hash8>.png`. The key hash keeps same-named sources from
/// different directories apart.
fn output_file_name(key: &Key) -> String {
    let stem = key
        .source()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rendition".to_string());
    let digest = derivcache::store::hash_key(key);
    format!("{stem}-{}x{}-{}.png", key.width(), key.height(), &digest[..8])
}

fn write_rendition(
    output: &Path,
    key: &Key,
    rendition: &Rendition,
    label: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = output.join(output_file_name(key));
    rendition.image().save(&path)?;
    println!(
        "    {} → {} ({}x{}, {label})",
        key.source().display(),
        path.display(),
        rendition.width(),
        rendition.height()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_differ_for_same_stem_in_different_dirs() {
        let a = output_file_name(&Key::new("/photos/a/x.jpg", 200, 100));
        let b = output_file_name(&Key::new("/photos/b/x.jpg", 200, 100));
        assert_ne!(a, b);
    }

    #[test]
    fn output_name_is_stable_and_readable() {
        let key = Key::new("/photos/a/x.jpg", 200, 100);
        let name = output_file_name(&key);
        assert_eq!(name, output_file_name(&key));
        assert!(name.starts_with("x-200x100-"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "x-200x100-".len() + 8 + ".png".len());
    }
}
