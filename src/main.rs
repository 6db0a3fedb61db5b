//! CLI entry point for `mhtml`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mhtml::config::Config;
use mhtml::export::{extract, merge};
use mhtml::filter::ContentTypeFilter;
use mhtml::model::archive::Archive;
use mhtml::model::resource::ResourceView;

#[derive(Parser)]
#[command(name = "mhtml", version, about = "Inspect, extract and merge MHTML web archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every resource into a directory
    Extract {
        /// MHT/MHTM/MHTML file
        file: PathBuf,
        /// Output directory for extracted content
        dir: PathBuf,
        /// Decode base64 and quoted-printable bodies
        #[arg(long)]
        decode: bool,
    },
    /// Extract the main page
    ExtractMain {
        /// MHT/MHTM/MHTML file
        file: PathBuf,
        /// Output file (default: FILE with an .html extension)
        output: Option<PathBuf>,
    },
    /// Merge resources of several archives into the first one
    Merge {
        /// Output archive
        output: PathBuf,
        /// Input archives; the first one is the main file
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
    },
    /// Show the archive header and the headers of its resources
    Headers {
        /// MHT/MHTM/MHTML file
        file: PathBuf,
        /// Parse only the main header
        #[arg(short = 'm', long)]
        only_main_header: bool,
        /// Print a preview of each resource's content
        #[arg(short = 'p', long)]
        print_preview: bool,
        /// Only show resources whose content type matches this glob
        #[arg(short = 'f', long, value_name = "PATTERN")]
        filter_resources: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List resources, one per line
    Info {
        /// MHT/MHTM/MHTML file
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = mhtml::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Extract { file, dir, decode } => cmd_extract(&file, &dir, decode, &config),
        Commands::ExtractMain { file, output } => cmd_extract_main(&file, output.as_deref(), &config),
        Commands::Merge { output, inputs } => cmd_merge(&output, &inputs),
        Commands::Headers {
            file,
            only_main_header,
            print_preview,
            filter_resources,
            json,
        } => {
            let pattern = filter_resources.unwrap_or_else(|| config.display.filter.clone());
            let preview = print_preview.then_some(config.display.preview_length);
            cmd_headers(&file, only_main_header, preview, &pattern, json)
        }
        Commands::Info { file, json } => cmd_info(&file, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_file = mhtml::config::log_file_path(config);
    let target = log_file.parent().zip(log_file.file_name());
    if let Some((log_dir, log_name)) = target.filter(|(dir, _)| std::fs::create_dir_all(dir).is_ok()) {
        let file_appender = tracing_appender::rolling::never(log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mhtml", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn open_archive(path: &Path, only_header: bool) -> anyhow::Result<Archive> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    Ok(mhtml::store::load_archive(path, only_header)?)
}

fn progress_bar(len: u64, template: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Extract all resources into a directory.
fn cmd_extract(path: &Path, dir: &Path, decode: bool, config: &Config) -> anyhow::Result<()> {
    let archive = open_archive(path, false)?;
    let options = config.extract.to_options(decode);

    println!(
        "  Extracting {} resource(s) from {} into {}",
        archive.resource_count(),
        path.display(),
        dir.display()
    );

    let pb = progress_bar(
        archive.resource_count() as u64,
        "{spinner:.green} Extracting [{bar:40.cyan/blue}] {pos}/{len}",
    );
    let paths = extract::extract_all(&archive, dir, &options, &|current, _total| {
        pb.set_position(current as u64);
    })?;
    pb.finish_and_clear();

    println!("  Extracted {} file(s) to {}", paths.len(), dir.display());
    Ok(())
}

/// Extract the main page of an archive.
fn cmd_extract_main(path: &Path, output: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let archive = open_archive(path, false)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| extract::default_main_output(path));

    let written = extract::extract_main(&archive, &output, config.extract.decode)?;

    use humansize::{format_size, BINARY};
    println!(
        "  Wrote main page ({}) to {}",
        format_size(written as u64, BINARY),
        output.display()
    );
    Ok(())
}

/// Merge several archives into one.
fn cmd_merge(output: &Path, inputs: &[PathBuf]) -> anyhow::Result<()> {
    for input in inputs {
        if !input.exists() {
            anyhow::bail!("File not found: {}", input.display());
        }
    }

    let pb = progress_bar(
        inputs.len() as u64,
        "{spinner:.green} Loading [{bar:40.cyan/blue}] {pos}/{len} files",
    );
    let stats = merge::merge_files(inputs, output, &|current, _total, _name| {
        pb.set_position(current as u64);
    })?;
    pb.finish_and_clear();

    use humansize::{format_size, BINARY};
    println!();
    println!("  Merge complete:");
    println!("  {:<25} {}", "Input files", stats.input_files);
    println!("  {:<25} {}", "Resources in main file", stats.resources_before);
    println!("  {:<25} {}", "Resources added", stats.resources_added);
    println!("  {:<25} {}", "Known locations skipped", stats.duplicates_skipped);
    println!(
        "  {:<25} {} -> {}",
        "Size",
        format_size(stats.size_before, BINARY),
        format_size(stats.output_size, BINARY)
    );
    println!("  {:<25} {}", "Output file", output.display());
    println!();

    Ok(())
}

fn print_separator(length: usize, ch: char) {
    println!("{}", ch.to_string().repeat(length));
}

fn print_header_table(header: &mhtml::HeaderTable) {
    let width = header.names().map(str::len).max().unwrap_or(0);
    for (name, value) in header.iter() {
        println!("{name:>width$}:\t{value}");
    }
}

fn preview_text(resource: &ResourceView<'_>, length: usize) -> String {
    let content = resource.content().unwrap_or_default();
    let shown = &content[..content.len().min(length)];
    String::from_utf8_lossy(shown).into_owned()
}

fn is_main(archive: &Archive, resource: &ResourceView<'_>) -> bool {
    resource.location().is_some() && resource.location() == archive.location()
}

/// Print the main header and the header of every (matching) resource.
fn cmd_headers(
    path: &Path,
    only_main_header: bool,
    preview: Option<usize>,
    pattern: &str,
    json: bool,
) -> anyhow::Result<()> {
    let archive = open_archive(path, only_main_header)?;
    let filter = ContentTypeFilter::new(pattern)?;

    let selected: Vec<(usize, ResourceView<'_>)> = if only_main_header {
        Vec::new()
    } else {
        archive
            .resources()
            .enumerate()
            .filter(|(i, r)| {
                let keep = filter.matches_resource(r);
                if !keep {
                    tracing::debug!(index = i, content_type = ?r.content_type(), "Skipping resource");
                }
                keep
            })
            .collect()
    };

    if json {
        let resources: Vec<serde_json::Value> = selected
            .iter()
            .map(|(i, r)| {
                let (start, end) = r.resource_range();
                serde_json::json!({
                    "index": i,
                    "size": r.content().map_or(0, <[u8]>::len),
                    "range": [start, end],
                    "main": is_main(&archive, r),
                    "header": r.header().as_list(),
                    "preview": preview.map(|len| preview_text(r, len)),
                })
            })
            .collect();
        let output = serde_json::json!({
            "file": path.to_string_lossy(),
            "header": archive.header().as_list(),
            "resources": resources,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_header_table(archive.header());
    if only_main_header {
        return Ok(());
    }
    print_separator(40, '=');

    for (i, resource) in &selected {
        let (start, end) = resource.resource_range();
        println!(
            "Resource {}:  ({} bytes) [Offset: {} -- {}]",
            i,
            resource.content().map_or(0, <[u8]>::len),
            start,
            end
        );
        if is_main(&archive, resource) {
            println!("--> main content file!");
        }
        print_header_table(resource.header());
        if let Some(length) = preview {
            println!("Payload Preview: {:?}", preview_text(resource, length));
        }
        print_separator(40, '-');
    }

    Ok(())
}

/// List resources with type, short name, location and size.
fn cmd_info(path: &Path, json: bool) -> anyhow::Result<()> {
    let archive = open_archive(path, false)?;

    if json {
        let resources: Vec<serde_json::Value> = archive
            .resources()
            .enumerate()
            .map(|(i, r)| {
                serde_json::json!({
                    "index": i,
                    "content_type": r.content_type(),
                    "filename": r.short_filename("res.bin").display().to_string(),
                    "location": r.location(),
                    "size": r.content().map_or(0, <[u8]>::len),
                    "main": is_main(&archive, &r),
                })
            })
            .collect();
        let output = serde_json::json!({
            "file": path.to_string_lossy(),
            "location": archive.location(),
            "size": archive.content().len(),
            "resource_count": archive.resource_count(),
            "resources": resources,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    use humansize::{format_size, BINARY};
    println!();
    println!("  {:<20} {}", "File", path.display());
    println!("  {:<20} {}", "Size", format_size(archive.content().len() as u64, BINARY));
    println!("  {:<20} {}", "Main location", archive.location().unwrap_or("-"));
    println!("  {:<20} {}", "Resources", archive.resource_count());
    println!();

    for (i, resource) in archive.resources().enumerate() {
        let main = is_main(&archive, &resource);
        if main {
            print_separator(40, '~');
        }
        println!(
            "{}\t{}\t{}\t{}\t{}",
            i,
            resource.content_type().unwrap_or("-"),
            resource.short_filename("res.bin").display(),
            resource.location().unwrap_or("-"),
            resource.content().map_or(0, <[u8]>::len)
        );
        if main {
            println!("--> main content file");
            print_separator(40, '~');
        }
    }

    Ok(())
}
