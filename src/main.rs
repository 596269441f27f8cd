use anyhow::{bail, Context};
use boksldir_archive::config::Settings;
use boksldir_archive::logging::init_logging;
use boksldir_archive::models::ArchiveType;
use boksldir_archive::system::{classify, ArchiveService, FileSystem, LocalOperationsService};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "boksldir-archive")]
#[command(author, version, about = "BokslDir archive tool")]
#[command(long_about = "
Pack and extract archives the way the BokslDir file manager does.
Supported formats: tar, zip, 7z, gz, tar.gz, tar.bz2, tar.xz, tar.lz

Examples:
  boksldir-archive detect backup.tar.gz
  boksldir-archive pack photos notes.txt
  boksldir-archive pack --type tar.xz -o /tmp/src.tar.xz src
  boksldir-archive extract backup.zip /tmp/out
  boksldir-archive extract-new backup.7z
")]
struct Cli {
    /// Settings file (defaults to $BOKSLDIR_ARCHIVE_CONFIG or the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the archive type of each path
    Detect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Pack files and directories into a new archive
    #[command(alias = "c")]
    Pack {
        /// Archive type (tar, zip, 7z, gz, tar.gz, tar.bz2, tar.xz, tar.lz)
        #[arg(short = 't', long = "type")]
        archive_type: Option<ArchiveType>,

        /// Output archive (suggested next to the inputs when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(required = true)]
        nodes: Vec<PathBuf>,
    },

    /// Extract an archive into a directory (the archive's directory by default)
    #[command(alias = "x")]
    Extract {
        archive: PathBuf,
        destination: Option<PathBuf>,
    },

    /// Extract an archive into a new directory named after it
    ExtractNew { archive: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load settings")?;
    init_logging(&settings.logging.level);

    let operations = Arc::new(LocalOperationsService::new(settings.compression.clone()));
    let service = ArchiveService::new(operations.clone(), Arc::new(FileSystem::new()));

    let work = run(&service, &settings, cli.command);
    tokio::pin!(work);

    tokio::select! {
        result = &mut work => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling active operations");
            for info in operations.active_operations() {
                operations.cancel(info.id);
            }
            work.await
        }
    }
}

async fn run(
    service: &ArchiveService,
    settings: &Settings,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Detect { paths } => {
            for path in paths {
                match classify(&path) {
                    Some(archive_type) => println!("{}\t{}", path.display(), archive_type),
                    None => println!("{}\t-", path.display()),
                }
            }
        }
        Commands::Pack {
            archive_type,
            output,
            nodes,
        } => {
            let archive_type = archive_type.unwrap_or(settings.archive.default_type);
            if !archive_type.supports_multiple_entries()
                && (nodes.len() != 1 || nodes[0].is_dir())
            {
                bail!("{} archives hold exactly one file", archive_type);
            }

            let output =
                output.unwrap_or_else(|| service.suggest_pack_output(&nodes, archive_type));
            service
                .pack(&nodes, &output, archive_type)
                .await
                .with_context(|| format!("failed to pack {}", output.display()))?;
            println!("{}", output.display());
        }
        Commands::Extract {
            archive,
            destination,
        } => {
            if !service.is_archive(&archive) {
                bail!("not a recognized archive: {}", archive.display());
            }
            let out = service
                .extract(&archive, destination.as_deref())
                .await
                .with_context(|| format!("failed to extract {}", archive.display()))?;
            println!("{}", out.display());
        }
        Commands::ExtractNew { archive } => {
            if !service.is_archive(&archive) {
                bail!("not a recognized archive: {}", archive.display());
            }
            let out = service
                .extract_to_new_directory(&archive)
                .await
                .with_context(|| format!("failed to extract {}", archive.display()))?;
            println!("{}", out.display());
        }
    }
    Ok(())
}
