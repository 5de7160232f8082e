mod session;

use anyhow::Context;
use block_dfs::client::TransferClient;
use block_dfs::config::ClusterConfig;
use clap::{Parser, Subcommand};
use session::Session;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dfs-cli", about = "Shell for the distributed block file store")]
struct Cli {
    /// Cluster config file (falls back to $DFS_CONFIG, then config/cluster.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory (default: the current one)
    Ls { path: Option<String> },
    /// Change the current directory
    Cd { path: String },
    /// Print the current directory
    Pwd,
    /// Create a directory and any missing parents
    Mkdir { path: String },
    /// Remove a directory and everything below it
    Rmdir { path: String },
    /// Remove a file
    Rm { path: String },
    /// Upload a local file
    Put { local_path: PathBuf, dfs_path: String },
    /// Download a file
    Get { dfs_path: String, local_path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ClusterConfig::load(cli.config.as_deref()).context("loading cluster config")?;

    tracing_subscriber::fmt()
        .with_max_level(config.logging.max_level())
        .with_writer(std::io::stderr)
        .init();

    let client = TransferClient::from_config(&config)?;
    let mut session = Session::load();

    match cli.command {
        Command::Ls { path } => {
            let target = path
                .map(|p| session.resolve(&p))
                .unwrap_or_else(|| session.current().to_string());
            let contents = client.list(&target).await?;
            if let Some(entries) = contents.as_object() {
                for (name, kind) in entries {
                    if kind.as_str() == Some("file") {
                        println!("FILE\t{}", name);
                    } else {
                        println!("DIR\t{}/", name);
                    }
                }
            }
        }
        Command::Cd { path } => {
            let target = session.resolve(&path);
            client
                .list(&target)
                .await
                .with_context(|| format!("directory not found: {}", target))?;
            session.change_to(target)?;
            println!("Current directory: {}", session.current());
        }
        Command::Pwd => println!("Current directory: {}", session.current()),
        Command::Mkdir { path } => {
            println!("{}", client.create_directory(&session.resolve(&path)).await?);
        }
        Command::Rmdir { path } => {
            println!("{}", client.delete_directory(&session.resolve(&path)).await?);
        }
        Command::Rm { path } => {
            println!("{}", client.delete_file(&session.resolve(&path)).await?);
        }
        Command::Put {
            local_path,
            dfs_path,
        } => {
            let outcome = client
                .write_file(&local_path, &session.resolve(&dfs_path))
                .await?;
            for report in outcome.replication.iter().filter(|r| !r.fully_replicated()) {
                for failure in &report.failed {
                    eprintln!(
                        "warning: replica on {} missing: {}",
                        failure.node_id, failure.reason
                    );
                }
            }
            println!(
                "Uploaded {} ({} bytes, {} blocks)",
                outcome.file.filename,
                outcome.file.size,
                outcome.file.blocks.len()
            );
        }
        Command::Get {
            dfs_path,
            local_path,
        } => {
            let file = client
                .read_file(&session.resolve(&dfs_path), &local_path)
                .await?;
            println!(
                "Downloaded {} to {}",
                file.filename,
                local_path.display()
            );
        }
    }

    Ok(())
}
