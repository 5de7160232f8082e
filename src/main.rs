use anyhow::Context;
use block_dfs::cluster::probe::HttpMetricsProbe;
use block_dfs::cluster::types::NodeId;
use block_dfs::config::ClusterConfig;
use block_dfs::datanode::service::DataNode;
use block_dfs::namenode::service::NameNode;
use block_dfs::{datanode, namenode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dfs", about = "Distributed block file store servers")]
struct Cli {
    /// Cluster config file (falls back to $DFS_CONFIG, then config/cluster.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator
    Namenode,
    /// Run a storage node
    Datanode {
        /// Node id; must match a [datanodes.<id>] entry
        #[arg(long)]
        node_id: String,
        /// Block directory (default: storage/<node-id>)
        #[arg(long)]
        storage: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ClusterConfig::load(cli.config.as_deref()).context("loading cluster config")?;

    tracing_subscriber::fmt()
        .with_max_level(config.logging.max_level())
        .init();

    match cli.command {
        Command::Namenode => run_namenode(config).await,
        Command::Datanode { node_id, storage } => run_datanode(config, node_id, storage).await,
    }
}

async fn run_namenode(config: ClusterConfig) -> anyhow::Result<()> {
    let probe = HttpMetricsProbe::new(
        reqwest::Client::builder()
            .connect_timeout(config.transfer.connect_timeout())
            .build()?,
    );
    let namenode = NameNode::open(&config, Arc::new(probe))
        .await
        .context("starting namenode")?;

    let bind_addr = config.namenode_addr();
    tracing::info!("Namenode listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, namenode::handlers::router(namenode)).await?;

    Ok(())
}

async fn run_datanode(
    config: ClusterConfig,
    node_id: String,
    storage: Option<PathBuf>,
) -> anyhow::Result<()> {
    let endpoint = config
        .datanode(&node_id)
        .with_context(|| format!("datanode {} is not in the cluster config", node_id))?;
    let bind_addr = endpoint.address();
    let storage = storage.unwrap_or_else(|| PathBuf::from("storage").join(&node_id));

    let datanode = DataNode::open(
        NodeId(node_id.clone()),
        &storage,
        config.replication.block_size,
        &config.transfer,
    )
    .await
        .with_context(|| format!("opening block store {}", storage.display()))?;

    tracing::info!(
        "Datanode {} listening on {} ({} blocks in {})",
        node_id,
        bind_addr,
        datanode.store().block_count(),
        storage.display()
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, datanode::handlers::router(datanode)).await?;

    Ok(())
}
