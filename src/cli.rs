use clap::{Parser, Subcommand};
use db_provisioner::cluster::Platform;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dbprov")]
#[command(about = "Provision and manage PostgreSQL clusters on VMs or an orchestrated host")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to db-provisioner.yaml in this or a parent directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision a new cluster
    Deploy {
        /// Cluster name (letters, digits, '-' and '_')
        name: String,

        /// Platform: vm or orchestrated
        #[arg(long, default_value = "vm")]
        platform: Platform,

        /// Number of database nodes
        #[arg(short, long, default_value_t = 1)]
        nodes: u32,

        /// PostgreSQL major version
        #[arg(long = "pg-version", default_value = "16")]
        version: String,

        /// Compute image id
        #[arg(long, default_value = "ami-0a73e96a849c232cc")]
        image: String,

        /// Instance size
        #[arg(long, default_value = "t3.medium")]
        instance_size: String,

        /// Data volume size in GB
        #[arg(long, default_value_t = 20)]
        volume_gb: u32,

        /// Client CIDR allowed through the firewall (repeatable, at most two)
        #[arg(long = "allow", value_name = "CIDR")]
        allowed: Vec<String>,

        /// Workload units (orchestrated only; defaults to 1)
        #[arg(long)]
        workload_units: Option<u32>,
    },
    /// Start a stopped cluster and refresh its address
    Start { name: String },
    /// Stop a cluster's database service, and optionally its server
    Stop {
        name: String,

        /// Confirm stopping the database service (required, otherwise nothing happens)
        #[arg(long)]
        service: bool,

        /// Also stop the server once the service is stopped
        #[arg(long)]
        server: bool,
    },
    /// Destroy a standalone cluster and forget it
    Decommission { name: String },
    /// Inspect a cluster's database status
    Status { name: String },
    /// List recorded clusters
    List {
        /// Only single-node clusters
        #[arg(long)]
        standalone: bool,
    },
    /// Show how to connect to a cluster
    ConnectionInfo { name: String },
    /// Manage databases
    #[command(subcommand)]
    Db(DbCommands),
    /// Manage database users
    #[command(subcommand)]
    User(UserCommands),
    /// List supported compute images
    Images,
    /// List supported PostgreSQL versions
    Versions,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Create a database
    Create { cluster: String, database: String },
    /// Drop a database
    Drop { cluster: String, database: String },
    /// List databases
    List { cluster: String },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a user
    Add {
        cluster: String,
        user: String,

        #[arg(long)]
        password: String,

        /// Role to grant (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Database to grant on (defaults to postgres)
        #[arg(long)]
        database: Option<String>,
    },
    /// Remove a user
    Remove { cluster: String, user: String },
}
