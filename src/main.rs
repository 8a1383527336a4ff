mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands, DbCommands, UserCommands};
use db_provisioner::cluster::{Platform, Topology};
use db_provisioner::orchestrator::{DeployRequest, StopRequest};
use db_provisioner::{Error as ProvisionerError, Orchestrator, Parser as ConfigParser};
use output::{CliOutput, JsonOutput, UserOutput};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli).await {
        report_error(&e, json);
        std::process::exit(1);
    }
}

fn report_error(e: &anyhow::Error, json: bool) {
    let known = e.downcast_ref::<ProvisionerError>();

    if json {
        let (code, hint) = known
            .map(|err| (err.status_code(), err.suggestion()))
            .unwrap_or((500, None));
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "code": code,
                "error": format!("{:#}", e),
                "hint": hint,
            })
        );
        return;
    }

    match known {
        Some(err) => {
            eprintln!("Error: {}", err);
            if let Some(suggestion) = err.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    init_tracing()?;

    let out: Box<dyn UserOutput> = if cli.json {
        Box::new(JsonOutput)
    } else {
        Box::new(CliOutput)
    };
    let out = out.as_ref();

    let config = ConfigParser::new().load_or_default(cli.config.as_deref())?;
    let orchestrator = Orchestrator::builder().config(config).build().await?;

    match cli.command {
        Commands::Deploy {
            name,
            platform,
            nodes,
            version,
            image,
            instance_size,
            volume_gb,
            allowed,
            workload_units,
        } => {
            let request = DeployRequest {
                name,
                platform,
                topology: Topology {
                    node_count: nodes,
                    workload_units: match platform {
                        Platform::Vm => None,
                        Platform::Orchestrated => workload_units,
                    },
                    image,
                    instance_size,
                    data_volume_gb: volume_gb,
                    database_version: version,
                    allowed_cidrs: allowed,
                },
            };
            commands::run_deploy(&orchestrator, request, out).await?;
        }
        Commands::Start { name } => {
            commands::run_start(&orchestrator, &name, out).await?;
        }
        Commands::Stop {
            name,
            service,
            server,
        } => {
            let request = StopRequest {
                stop_service: service,
                stop_server: server,
            };
            commands::run_stop(&orchestrator, &name, request, out).await?;
        }
        Commands::Decommission { name } => {
            commands::run_decommission(&orchestrator, &name, out).await?;
        }
        Commands::Status { name } => {
            commands::run_status(&orchestrator, &name, out).await?;
        }
        Commands::List { standalone } => {
            commands::run_list(&orchestrator, standalone, out).await?;
        }
        Commands::ConnectionInfo { name } => {
            commands::run_connection_info(&orchestrator, &name, out).await?;
        }
        Commands::Db(db_cmd) => match db_cmd {
            DbCommands::Create { cluster, database } => {
                commands::run_create_db(&orchestrator, &cluster, &database, out).await?;
            }
            DbCommands::Drop { cluster, database } => {
                commands::run_drop_db(&orchestrator, &cluster, &database, out).await?;
            }
            DbCommands::List { cluster } => {
                commands::run_list_dbs(&orchestrator, &cluster, out).await?;
            }
        },
        Commands::User(user_cmd) => match user_cmd {
            UserCommands::Add {
                cluster,
                user,
                password,
                roles,
                database,
            } => {
                commands::run_add_user(
                    &orchestrator,
                    &cluster,
                    &user,
                    &password,
                    &roles,
                    database.as_deref(),
                    out,
                )
                .await?;
            }
            UserCommands::Remove { cluster, user } => {
                commands::run_remove_user(&orchestrator, &cluster, &user, out).await?;
            }
        },
        Commands::Images => commands::run_images(&orchestrator, out)?,
        Commands::Versions => commands::run_versions(&orchestrator, out)?,
    }

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}
