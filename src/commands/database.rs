use crate::output::UserOutput;
use db_provisioner::Orchestrator;

pub async fn run_create_db(
    orchestrator: &Orchestrator,
    cluster: &str,
    database: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let outcome = orchestrator.create_database(cluster, database).await?;
    out.success(&outcome.message);
    Ok(())
}

pub async fn run_drop_db(
    orchestrator: &Orchestrator,
    cluster: &str,
    database: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let outcome = orchestrator.drop_database(cluster, database).await?;
    out.success(&outcome.message);
    Ok(())
}

pub async fn run_list_dbs(
    orchestrator: &Orchestrator,
    cluster: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let databases = orchestrator.list_databases(cluster).await?;

    out.status(&format!("Databases on '{}':", cluster));
    if databases.is_empty() {
        out.status("  (none reported)");
    }
    for database in &databases {
        out.status(&format!("  {}", database));
    }
    out.data(&serde_json::json!({ "cluster": cluster, "databases": databases }));
    Ok(())
}

pub async fn run_add_user(
    orchestrator: &Orchestrator,
    cluster: &str,
    user: &str,
    password: &str,
    roles: &[String],
    database: Option<&str>,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let outcome = orchestrator
        .add_user(cluster, user, password, roles, database)
        .await?;
    out.success(&outcome.message);
    Ok(())
}

pub async fn run_remove_user(
    orchestrator: &Orchestrator,
    cluster: &str,
    user: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let outcome = orchestrator.remove_user(cluster, user).await?;
    out.success(&outcome.message);
    Ok(())
}
