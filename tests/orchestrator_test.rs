mod common;

use common::{request, TestEnv, DEPLOY_ADDRESS};
use db_provisioner::cluster::{ClusterFilter, ClusterStatus, Platform};
use db_provisioner::orchestrator::StopRequest;
use db_provisioner::status::ObservedState;
use db_provisioner::tool::ToolError;
use db_provisioner::Error;
use std::fs;

const STOP_ALL: StopRequest = StopRequest {
    stop_service: true,
    stop_server: true,
};

async fn status_of(env: &TestEnv, name: &str) -> ClusterStatus {
    env.orchestrator.get(name).await.expect("record missing").status
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deploy_records_running_cluster() {
    let env = TestEnv::new().await;

    let record = env
        .orchestrator
        .deploy(request("orders", Platform::Vm, 1))
        .await
        .expect("deploy failed");

    assert_eq!(record.status, ClusterStatus::Running);
    assert_eq!(record.primary_address(), Some(DEPLOY_ADDRESS));
    assert_eq!(record.endpoints[0].node, "orders-node-1");
    assert_eq!(record.endpoints[0].private_address.as_deref(), Some("10.0.0.10"));
    assert_eq!(env.runner.keys(), vec!["init", "apply", "output", "describe"]);

    let stored = env.orchestrator.get("orders").await.unwrap();
    assert_eq!(stored, record);

    let tfvars = fs::read_to_string(env.workspace("orders").join("terraform/terraform.tfvars")).unwrap();
    assert!(tfvars.contains("cluster_name   = \"orders\""));
    assert!(tfvars.contains("operator_ip    = \"203.0.113.1\""));
    assert!(tfvars.contains(r#"allowed_ips    = ["192.0.2.0/24"]"#));
    assert!(!env.workspace("orders").join("terraform/terraform.tfvars.tmpl").exists());

    let group_vars = fs::read_to_string(env.workspace("orders").join("ansible/group_vars/all.yml")).unwrap();
    assert!(group_vars.contains("postgres_version: \"16\""));
}

#[tokio::test]
async fn deploy_of_existing_name_conflicts() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;

    let result = env.orchestrator.deploy(request("orders", Platform::Vm, 1)).await;

    assert!(matches!(result, Err(Error::Conflict(_))));
    assert_eq!(env.runner.count("apply"), 0);
    // the existing cluster is untouched
    assert!(env.workspace("orders").join("terraform/terraform.tfvars").exists());
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn failed_apply_rolls_back_everything() {
    let env = TestEnv::new().await;
    env.runner.fail("apply");

    let result = env.orchestrator.deploy(request("orders", Platform::Vm, 1)).await;

    assert!(matches!(result, Err(Error::ExternalToolFailure(_))));
    assert!(matches!(env.orchestrator.get("orders").await, Err(Error::NotFound(_))));
    assert!(!env.workspace("orders").exists());
    assert_eq!(env.runner.count("destroy"), 1);
}

#[tokio::test]
async fn timed_out_apply_rolls_back_everything() {
    let env = TestEnv::new().await;
    env.runner.time_out("apply");

    let result = env.orchestrator.deploy(request("orders", Platform::Vm, 1)).await;

    assert!(matches!(
        result,
        Err(Error::ExternalToolFailure(ToolError::Timeout { .. }))
    ));
    assert!(matches!(env.orchestrator.get("orders").await, Err(Error::NotFound(_))));
    assert!(!env.workspace("orders").exists());
    assert_eq!(env.runner.count("destroy"), 1);
}

#[tokio::test]
async fn failed_init_skips_destroy() {
    let env = TestEnv::new().await;
    env.runner.fail("init");

    let result = env.orchestrator.deploy(request("orders", Platform::Vm, 1)).await;

    assert!(matches!(result, Err(Error::ExternalToolFailure(_))));
    assert_eq!(env.runner.count("destroy"), 0);
    assert!(!env.workspace("orders").exists());
}

#[tokio::test]
async fn failed_destroy_during_rollback_still_reports_original_error() {
    let env = TestEnv::new().await;
    env.runner.fail("apply");
    env.runner.fail("destroy");

    let result = env.orchestrator.deploy(request("orders", Platform::Vm, 1)).await;

    match result {
        Err(Error::ExternalToolFailure(e)) => assert!(e.to_string().contains("apply")),
        other => panic!("expected apply failure, got {:?}", other),
    }
    assert!(!env.workspace("orders").exists());
    assert!(matches!(env.orchestrator.get("orders").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn deploy_without_generated_inventory_rolls_back() {
    let env = TestEnv::new().await;
    env.runner.set_write_inventory(false);

    let result = env.orchestrator.deploy(request("orders", Platform::Vm, 1)).await;

    assert!(matches!(result, Err(Error::MissingArtifact(_))));
    assert_eq!(env.runner.count("destroy"), 1);
    assert!(!env.workspace("orders").exists());
    assert!(matches!(env.orchestrator.get("orders").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn unresolvable_address_rolls_back() {
    let env = TestEnv::new().await;
    env.runner.set_address("None");

    let result = env.orchestrator.deploy(request("orders", Platform::Vm, 1)).await;

    assert!(matches!(result, Err(Error::ParseFailure { .. })));
    assert_eq!(env.runner.count("destroy"), 1);
    assert!(!env.workspace("orders").exists());
}

#[tokio::test]
async fn deploy_policy_is_checked_before_any_side_effect() {
    let env = TestEnv::new().await;

    match env.orchestrator.deploy(request("orders", Platform::Vm, 10)).await {
        Err(Error::PolicyViolation(msg)) => assert_eq!(msg, "Maximum 9 instances allowed."),
        other => panic!("expected node cap violation, got {:?}", other),
    }

    let mut old_version = request("orders", Platform::Vm, 1);
    old_version.topology.database_version = "9.6".to_string();
    assert!(matches!(
        env.orchestrator.deploy(old_version).await,
        Err(Error::PolicyViolation(_))
    ));

    let mut too_many_cidrs = request("orders", Platform::Vm, 1);
    too_many_cidrs.topology.allowed_cidrs = vec![
        "192.0.2.0/24".into(),
        "198.51.100.0/24".into(),
        "203.0.113.0/24".into(),
    ];
    assert!(matches!(
        env.orchestrator.deploy(too_many_cidrs).await,
        Err(Error::PolicyViolation(_))
    ));

    assert!(matches!(
        env.orchestrator.deploy(request("../etc", Platform::Vm, 1)).await,
        Err(Error::PolicyViolation(_))
    ));

    assert!(env.runner.keys().is_empty());
    assert!(!env.workspace("orders").exists());
}

#[tokio::test]
async fn orchestrated_deploy_uses_one_compute_resource() {
    let env = TestEnv::new().await;

    let record = env
        .orchestrator
        .deploy(request("analytics", Platform::Orchestrated, 3))
        .await
        .expect("deploy failed");

    assert_eq!(record.platform, Platform::Orchestrated);
    assert_eq!(record.endpoints.len(), 1);
    assert_eq!(record.topology.workload_units, Some(1));

    let tfvars = fs::read_to_string(env.workspace("analytics").join("terraform/terraform.tfvars")).unwrap();
    assert!(tfvars.contains("instance_count = 1"));
    let group_vars = fs::read_to_string(env.workspace("analytics").join("ansible/group_vars/all.yml")).unwrap();
    assert!(group_vars.contains("node_count: 3"));
}

#[tokio::test]
async fn concurrent_deploys_of_one_name_admit_exactly_one() {
    let env = TestEnv::new().await;

    let (a, b) = tokio::join!(
        env.orchestrator.deploy(request("orders", Platform::Vm, 1)),
        env.orchestrator.deploy(request("orders", Platform::Vm, 1)),
    );

    let conflicts = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(Error::Conflict(_))))
        .count();
    assert_eq!(conflicts, 1);
    assert!(a.is_ok() || b.is_ok());
    assert_eq!(env.runner.count("apply"), 1);
}

#[tokio::test]
async fn deploys_of_different_names_both_succeed() {
    let env = TestEnv::new().await;

    let (a, b) = tokio::join!(
        env.orchestrator.deploy(request("orders", Platform::Vm, 1)),
        env.orchestrator.deploy(request("billing", Platform::Vm, 2)),
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    let all = env.orchestrator.list(&ClusterFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
}

// ---------------------------------------------------------------------------
// Stop / Start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_without_service_confirmation_is_rejected() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;

    let result = env
        .orchestrator
        .stop(
            "orders",
            StopRequest {
                stop_service: false,
                stop_server: true,
            },
        )
        .await;

    match result {
        Err(Error::PolicyViolation(msg)) => assert!(msg.contains("cancelled. No actions performed.")),
        other => panic!("expected PolicyViolation, got {:?}", other.map(|o| o.message)),
    }
    assert!(env.runner.keys().is_empty());
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn stop_runs_service_then_server() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;

    let outcome = env.orchestrator.stop("orders", STOP_ALL).await.expect("stop failed");

    assert_eq!(outcome.message, "PostgreSQL service stopped. | Server stopped.");
    assert_eq!(env.runner.keys(), vec!["stop_instance.yml", "stop_server.yml"]);
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Stopped);
}

#[tokio::test]
async fn stop_service_only_leaves_server_up() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;

    let outcome = env
        .orchestrator
        .stop(
            "orders",
            StopRequest {
                stop_service: true,
                stop_server: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.message, "PostgreSQL service stopped.");
    assert_eq!(env.runner.count("stop_server.yml"), 0);
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Stopped);
}

#[tokio::test]
async fn failed_service_stop_marks_unknown_and_skips_server() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.fail("stop_instance.yml");

    let result = env.orchestrator.stop("orders", STOP_ALL).await;

    assert!(matches!(result, Err(Error::ExternalToolFailure(_))));
    assert_eq!(env.runner.count("stop_server.yml"), 0);
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Unknown);
}

#[tokio::test]
async fn failed_server_stop_is_partial() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.fail("stop_server.yml");

    match env.orchestrator.stop("orders", STOP_ALL).await {
        Err(Error::PartialFailure {
            completed, failed, ..
        }) => {
            assert_eq!(completed, vec!["PostgreSQL service stop".to_string()]);
            assert_eq!(failed, "server stop");
        }
        other => panic!("expected partial failure, got {:?}", other),
    }
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Stopped);
}

#[tokio::test]
async fn stop_with_missing_procedure_fails_before_side_effects() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    fs::remove_file(env.workspace("orders").join("ansible/stop_server.yml")).unwrap();

    let result = env.orchestrator.stop("orders", STOP_ALL).await;

    assert!(matches!(result, Err(Error::MissingArtifact(_))));
    assert!(env.runner.keys().is_empty());
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn start_refreshes_address_in_record_and_inventory() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.orchestrator.stop("orders", STOP_ALL).await.unwrap();
    env.runner.clear();
    env.runner.set_address("198.51.100.99");

    let outcome = env.orchestrator.start("orders").await.expect("start failed");

    assert_eq!(outcome.message, "Server started. | PostgreSQL service started.");
    assert_eq!(
        env.runner.keys(),
        vec!["start_server.yml", "describe", "start_instance.yml"]
    );
    let record = env.orchestrator.get("orders").await.unwrap();
    assert_eq!(record.status, ClusterStatus::Running);
    assert_eq!(record.primary_address(), Some("198.51.100.99"));
    // private address survives the refresh
    assert_eq!(record.endpoints[0].private_address.as_deref(), Some("10.0.0.10"));

    let inventory = env.inventory("orders");
    assert!(inventory.contains("orders-node-1 ansible_host=198.51.100.99 ansible_user=rocky"));
    assert!(!inventory.contains(DEPLOY_ADDRESS));
    assert!(inventory.contains("[all:vars]"));
}

#[tokio::test]
async fn start_of_running_cluster_is_invalid() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;

    let result = env.orchestrator.start("orders").await;

    assert!(matches!(result, Err(Error::InvalidState { .. })));
    assert!(env.runner.keys().is_empty());
}

#[tokio::test]
async fn failed_server_start_marks_unknown() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.orchestrator.stop("orders", STOP_ALL).await.unwrap();
    env.runner.fail("start_server.yml");

    let result = env.orchestrator.start("orders").await;

    assert!(matches!(result, Err(Error::ExternalToolFailure(_))));
    assert_eq!(env.runner.count("start_instance.yml"), 0);
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Unknown);
}

#[tokio::test]
async fn unresolvable_address_on_start_is_partial() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.orchestrator.stop("orders", STOP_ALL).await.unwrap();
    env.runner.fail("describe");

    match env.orchestrator.start("orders").await {
        Err(Error::PartialFailure {
            completed, failed, ..
        }) => {
            assert_eq!(completed, vec!["server start".to_string()]);
            assert_eq!(failed, "address update");
        }
        other => panic!("expected partial failure, got {:?}", other),
    }
    assert_eq!(env.runner.count("start_instance.yml"), 0);
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Unknown);
}

#[tokio::test]
async fn failed_service_start_degrades_but_keeps_new_address() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.orchestrator.stop("orders", STOP_ALL).await.unwrap();
    env.runner.set_address("198.51.100.77");
    env.runner.fail("start_instance.yml");

    let result = env.orchestrator.start("orders").await;

    assert!(matches!(result, Err(Error::PartialFailure { .. })));
    let record = env.orchestrator.get("orders").await.unwrap();
    assert_eq!(record.status, ClusterStatus::Degraded);
    assert_eq!(record.primary_address(), Some("198.51.100.77"));
    assert!(env.inventory("orders").contains("ansible_host=198.51.100.77"));

    // a degraded cluster can be started again once the cause is fixed
    env.runner.recover("start_instance.yml");
    env.orchestrator.start("orders").await.expect("retry failed");
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn orchestrated_stop_uses_workload_procedures() {
    let env = TestEnv::new().await;
    env.deployed("analytics", Platform::Orchestrated, 1).await;

    let outcome = env.orchestrator.stop("analytics", STOP_ALL).await.unwrap();

    assert_eq!(outcome.message, "PostgreSQL pod stopped. | Server stopped.");
    assert_eq!(env.runner.keys(), vec!["stop_postgres_pod.yml", "stop_server.yml"]);
}

#[tokio::test]
async fn unknown_cluster_is_not_found() {
    let env = TestEnv::new().await;

    assert!(matches!(env.orchestrator.start("ghost").await, Err(Error::NotFound(_))));
    assert!(matches!(
        env.orchestrator.stop("ghost", STOP_ALL).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(env.orchestrator.get_status("ghost").await, Err(Error::NotFound(_))));
    assert!(matches!(env.orchestrator.decommission("ghost").await, Err(Error::NotFound(_))));
    assert!(matches!(
        env.orchestrator.connection_info("ghost").await,
        Err(Error::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_is_read_only_and_repeatable() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.set_stdout(
        "check_postgres_status.yml",
        "[WARNING]: noisy\nok: [orders-node-1] => {\n    \"msg\": \"is_running=false\"\n}\n",
    );

    let first = env.orchestrator.get_status("orders").await.unwrap();
    let second = env.orchestrator.get_status("orders").await.unwrap();

    assert_eq!(first.observed.state, ObservedState::Stopped);
    assert_eq!(first.observed, second.observed);
    // inspection never rewrites the declared status
    assert_eq!(first.record.status, ClusterStatus::Running);
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn failed_inspection_keeps_annotation() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.fail("check_postgres_status.yml");

    let report = env.orchestrator.get_status("orders").await.unwrap();

    assert_eq!(report.observed.state, ObservedState::Unknown);
    assert!(report.observed.error.unwrap().contains("scripted failure"));
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn timed_out_inspection_is_an_error_state() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.time_out("check_postgres_status.yml");

    let report = env.orchestrator.get_status("orders").await.unwrap();

    assert_eq!(report.observed.state, ObservedState::Error);
    assert!(report.observed.error.is_some());
}

#[tokio::test]
async fn missing_inspection_procedure_is_unknown() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    fs::remove_file(env.workspace("orders").join("ansible/check_postgres_status.yml")).unwrap();

    let report = env.orchestrator.get_status("orders").await.unwrap();

    assert_eq!(report.observed.state, ObservedState::Unknown);
    assert!(env.runner.keys().is_empty());
}

#[tokio::test]
async fn orchestrated_status_uses_enumerated_token() {
    let env = TestEnv::new().await;
    env.deployed("analytics", Platform::Orchestrated, 1).await;
    env.runner
        .set_stdout("check_postgres_status_k8s.yml", "\"msg\": \"db_status=Running\"");

    let report = env.orchestrator.get_status("analytics").await.unwrap();

    assert_eq!(report.observed.state, ObservedState::Running);
}

// ---------------------------------------------------------------------------
// Decommission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn decommission_removes_standalone_cluster() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;

    let outcome = env.orchestrator.decommission("orders").await.expect("decommission failed");

    assert!(outcome
        .message
        .ends_with("Cluster 'orders' decommissioned successfully"));
    assert_eq!(env.runner.keys(), vec!["destroy"]);
    assert!(!env.workspace("orders").exists());
    assert!(matches!(env.orchestrator.get("orders").await, Err(Error::NotFound(_))));

    // the name is free again
    env.orchestrator
        .deploy(request("orders", Platform::Vm, 1))
        .await
        .expect("redeploy failed");
}

#[tokio::test]
async fn decommission_of_multi_node_cluster_is_refused() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 3).await;

    let result = env.orchestrator.decommission("orders").await;

    assert!(matches!(result, Err(Error::PolicyViolation(_))));
    assert!(env.runner.keys().is_empty());
    assert!(env.workspace("orders").exists());
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn failed_destroy_keeps_record_and_workspace() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.fail("destroy");

    let result = env.orchestrator.decommission("orders").await;

    assert!(matches!(result, Err(Error::ExternalToolFailure(_))));
    assert!(env.workspace("orders").exists());
    assert!(env.orchestrator.get("orders").await.is_ok());

    env.runner.recover("destroy");
    env.orchestrator.decommission("orders").await.expect("retry failed");
}

#[tokio::test]
async fn orchestrated_decommission_cleans_workloads_first() {
    let env = TestEnv::new().await;
    env.deployed("analytics", Platform::Orchestrated, 1).await;

    let outcome = env.orchestrator.decommission("analytics").await.unwrap();

    assert_eq!(env.runner.keys(), vec!["k8s_cleanup.yml", "destroy"]);
    assert!(outcome.message.starts_with("Workloads cleaned up."));
}

// ---------------------------------------------------------------------------
// Data plane
// ---------------------------------------------------------------------------

#[tokio::test]
async fn data_plane_requires_running_cluster() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.orchestrator.stop("orders", STOP_ALL).await.unwrap();
    env.runner.clear();

    let result = env.orchestrator.create_database("orders", "invoices").await;

    assert!(matches!(result, Err(Error::InvalidState { .. })));
    assert!(matches!(
        env.orchestrator.list_databases("orders").await,
        Err(Error::InvalidState { .. })
    ));
    assert!(env.runner.keys().is_empty());
}

#[tokio::test]
async fn create_database_passes_name_to_procedure() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;

    let outcome = env.orchestrator.create_database("orders", "invoices").await.unwrap();

    assert_eq!(outcome.message, "Database 'invoices' created successfully");
    let calls = env.runner.calls_for("create_database.yml");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args[0], "-i");
    assert!(calls[0]
        .args
        .last()
        .unwrap()
        .contains(r#""db_name":"invoices""#));
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn add_user_defaults_database() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;

    env.orchestrator
        .add_user("orders", "app", "s3cret", &["LOGIN".to_string(), "CREATEDB".to_string()], None)
        .await
        .unwrap();

    let calls = env.runner.calls_for("add_user.yml");
    let vars = calls[0].args.last().unwrap();
    assert!(vars.contains(r#""db_name":"postgres""#));
    assert!(vars.contains(r#""db_roles":"LOGIN,CREATEDB""#));
}

#[tokio::test]
async fn failed_add_user_keeps_password_out_of_error() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.fail("add_user.yml");

    let err = env
        .orchestrator
        .add_user("orders", "app", "TopSecret123", &[], None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ExternalToolFailure(_)));
    let msg = err.to_string();
    assert!(msg.contains("add_user.yml"));
    assert!(msg.contains(r#""db_user":"app""#));
    assert!(!msg.contains("TopSecret123"));
    assert!(!format!("{:?}", err).contains("TopSecret123"));
    // the tool itself still receives the real password
    let calls = env.runner.calls_for("add_user.yml");
    assert!(calls[0].args.last().unwrap().contains("TopSecret123"));
}

#[tokio::test]
async fn orchestrated_remove_user_runs_without_inventory() {
    let env = TestEnv::new().await;
    env.deployed("analytics", Platform::Orchestrated, 1).await;

    env.orchestrator.remove_user("analytics", "app").await.unwrap();

    let calls = env.runner.calls_for("k8s_remove_user.yml");
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].args.contains(&"-i".to_string()));
}

#[tokio::test]
async fn failed_data_plane_procedure_is_surfaced_as_is() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.fail("drop_database.yml");

    let result = env.orchestrator.drop_database("orders", "invoices").await;

    assert!(matches!(result, Err(Error::ExternalToolFailure(_))));
    assert_eq!(status_of(&env, "orders").await, ClusterStatus::Running);
}

#[tokio::test]
async fn list_databases_extracts_names() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner.set_stdout(
        "list_databases.yml",
        "TASK [Show databases] ***\nok: [orders-node-1] => {\n    \"msg\": [\n        \"postgres\",\n        \"invoices\"\n    ]\n}\n",
    );

    let databases = env.orchestrator.list_databases("orders").await.unwrap();

    assert_eq!(databases, vec!["postgres", "invoices"]);
}

#[tokio::test]
async fn malformed_database_list_is_a_parse_failure() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.runner
        .set_stdout("list_databases.yml", "\"msg\": [postgres, invoices]");

    let result = env.orchestrator.list_databases("orders").await;

    assert!(matches!(result, Err(Error::ParseFailure { .. })));
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connection_info_is_platform_specific() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.deployed("analytics", Platform::Orchestrated, 1).await;

    let vm = env.orchestrator.connection_info("orders").await.unwrap();
    assert_eq!(vm.host.as_deref(), Some(DEPLOY_ADDRESS));
    assert_eq!(vm.port, 5432);
    assert_eq!(
        vm.connection_string().as_deref(),
        Some("psql -h 198.51.100.10 -p 5432 -U postgres -d postgres")
    );

    let orchestrated = env.orchestrator.connection_info("analytics").await.unwrap();
    assert_eq!(orchestrated.port, 30036);
    assert_eq!(orchestrated.platform, Platform::Orchestrated);
}

#[tokio::test]
async fn list_filters_standalone_clusters() {
    let env = TestEnv::new().await;
    env.deployed("orders", Platform::Vm, 1).await;
    env.deployed("billing", Platform::Vm, 3).await;

    let all = env.orchestrator.list(&ClusterFilter::default()).await.unwrap();
    let standalone = env.orchestrator.list(&ClusterFilter::standalone()).await.unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(standalone.len(), 1);
    assert_eq!(standalone[0].name, "orders");
    assert_eq!(standalone[0].node_count, 1);
}
