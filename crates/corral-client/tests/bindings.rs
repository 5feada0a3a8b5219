//! Bindings against a live daemon on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use corral::runtime::{Engine, EngineConfig};
use corral::supervisor::SimulatedSupervisor;
use corral_client::{
    ClientError, Connection, CreateOptions, RemoveOptions, WaitOptions,
};
use corral_common::{ContainerStatus, ErrorKind, StatusPolicy};
use corrald::{AppState, create_router};
use futures::future::join_all;

async fn spawn_daemon(policy: StatusPolicy) -> Connection {
    let config = EngineConfig::default()
        .with_stop_timeout(Duration::from_millis(200))
        .with_kill_grace(Duration::from_millis(200));
    let engine = Engine::new(Arc::new(SimulatedSupervisor::new()), config);
    engine.start_exit_monitor();
    let app = create_router(AppState::new(engine).with_policy(policy));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Connection::new(format!("http://{addr}"))
}

async fn run_top(conn: &Connection) {
    conn.create(&CreateOptions::new(["top"]).name("top"))
        .await
        .unwrap();
    conn.start("top").await.unwrap();
}

fn kind(err: &ClientError) -> ErrorKind {
    err.kind().unwrap_or_else(|| panic!("not an API error: {err}"))
}

#[test_log::test(tokio::test)]
async fn pause_unknown_container() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;

    let err = conn.pause("foobar").await.unwrap_err();
    assert_eq!(kind(&err), ErrorKind::NotFound);
    assert_eq!(err.status_code(), Some(404));

    let err = conn.unpause("foobar").await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
}

#[test_log::test(tokio::test)]
async fn pause_and_unpause() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    conn.pause("top").await.unwrap();
    let state = conn.inspect("top").await.unwrap().state;
    assert_eq!(state.status, ContainerStatus::Paused);
    assert!(state.paused);

    conn.unpause("top").await.unwrap();
    assert_eq!(
        conn.inspect("top").await.unwrap().state.status,
        ContainerStatus::Running
    );
}

#[test_log::test(tokio::test)]
async fn bare_paths_work_too() {
    let conn = spawn_daemon(StatusPolicy::Compat)
        .await
        .with_api_version(None);
    run_top(&conn).await;

    conn.pause("top").await.unwrap();
    conn.unpause("top").await.unwrap();
    conn.ping().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn pause_paused_is_500_with_invalid_state_cause() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    conn.pause("top").await.unwrap();
    let err = conn.pause("top").await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(kind(&err), ErrorKind::InvalidState);
}

#[test_log::test(tokio::test)]
async fn conflict_policy_reports_409() {
    let conn = spawn_daemon(StatusPolicy::Conflict).await;
    run_top(&conn).await;

    conn.pause("top").await.unwrap();
    let err = conn.pause("top").await.unwrap_err();
    assert_eq!(err.status_code(), Some(409));
    assert_eq!(kind(&err), ErrorKind::InvalidState);
}

#[test_log::test(tokio::test)]
async fn pause_and_unpause_stopped_fail() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    conn.stop("top", Some(Duration::from_secs(1))).await.unwrap();

    let err = conn.pause("top").await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
    let err = conn.unpause("top").await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
}

#[test_log::test(tokio::test)]
async fn stop_paused_fails() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    conn.pause("top").await.unwrap();
    let err = conn.stop("top", None).await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(
        conn.inspect("top").await.unwrap().state.status,
        ContainerStatus::Paused
    );
}

#[test_log::test(tokio::test)]
async fn remove_paused_needs_force() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    conn.pause("top").await.unwrap();
    let err = conn.remove("top", RemoveOptions::default()).await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));

    conn.remove(
        "top",
        RemoveOptions {
            force: true,
            volumes: true,
        },
    )
    .await
    .unwrap();

    let err = conn.inspect("top").await.unwrap_err();
    assert_eq!(kind(&err), ErrorKind::NotFound);
    assert!(conn.list().await.unwrap().is_empty());
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn wait_across_stop_returns_sigterm_code() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    let waiter = tokio::spawn({
        let conn = conn.clone();
        async move { conn.wait("top", &WaitOptions::default()).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    conn.stop("top", None).await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(waited.exit_code, 143);
    assert_eq!(waited.status, ContainerStatus::Exited);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn wait_for_paused_then_running() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    let paused = tokio::spawn({
        let conn = conn.clone();
        async move {
            conn.wait("top", &WaitOptions::until([ContainerStatus::Paused]))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    conn.pause("top").await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(5), paused)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(waited.exit_code, -1);
    assert_eq!(waited.status, ContainerStatus::Paused);

    let running = tokio::spawn({
        let conn = conn.clone();
        async move {
            conn.wait("top", &WaitOptions::until([ContainerStatus::Running]))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    conn.unpause("top").await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(waited.exit_code, -1);
    assert_eq!(waited.status, ContainerStatus::Running);
}

#[test_log::test(tokio::test)]
async fn wait_timeout_is_reported() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    let err = conn
        .wait(
            "top",
            &WaitOptions::until([ContainerStatus::Paused]).with_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();
    assert_eq!(kind(&err), ErrorKind::Timeout);
    assert_eq!(err.status_code(), Some(408));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_pauses_have_one_winner() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    run_top(&conn).await;

    let results = join_all((0..10).map(|_| conn.pause("top"))).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(successes, 1);
    assert_eq!(failures.len(), 9);
    for err in failures {
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(kind(err), ErrorKind::InvalidState);
    }
}

#[test_log::test(tokio::test)]
async fn unreachable_daemon_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = Connection::new(format!("http://{addr}"))
        .ping()
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
    assert_eq!(err.kind(), None);
}

#[test_log::test(tokio::test)]
async fn version_reports_api_version() {
    let conn = spawn_daemon(StatusPolicy::Compat).await;
    let version = conn.version().await.unwrap();
    assert_eq!(version.api_version, corrald::API_VERSION);
}
