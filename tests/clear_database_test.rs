use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn clear_database_logs_each_cleared_collection() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(3)
        .mount(&server)
        .await;

    // Run from a scratch dir so the log files and any .env lookup stay local
    let workdir = TempDir::new().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_clear-database"))
        .current_dir(workdir.path())
        .env("SUPABASE_URL", server.uri())
        .env("SUPABASE_SERVICE_ROLE_KEY", "service-role-test-key")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"\n").await.unwrap();

    let output = child.wait_with_output().await.unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "{stdout}");
    for collection in ["quality_measures", "deficiencies", "providers"] {
        assert!(stdout.contains(&format!("Cleared {collection}")), "{stdout}");
    }
    assert!(workdir.path().join("logs").is_dir());
}
