//! Scripted stand-in providers for tests.

use tempfile::TempDir;

use crate::connection::ProviderConfig;

/// Handshake acknowledgement for request id 1.
pub(crate) const INIT_REPLY: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake-scraper","version":"0.1.0"}}}"#;

/// Write `script` as the provider entry point and run it with `sh`.
///
/// The returned directory must outlive the provider.
pub(crate) fn scripted_provider(script: &str) -> (TempDir, ProviderConfig) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provider.sh");
    std::fs::write(&path, script).unwrap();
    let config = ProviderConfig::new("sh", path);
    (dir, config)
}

/// Script line recording the provider's pid in `provider.pid`.
pub(crate) const RECORD_PID: &str = "echo $$ > \"$(dirname \"$0\")/provider.pid\"\n";

/// Whether the process recorded by [`RECORD_PID`] still exists.
pub(crate) fn provider_alive(dir: &TempDir) -> bool {
    let pid = std::fs::read_to_string(dir.path().join("provider.pid")).unwrap();
    std::process::Command::new("kill")
        .args(["-0", pid.trim()])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success()
}
