use std::process::Command;

#[test]
fn minimal_server_rejects_unknown_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_csp-server-minimal"))
        .arg("foo")
        .output()
        .expect("running csp-server-minimal");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "Usage: csp-server-minimal [--no-csp | --strict-csp]");
}

#[test]
fn minimal_server_requires_an_argument() {
    let output = Command::new(env!("CARGO_BIN_EXE_csp-server-minimal"))
        .output()
        .expect("running csp-server-minimal");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Usage: "));
}

#[test]
fn minimal_server_exits_when_directory_is_missing() {
    let workdir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_csp-server-minimal"))
        .arg("--strict-csp")
        .current_dir(workdir.path())
        .output()
        .expect("running csp-server-minimal");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "Error: directory not found: some-frontend");
}

#[test]
fn configurable_server_exits_when_dist_is_missing() {
    let workdir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_csp-server"))
        .args(&["--strict-csp", "-p", "9000", "-d", "not-built"])
        .current_dir(workdir.path())
        .output()
        .expect("running csp-server");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Error: Distribution directory not found: "), "{}", stdout);
    assert!(stdout.contains("not-built"));
    assert!(!stdout.contains("XSS/CSP Demo Server"));
}

#[test]
fn configurable_server_requires_a_csp_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_csp-server"))
        .output()
        .expect("running csp-server");

    assert!(!output.status.success());
}
