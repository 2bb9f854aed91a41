//! End-to-end lifecycle: create, spawn, wait, kill, destroy.

mod support;

use stevelock::{Policy, Sandbox};

#[test]
fn spawn_and_wait_reports_exit_code() {
    let mut sandbox = Sandbox::create(Policy::default()).expect("create sandbox");
    let args: &[&str] = &["status", "--code", "7"];
    sandbox
        .spawn(support::testbox_path().to_str().unwrap(), args, None)
        .expect("spawn");

    assert!(sandbox.pid() > 0);
    assert_eq!(sandbox.wait(), 7);
    // idempotent
    assert_eq!(sandbox.wait(), 7);
}

#[test]
fn second_spawn_on_same_context_is_rejected() {
    let mut sandbox = Sandbox::create(Policy::default()).expect("create sandbox");
    let args: &[&str] = &["status", "--code", "0"];
    sandbox
        .spawn(support::testbox_path().to_str().unwrap(), args, None)
        .expect("first spawn");
    sandbox.wait();

    let err = sandbox
        .spawn(support::testbox_path().to_str().unwrap(), args, None)
        .unwrap_err();
    assert_eq!(err.kind_name(), "INVALID_CONTEXT");
}

#[test]
fn kill_terminates_a_sleeping_child() {
    let mut sandbox = Sandbox::create(Policy::default()).expect("create sandbox");
    let args: &[&str] = &["sleep", "--ms", "60000"];
    sandbox
        .spawn(support::testbox_path().to_str().unwrap(), args, None)
        .expect("spawn");

    assert_eq!(sandbox.kill(libc::SIGKILL), 0);
    let code = sandbox.wait();
    assert_eq!(code, 128 + libc::SIGKILL);
}

#[test]
fn destroy_reaps_a_still_running_child() {
    let mut sandbox = Sandbox::create(Policy::default()).expect("create sandbox");
    let args: &[&str] = &["sleep", "--ms", "60000"];
    sandbox
        .spawn(support::testbox_path().to_str().unwrap(), args, None)
        .expect("spawn");

    let pid = sandbox.pid();
    sandbox.destroy();

    // The process should no longer exist as a running (non-zombie) child.
    let still_alive = unsafe { libc::kill(pid, 0) == 0 };
    assert!(!still_alive);
}

#[test]
fn custom_environment_replaces_inherited_one() {
    let mut sandbox = Sandbox::create(Policy::default()).expect("create sandbox");
    let args: &[&str] = &["print-env", "--key", "STEVELOCK_TEST_VAR"];
    let env = [("STEVELOCK_TEST_VAR".to_string(), "hello".to_string())];
    sandbox
        .spawn(support::testbox_path().to_str().unwrap(), args, Some(&env))
        .expect("spawn");
    assert_eq!(sandbox.wait(), 0);
}
