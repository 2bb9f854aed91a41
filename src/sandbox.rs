//! The sandbox context: construction, spawn, and the lifecycle operations.

use crate::error::{Error, Result};
use crate::platform::{self, NativeBackend};
use crate::policy::Policy;
use crate::spawn;
use crate::validate;

/// The top-level entity: owns a policy, a platform backend, and at most one
/// child process.
///
/// A context has at most one child during its lifetime — calling
/// [`spawn`](Sandbox::spawn) twice fails. `pid() < 0` iff no child has been
/// spawned yet.
pub struct Sandbox {
    policy: Policy,
    backend: NativeBackend,
    pid: i32,
    stdin_fd: i32,
    stdout_fd: i32,
    stderr_fd: i32,
    exited: bool,
    exit_code: i32,
    destroyed: bool,
    error: Option<String>,
}

impl Sandbox {
    /// Construct a sandbox context for `policy`.
    ///
    /// On macOS this resolves the Seatbelt symbols now and fails fast if
    /// they are unavailable. On Linux this probes the Landlock ABI now and
    /// fails if Landlock is unavailable. Neither backend validates the
    /// policy's paths here — that happens in [`spawn`](Sandbox::spawn),
    /// since doing it here would mean re-validating on every spawn attempt
    /// of a sandbox that is only ever spawned once.
    #[tracing::instrument(skip(policy), fields(network = policy.network))]
    pub fn create(policy: Policy) -> Result<Self> {
        let backend = NativeBackend::new(&policy)?;
        tracing::debug!(
            read_dirs = policy.read.len(),
            write_dirs = policy.write.len(),
            "sandbox: created"
        );
        Ok(Self {
            policy,
            backend,
            pid: -1,
            stdin_fd: -1,
            stdout_fd: -1,
            stderr_fd: -1,
            exited: false,
            exit_code: 0,
            destroyed: false,
            error: None,
        })
    }

    fn fail(&mut self, err: Error) -> Error {
        self.error = Some(err.to_string());
        err
    }

    /// Spawn `cmd` with `args` (not including `cmd` itself) under this
    /// sandbox's policy. `env`, if given, replaces the child's environment
    /// entirely; `None` means inherit the parent's environment verbatim.
    ///
    /// Preconditions are checked in the order the specification requires:
    /// context/command validity, not-already-spawned, path validation,
    /// backend artifact compilation, pipe allocation, then fork.
    #[tracing::instrument(skip(self, args, env), fields(cmd = cmd.as_ref()))]
    pub fn spawn(
        &mut self,
        cmd: impl AsRef<str>,
        args: &[impl AsRef<str>],
        env: Option<&[(String, String)]>,
    ) -> Result<()> {
        let cmd = cmd.as_ref();

        if self.destroyed {
            return Err(self.fail(Error::InvalidContext("sandbox already destroyed".to_string())));
        }
        if cmd.is_empty() {
            return Err(self.fail(Error::InvalidCommand("empty command".to_string())));
        }
        if self.pid != -1 {
            return Err(self.fail(Error::InvalidContext("already spawned".to_string())));
        }

        if let Err(e) = validate::validate_policy(&self.policy) {
            return Err(self.fail(e));
        }

        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();

        let handle = match self.spawn_platform(cmd, &args, env) {
            Ok(h) => h,
            Err(e) => return Err(self.fail(e)),
        };

        self.pid = handle.pid;
        self.stdin_fd = handle.stdin_fd;
        self.stdout_fd = handle.stdout_fd;
        self.stderr_fd = handle.stderr_fd;
        self.exited = false;

        tracing::debug!(pid = self.pid, "sandbox: spawned");
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn spawn_platform(
        &self,
        cmd: &str,
        args: &[String],
        env: Option<&[(String, String)]>,
    ) -> Result<spawn::ChildHandle> {
        let ruleset = self.backend.compile(&self.policy)?;
        spawn::fork_and_exec(cmd, args, env, ruleset, platform::linux::restrict_self_in_child)
    }

    #[cfg(target_os = "macos")]
    fn spawn_platform(
        &self,
        cmd: &str,
        args: &[String],
        env: Option<&[(String, String)]>,
    ) -> Result<spawn::ChildHandle> {
        // The profile was compiled once, eagerly, at `create` time; cloning
        // it here is just an owned-`CString` copy, not a recompile.
        let profile = self.backend.profile().clone();
        spawn::fork_and_exec(cmd, args, env, profile, |profile| {
            platform::macos::apply_in_child(&profile)
        })
    }

    /// The child's pid, or -1 if unspawned.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// The parent's write end of the child's stdin, or -1 if unspawned.
    pub fn stdin_fd(&self) -> i32 {
        self.stdin_fd
    }

    /// The parent's read end of the child's stdout, or -1 if unspawned.
    pub fn stdout_fd(&self) -> i32 {
        self.stdout_fd
    }

    /// The parent's read end of the child's stderr, or -1 if unspawned.
    pub fn stderr_fd(&self) -> i32 {
        self.stderr_fd
    }

    /// Block until the child exits. Idempotent: once reaped, returns the
    /// cached exit code on every subsequent call.
    ///
    /// The result is the child's own exit status if it exited normally, or
    /// `128 + signal` if it was terminated by a signal. Returns -1 and
    /// records an error if there is no child or the underlying wait fails.
    pub fn wait(&mut self) -> i32 {
        if self.pid < 0 {
            return -1;
        }
        if self.exited {
            return self.exit_code;
        }

        match nix::sys::wait::waitpid(nix::unistd::Pid::from_raw(self.pid), None) {
            Ok(nix::sys::wait::WaitStatus::Exited(_, code)) => {
                self.exited = true;
                self.exit_code = code;
                tracing::debug!(pid = self.pid, exit_code = code, "sandbox: child exited");
                self.exit_code
            }
            Ok(nix::sys::wait::WaitStatus::Signaled(_, signal, _)) => {
                self.exited = true;
                self.exit_code = 128 + signal as i32;
                tracing::debug!(
                    pid = self.pid,
                    signal = signal as i32,
                    "sandbox: child terminated by signal"
                );
                self.exit_code
            }
            Ok(other) => {
                self.error = Some(format!("waitpid: unexpected status {other:?}"));
                tracing::warn!(pid = self.pid, status = ?other, "sandbox: unexpected wait status");
                -1
            }
            Err(e) => {
                self.error = Some(format!("waitpid: {e}"));
                tracing::warn!(pid = self.pid, error = %e, "sandbox: waitpid failed");
                -1
            }
        }
    }

    /// Send `signal` to the child if it is still alive.
    ///
    /// Returns -1 and records an error if there is no child, the child has
    /// already been reaped, or the signal delivery itself fails. Returns 0
    /// on success.
    pub fn kill(&mut self, signal: i32) -> i32 {
        if self.pid < 0 || self.exited {
            self.error = Some("kill: no live child".to_string());
            tracing::warn!(pid = self.pid, "sandbox: kill on no live child");
            return -1;
        }

        let signal = match nix::sys::signal::Signal::try_from(signal) {
            Ok(s) => s,
            Err(e) => {
                self.error = Some(format!("kill: invalid signal {signal}: {e}"));
                tracing::warn!(pid = self.pid, signal, "sandbox: invalid signal");
                return -1;
            }
        };

        match nix::sys::signal::kill(nix::unistd::Pid::from_raw(self.pid), signal) {
            Ok(()) => {
                tracing::debug!(pid = self.pid, signal = signal as i32, "sandbox: signal sent");
                0
            }
            Err(e) => {
                self.error = Some(format!("kill: {e}"));
                tracing::warn!(pid = self.pid, error = %e, "sandbox: kill failed");
                -1
            }
        }
    }

    /// Idempotent terminal teardown. If the child is still running, it is
    /// forcibly killed and reaped. All open pipe descriptors are closed.
    /// Safe to call multiple times and safe to call without ever spawning.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        if self.pid > 0 && !self.exited {
            tracing::debug!(pid = self.pid, "sandbox: killing still-running child on destroy");
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(self.pid),
                nix::sys::signal::Signal::SIGKILL,
            );
            let _ = nix::sys::wait::waitpid(nix::unistd::Pid::from_raw(self.pid), None);
            self.exited = true;
        }

        for fd in [self.stdin_fd, self.stdout_fd, self.stderr_fd] {
            if fd >= 0 {
                unsafe {
                    libc::close(fd);
                }
            }
        }
        self.stdin_fd = -1;
        self.stdout_fd = -1;
        self.stderr_fd = -1;

        tracing::debug!(pid = self.pid, "sandbox: destroyed");
    }

    /// The most recent error's detail message, or `None` if there has been
    /// no error since construction.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_is_negative_before_spawn() {
        if let Ok(sandbox) = Sandbox::create(Policy::default()) {
            assert_eq!(sandbox.pid(), -1);
            assert_eq!(sandbox.stdin_fd(), -1);
            assert_eq!(sandbox.stdout_fd(), -1);
            assert_eq!(sandbox.stderr_fd(), -1);
        }
    }

    #[test]
    fn destroy_is_idempotent_without_spawn() {
        if let Ok(mut sandbox) = Sandbox::create(Policy::default()) {
            sandbox.destroy();
            sandbox.destroy();
            assert_eq!(sandbox.pid(), -1);
        }
    }

    #[test]
    fn wait_without_spawn_returns_negative_one() {
        if let Ok(mut sandbox) = Sandbox::create(Policy::default()) {
            assert_eq!(sandbox.wait(), -1);
        }
    }

    #[test]
    fn kill_without_spawn_returns_negative_one() {
        if let Ok(mut sandbox) = Sandbox::create(Policy::default()) {
            assert_eq!(sandbox.kill(libc::SIGTERM), -1);
        }
    }

    #[test]
    fn spawn_rejects_empty_command() {
        if let Ok(mut sandbox) = Sandbox::create(Policy::default()) {
            let args: &[&str] = &[];
            let err = sandbox.spawn("", args, None).unwrap_err();
            assert_eq!(err.kind_name(), "INVALID_COMMAND");
        }
    }

    #[test]
    fn spawn_rejects_nonexistent_write_dir() {
        if let Ok(mut sandbox) = Sandbox::create(Policy {
            write: vec!["/nonexistent/stevelock/sandbox/test".into()],
            ..Default::default()
        }) {
            let args: &[&str] = &["--code", "0"];
            let err = sandbox.spawn("status", args, None).unwrap_err();
            assert_eq!(err.kind_name(), "INVALID_SCOPE");
        }
    }
}
