//! The spawn engine: pipe allocation, fork, and the pre-exec child sequence.
//!
//! Shared across both platform backends — only the "install the compiled
//! policy artifact onto the current process" step differs between Linux
//! and macOS, so it is injected as a closure rather than duplicated.

use std::ffi::{CStr, CString};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

use crate::error::{Error, Result};

/// Descriptors and pid recorded after a successful spawn.
pub(crate) struct ChildHandle {
    pub pid: i32,
    pub stdin_fd: i32,
    pub stdout_fd: i32,
    pub stderr_fd: i32,
}

struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

fn make_pipe() -> Result<Pipe> {
    let (read, write) =
        nix::unistd::pipe().map_err(|e| Error::Pipe(format!("pipe: {e}")))?;
    Ok(Pipe { read, write })
}

/// Fork a child that wires `stdin_pipe`/`stdout_pipe`/`stderr_pipe` onto its
/// standard descriptors, installs the compiled policy artifact via
/// `install`, then `execve`s `cmd` with `args` and `env`.
///
/// `install` and everything it touches must have been fully prepared before
/// this call. Every byte the child might need — the argv/envp `CString`s
/// *and* their null-terminated pointer arrays — is built here, in the
/// parent, before `fork`: building the pointer arrays after `fork` (as
/// `Vec::collect`) would allocate in the child, which is not
/// async-signal-safe.
pub(crate) fn fork_and_exec<A>(
    cmd: &str,
    args: &[String],
    env: Option<&[(String, String)]>,
    artifact: A,
    install: impl FnOnce(A) -> std::result::Result<(), String>,
) -> Result<ChildHandle> {
    if cmd.is_empty() {
        return Err(Error::InvalidCommand("empty command".to_string()));
    }

    let cmd_cstring =
        CString::new(cmd).map_err(|_| Error::InvalidCommand("command contains NUL".to_string()))?;
    let mut argv: Vec<CString> = Vec::with_capacity(args.len() + 1);
    argv.push(cmd_cstring.clone());
    for arg in args {
        argv.push(
            CString::new(arg.as_str())
                .map_err(|_| Error::InvalidCommand("argument contains NUL".to_string()))?,
        );
    }

    let envp: Option<Vec<CString>> = match env {
        Some(pairs) => {
            let mut out = Vec::with_capacity(pairs.len());
            for (key, val) in pairs {
                out.push(
                    CString::new(format!("{key}={val}"))
                        .map_err(|_| Error::InvalidCommand("environment entry contains NUL".to_string()))?,
                );
            }
            Some(out)
        }
        None => None,
    };

    // Null-terminated pointer arrays, built now so the child never needs to
    // allocate one after `fork`.
    let argv_ptrs = build_exec_argv(&argv);
    let envp_ptrs = envp.as_deref().map(build_exec_argv);

    let stdin_pipe = make_pipe()?;
    let stdout_pipe = make_pipe()?;
    let stderr_pipe = make_pipe()?;

    match unsafe { nix::unistd::fork() } {
        Err(e) => Err(Error::Fork(format!("fork: {e}"))),
        Ok(nix::unistd::ForkResult::Child) => child_branch(
            stdin_pipe,
            stdout_pipe,
            stderr_pipe,
            &argv[0],
            &argv_ptrs,
            envp_ptrs.as_deref(),
            artifact,
            install,
        ),
        Ok(nix::unistd::ForkResult::Parent { child }) => {
            // Close the child's ends; keep ours. The kept ends are handed to
            // the caller as raw descriptors, so they must be released from
            // `OwnedFd`'s closing `Drop` with `into_raw_fd` rather than
            // merely inspected with `as_raw_fd` — otherwise the fd each
            // struct still owns closes the moment this pipe goes out of
            // scope, invalidating the very number just returned.
            drop(stdin_pipe.read);
            drop(stdout_pipe.write);
            drop(stderr_pipe.write);

            Ok(ChildHandle {
                pid: child.as_raw(),
                stdin_fd: stdin_pipe.write.into_raw_fd(),
                stdout_fd: stdout_pipe.read.into_raw_fd(),
                stderr_fd: stderr_pipe.read.into_raw_fd(),
            })
        }
    }
}

/// The forked child: dup2 the pipe ends onto 0/1/2, install the backend
/// artifact, then exec. Never returns: exits 126 on install failure, 127 on
/// exec failure.
///
/// `argv_ptrs`/`envp_ptrs` are already-built, already-null-terminated
/// pointer arrays — no allocation happens in this function on the success
/// path, nor on either failure path (see [`child_diagnostic`]).
fn child_branch<A>(
    stdin_pipe: Pipe,
    stdout_pipe: Pipe,
    stderr_pipe: Pipe,
    argv0: &CString,
    argv_ptrs: &[*const libc::c_char],
    envp_ptrs: Option<&[*const libc::c_char]>,
    artifact: A,
    install: impl FnOnce(A) -> std::result::Result<(), String>,
) -> ! {
    unsafe {
        libc::dup2(stdin_pipe.read.as_raw_fd(), libc::STDIN_FILENO);
        libc::dup2(stdout_pipe.write.as_raw_fd(), libc::STDOUT_FILENO);
        libc::dup2(stderr_pipe.write.as_raw_fd(), libc::STDERR_FILENO);
    }
    for fd in [
        stdin_pipe.read.as_raw_fd(),
        stdin_pipe.write.as_raw_fd(),
        stdout_pipe.read.as_raw_fd(),
        stdout_pipe.write.as_raw_fd(),
        stderr_pipe.read.as_raw_fd(),
        stderr_pipe.write.as_raw_fd(),
    ] {
        close_if_not_std(fd);
    }

    if let Err(message) = install(artifact) {
        child_diagnostic("sandbox install failed: ", message.as_bytes());
        unsafe { libc::_exit(126) };
    }

    let result = match envp_ptrs {
        Some(envp_ptrs) => unsafe {
            libc::execve(argv0.as_ptr(), argv_ptrs.as_ptr(), envp_ptrs.as_ptr())
        },
        None => unsafe { libc::execve(argv0.as_ptr(), argv_ptrs.as_ptr(), environ_ptr()) },
    };
    debug_assert_eq!(result, -1);

    // `strerror` reads into a statically-allocated buffer owned by libc,
    // not the Rust allocator; unlike `io::Error`'s `Display`, forming this
    // message performs no heap allocation.
    let errno = std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(0);
    let detail = unsafe { CStr::from_ptr(libc::strerror(errno)) };
    child_diagnostic("execve failed: ", detail.to_bytes());
    unsafe { libc::_exit(127) };
}

/// Build a null-terminated pointer array over `strings`. Called only in the
/// parent, before `fork` — the returned `Vec` is handed across the fork
/// boundary by reference, never rebuilt in the child.
fn build_exec_argv(strings: &[CString]) -> Vec<*const libc::c_char> {
    let mut ptrs: Vec<*const libc::c_char> = strings.iter().map(|s| s.as_ptr()).collect();
    ptrs.push(std::ptr::null());
    ptrs
}

unsafe extern "C" {
    #[link_name = "environ"]
    static environ_raw: *const *const libc::c_char;
}

fn environ_ptr() -> *const *const libc::c_char {
    unsafe { environ_raw }
}

fn close_if_not_std(fd: RawFd) {
    if fd > libc::STDERR_FILENO {
        unsafe {
            libc::close(fd);
        }
    }
}

/// Write `prefix` then `detail` then a trailing newline to stderr, as three
/// separate raw `write(2)` calls. No `format!`, no `String` concatenation:
/// `detail` is already-owned bytes (the `install` closure's own error
/// string, or a `CStr` view borrowed from libc's `strerror` buffer), so
/// this function performs no allocation in the child between `fork` and
/// `execve`.
fn child_diagnostic(prefix: &str, detail: &[u8]) {
    write_stderr(prefix.as_bytes());
    write_stderr(detail);
    write_stderr(b"\n");
}

fn write_stderr(bytes: &[u8]) {
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            bytes.as_ptr() as *const libc::c_void,
            bytes.len(),
        );
    }
}
