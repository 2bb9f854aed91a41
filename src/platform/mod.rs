//! Platform-specific policy compilation and enforcement.
//!
//! Each backend owns two things: a *platform artifact*, computed once at
//! [`Sandbox::create`](crate::Sandbox::create) time (the negotiated
//! Landlock ABI on Linux; the compiled SBPL profile on macOS), and a
//! *ruleset*, recompiled from the policy on every [`spawn`](crate::Sandbox::spawn)
//! and installed in the forked child before `execve`.

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub(crate) use linux::LinuxBackend as NativeBackend;

#[cfg(target_os = "macos")]
pub(crate) use macos::MacOSBackend as NativeBackend;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
compile_error!("stevelock only supports Linux (Landlock) and macOS (Seatbelt)");
