//! stevelock — a synchronous process sandboxing core.
//!
//! Confines a child process's filesystem and network access using each
//! platform's native sandboxing primitive: Landlock on Linux, Seatbelt on
//! macOS. There is no userspace policy engine and no interception of
//! syscalls at runtime — the kernel (or, on macOS, the Seatbelt MAC
//! framework) enforces the policy for the lifetime of the child.
//!
//! # Example
//!
//! ```no_run
//! use stevelock::{Policy, Sandbox};
//!
//! fn run_sandboxed() -> stevelock::Result<()> {
//!     let policy = Policy::builder()
//!         .read_dir("/usr")
//!         .write_dir("/tmp/work")
//!         .network(false)
//!         .build();
//!
//!     let mut sandbox = Sandbox::create(policy)?;
//!     let args: &[&str] = &["hello from stevelock"];
//!     sandbox.spawn("echo", args, None)?;
//!     let code = sandbox.wait();
//!     println!("child exited with {code}");
//!     Ok(())
//! }
//! ```
//!
//! A sandbox context is single-use: it spawns at most one child, and its
//! policy is fixed at construction. Run a new policy by creating a new
//! [`Sandbox`].

mod error;
mod platform;
mod policy;
mod sandbox;
mod spawn;
mod validate;

pub use error::{Error, Result, ScopeKind};
pub use policy::{Policy, PolicyBuilder, Scope};
pub use sandbox::Sandbox;
