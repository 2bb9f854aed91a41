//! Exec target for exercising sandboxes in tests: a grab-bag of tiny
//! subcommands that each probe one filesystem or network operation and
//! report the result through a distinguished exit code, rather than
//! through stdout text that a test would have to parse.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stevelock-testbox")]
struct Cli {
    /// Emit `tracing` spans/events to stderr instead of staying silent.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Exit with the given code.
    Status {
        #[arg(long, default_value_t = 0)]
        code: u8,
    },
    /// Write each positional argument to stdout, joined by `--sep`.
    Echo {
        #[arg(long, default_value = "")]
        sep: String,
        words: Vec<String>,
    },
    /// Copy stdin to stdout.
    Cat,
    /// Copy stdin to the file at `--path`, creating or truncating it.
    WriteFile {
        #[arg(short, long)]
        path: String,
    },
    /// Copy the file at `--path` to stdout.
    ReadFile {
        #[arg(short, long)]
        path: String,
    },
    /// Print `KEY=value` for the environment variable named by `--key`.
    PrintEnv {
        #[arg(short, long)]
        key: String,
    },
    /// Delete the file at `--path`.
    RemoveFile {
        #[arg(short, long)]
        path: String,
    },
    /// Delete the empty directory at `--path`.
    RemoveDir {
        #[arg(short, long)]
        path: String,
    },
    /// Rename `--from` to `--to`.
    MovePath {
        #[arg(short, long)]
        from: String,
        #[arg(short, long)]
        to: String,
    },
    /// Hardlink `--from` to `--to`.
    Hardlink {
        #[arg(short, long)]
        from: String,
        #[arg(short, long)]
        to: String,
    },
    /// Sleep for `--ms` milliseconds, or forever if omitted/zero.
    Sleep {
        #[arg(long, default_value_t = 0)]
        ms: u64,
    },
    /// Write fixed text to stdout and/or stderr.
    Emit {
        #[arg(long)]
        stdout: Option<String>,
        #[arg(long)]
        stderr: Option<String>,
    },
    /// Probe a denied-vs-allowed network operation.
    Probe {
        #[command(subcommand)]
        kind: ProbeKind,
    },
}

#[derive(Subcommand)]
enum ProbeKind {
    /// Attempt to connect to a local port nothing is listening on.
    ///
    /// Distinguishes "sandbox denied the syscall" (exit 10) from "syscall
    /// was permitted but nothing answered" (exit 0) from anything else
    /// (exit 11). A test observes exit 10 under a network-denying policy
    /// and 0 under a network-allowing one.
    Connect,
    /// Attempt to bind an ephemeral local port.
    Bind,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stevelock_testbox=debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    ExitCode::from(run(cli.command))
}

fn run(command: Command) -> u8 {
    tracing::debug!("running subcommand");
    match command {
        Command::Status { code } => code,
        Command::Echo { sep, words } => {
            let mut stdout = std::io::stdout();
            for (i, word) in words.iter().enumerate() {
                if i > 0 {
                    let _ = stdout.write_all(sep.as_bytes());
                }
                let _ = stdout.write_all(word.as_bytes());
            }
            0
        }
        Command::Cat => copy_stdin_to(&mut std::io::stdout()).unwrap_or(2),
        Command::WriteFile { path } => match std::fs::File::create(&path) {
            Ok(mut file) => copy_stdin_to(&mut file).unwrap_or(6),
            Err(_) => 4,
        },
        Command::ReadFile { path } => match std::fs::File::open(&path) {
            Ok(mut file) => {
                let mut buf = Vec::new();
                if file.read_to_end(&mut buf).is_err() {
                    return 11;
                }
                match std::io::stdout().write_all(&buf) {
                    Ok(()) => 0,
                    Err(_) => 12,
                }
            }
            Err(_) => 10,
        },
        Command::PrintEnv { key } => match std::env::var(&key) {
            Ok(value) => {
                print!("{key}={value}");
                0
            }
            Err(_) => 8,
        },
        Command::RemoveFile { path } => {
            if std::fs::remove_file(&path).is_ok() {
                0
            } else {
                14
            }
        }
        Command::RemoveDir { path } => {
            if std::fs::remove_dir(&path).is_ok() {
                0
            } else {
                16
            }
        }
        Command::MovePath { from, to } => {
            if std::fs::rename(&from, &to).is_ok() {
                0
            } else {
                18
            }
        }
        Command::Hardlink { from, to } => {
            if std::fs::hard_link(&from, &to).is_ok() {
                0
            } else {
                20
            }
        }
        Command::Sleep { ms } => {
            if ms == 0 {
                loop {
                    std::thread::sleep(std::time::Duration::from_secs(1));
                }
            }
            std::thread::sleep(std::time::Duration::from_millis(ms));
            0
        }
        Command::Emit { stdout, stderr } => {
            if let Some(text) = stdout {
                print!("{text}");
            }
            if let Some(text) = stderr {
                eprint!("{text}");
            }
            0
        }
        Command::Probe { kind } => match kind {
            ProbeKind::Connect => probe_connect(),
            ProbeKind::Bind => probe_bind(),
        },
    }
}

fn copy_stdin_to(sink: &mut impl Write) -> std::io::Result<u8> {
    let mut buf = [0u8; 4096];
    let mut stdin = std::io::stdin();
    loop {
        let n = stdin.read(&mut buf)?;
        if n == 0 {
            return Ok(0);
        }
        sink.write_all(&buf[..n])?;
    }
}

/// Nothing listens on 127.0.0.1:9 (the standard "discard" port, reserved
/// and never bound in practice). A permitted connect attempt fails with
/// `ECONNREFUSED` or similar; a sandbox-denied one fails with `EACCES`/
/// `EPERM` before the kernel even attempts the three-way handshake.
fn probe_connect() -> u8 {
    match TcpStream::connect("127.0.0.1:9") {
        Ok(_) => 0,
        Err(e) => match e.raw_os_error() {
            Some(code) if code == libc::EACCES || code == libc::EPERM => 10,
            Some(code)
                if code == libc::ECONNREFUSED
                    || code == libc::ETIMEDOUT
                    || code == libc::ENETUNREACH
                    || code == libc::EHOSTUNREACH =>
            {
                0
            }
            _ => 11,
        },
    }
}

fn probe_bind() -> u8 {
    match TcpListener::bind("127.0.0.1:0") {
        Ok(_) => 0,
        Err(e) => match e.raw_os_error() {
            Some(code) if code == libc::EACCES || code == libc::EPERM => 10,
            _ => 11,
        },
    }
}
