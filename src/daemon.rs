//! Background process management for the proxy server.
//!
//! The PID file always names the process that serves requests, so `status`
//! and `stop` act on the server itself.

#[cfg(unix)]
use daemonize::Daemonize;
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::{Pid, System};

const PID_FILE: &str = "server.pid";
const LOG_FILE: &str = "server.log";

/// Detaches from the terminal and runs `serve` in the detached process.
///
/// On Unix the calling process exits once the daemon is up, so this must run
/// before any async runtime is started. On Windows the server is relaunched
/// as a hidden child running `server run`.
pub fn start_server<F>(serve: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    let pid_file = pid_path()?;
    if is_running_at(&pid_file)? {
        println!("Server is already running with PID {}.", read_pid(&pid_file)?);
        return Ok(());
    }
    let log_path = pid_file.with_file_name(LOG_FILE);
    let log = fs::OpenOptions::new().create(true).append(true).open(&log_path)?;
    println!("Starting server in the background, logging to {}", log_path.display());
    detach(&pid_file, log, serve)
}

#[cfg(unix)]
fn detach<F>(pid_file: &Path, log: fs::File, serve: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    Daemonize::new()
        .pid_file(pid_file)
        .working_directory(std::env::current_dir()?)
        .stdout(log.try_clone()?)
        .stderr(log)
        .start()
        .map_err(|e| anyhow::anyhow!("failed to daemonize: {}", e))?;

    // Only the detached process gets here.
    serve()
}

#[cfg(windows)]
fn detach<F>(pid_file: &Path, log: fs::File, _serve: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    use std::os::windows::process::CommandExt;
    use std::process::{Command, Stdio};
    const CREATE_NO_WINDOW: u32 = 0x08000000;

    let child = Command::new(std::env::current_exe()?)
        .args(["server", "run"])
        .stdin(Stdio::null())
        .stdout(log.try_clone()?)
        .stderr(log)
        .creation_flags(CREATE_NO_WINDOW)
        .spawn()?;
    fs::write(pid_file, child.id().to_string())?;
    println!("Server started with PID {}.", child.id());
    Ok(())
}

/// Kills the background server and removes its PID file.
pub fn stop_server() -> anyhow::Result<()> {
    let pid_file = pid_path()?;
    if !pid_file.exists() {
        println!("Server is not running (no PID file).");
        return Ok(());
    }

    let pid = read_pid(&pid_file)?;
    let mut system = System::new();
    system.refresh_processes();
    match system.process(Pid::from_u32(pid)) {
        Some(process) if process.kill() => println!("Stopped server process {}.", pid),
        Some(_) => anyhow::bail!("could not signal server process {}", pid),
        None => println!("Process {} is gone, removing the stale PID file.", pid),
    }
    fs::remove_file(&pid_file)?;
    Ok(())
}

pub fn check_status() -> anyhow::Result<()> {
    let pid_file = pid_path()?;
    if is_running_at(&pid_file)? {
        println!("Server is running with PID {}.", read_pid(&pid_file)?);
    } else {
        println!("Server is not running.");
    }
    Ok(())
}

fn pid_path() -> anyhow::Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("id", "AdaAPI", "ada-api")
        .ok_or_else(|| anyhow::anyhow!("Could not find a valid project directory"))?;
    let data_dir = project_dirs.data_local_dir();
    fs::create_dir_all(data_dir)?;
    Ok(data_dir.join(PID_FILE))
}

pub fn read_pid(pid_file: &Path) -> anyhow::Result<u32> {
    let raw = fs::read_to_string(pid_file)?;
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("malformed PID file {}: {}", pid_file.display(), e))
}

/// True when `pid_file` exists and names a live process.
pub fn is_running_at(pid_file: &Path) -> anyhow::Result<bool> {
    if !pid_file.exists() {
        return Ok(false);
    }
    let pid = read_pid(pid_file)?;
    let mut system = System::new();
    system.refresh_processes();
    Ok(system.process(Pid::from_u32(pid)).is_some())
}
