use clap::{Args, Subcommand};
use std::path::PathBuf;

use filex_frame::DEFAULT_MAX_BODY;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod doctor;
pub mod serve;
pub mod shell;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the file exchange server.
    Serve(ServeArgs),
    /// Read client commands from stdin and run them against a server.
    Shell(ShellArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Shell(args) => shell::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "FILEX_BIND", default_value = "127.0.0.1:12345")]
    pub bind: String,
    /// Directory holding stored files. Created if missing.
    #[arg(long, value_name = "DIR", env = "FILEX_STORAGE_ROOT", default_value = "server_files")]
    pub storage_root: PathBuf,
    /// Allow one connection per client host instead of per source address.
    #[arg(long)]
    pub one_per_host: bool,
    /// Largest accepted upload in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_BODY)]
    pub max_body_size: usize,
}

#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Directory that fetched files are written to.
    #[arg(long, value_name = "DIR", env = "FILEX_DOWNLOAD_DIR", default_value = ".")]
    pub download_dir: PathBuf,
    /// Stop at the first failed command and exit non-zero.
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Storage root to check.
    #[arg(long, value_name = "DIR", env = "FILEX_STORAGE_ROOT", default_value = "server_files")]
    pub storage_root: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
