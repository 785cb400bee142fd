mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "filex", version, about = "Multi-client file exchange over TCP")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["filex", "serve"]).expect("serve args should parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        if std::env::var_os("FILEX_BIND").is_none() {
            assert_eq!(args.bind, "127.0.0.1:12345");
        }
        if std::env::var_os("FILEX_STORAGE_ROOT").is_none() {
            assert_eq!(args.storage_root, PathBuf::from("server_files"));
        }
        assert!(!args.one_per_host);
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "filex",
            "serve",
            "--bind",
            "0.0.0.0:9000",
            "--storage-root",
            "/srv/files",
            "--one-per-host",
            "--max-body-size",
            "4096",
        ])
        .expect("serve args should parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind, "0.0.0.0:9000");
        assert_eq!(args.storage_root, PathBuf::from("/srv/files"));
        assert!(args.one_per_host);
        assert_eq!(args.max_body_size, 4096);
    }

    #[test]
    fn parses_shell_with_global_flags() {
        let cli = Cli::try_parse_from([
            "filex",
            "shell",
            "--download-dir",
            "/tmp/dl",
            "--format",
            "json",
            "--log-level",
            "warn",
        ])
        .expect("shell args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        let Command::Shell(args) = cli.command else {
            panic!("expected shell");
        };
        assert_eq!(args.download_dir, PathBuf::from("/tmp/dl"));
        assert!(!args.fail_fast);
    }

    #[test]
    fn rejects_unknown_output_format() {
        let err = Cli::try_parse_from(["filex", "--format", "xml", "version"])
            .expect_err("unknown format should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
