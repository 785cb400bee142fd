use std::path::{Path, PathBuf};

use filex_store::FileStore;
use filex_transport::TcpTransport;
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

const PROBE_NAME: &str = ".filex-doctor-probe";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        loopback_bind_check(),
        temp_store_check(),
        storage_root_check(&args.storage_root),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("filex doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
    }
}

fn loopback_bind_check() -> CheckResult {
    match TcpTransport::bind("127.0.0.1:0") {
        Ok(listener) => CheckResult::new(
            "loopback_bind",
            CheckStatus::Pass,
            format!("bound {}", listener.local_addr()),
        ),
        Err(err) => CheckResult::new("loopback_bind", CheckStatus::Fail, err.to_string()),
    }
}

fn temp_store_check() -> CheckResult {
    let root = std::env::temp_dir().join(format!(
        "filex-doctor-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ));
    let result = FileStore::create(&root).and_then(|store| probe_store(&store));
    let _ = std::fs::remove_dir_all(&root);

    match result {
        Ok(()) => CheckResult::new(
            "temp_store",
            CheckStatus::Pass,
            "write/read/list in temp dir succeeded",
        ),
        Err(err) => CheckResult::new("temp_store", CheckStatus::Fail, err.to_string()),
    }
}

fn storage_root_check(root: &Path) -> CheckResult {
    if !root.exists() {
        return CheckResult::new(
            "storage_root",
            CheckStatus::Warn,
            format!("{} does not exist; serve will create it", root.display()),
        );
    }

    let result = FileStore::open(root).and_then(|store| {
        let probed = probe_store(&store);
        let _ = std::fs::remove_file(store.root().join(PROBE_NAME));
        probed
    });
    match result {
        Ok(()) => CheckResult::new(
            "storage_root",
            CheckStatus::Pass,
            format!("{} is writable", display_root(root)),
        ),
        Err(err) => CheckResult::new("storage_root", CheckStatus::Fail, err.to_string()),
    }
}

fn probe_store(store: &FileStore) -> filex_store::Result<()> {
    store.write(PROBE_NAME, b"probe")?;
    store.read(PROBE_NAME)?;
    store.list()?;
    Ok(())
}

fn display_root(root: &Path) -> String {
    std::fs::canonicalize(root)
        .unwrap_or_else(|_| PathBuf::from(root))
        .display()
        .to_string()
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "peer") {
        features.push("peer");
    }
    if cfg!(feature = "async") {
        features.push("async");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult::new("compiled_features", CheckStatus::Info, features.join(", "))
}
