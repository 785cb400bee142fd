use std::io::BufRead;

use filex_peer::{Dispatcher, DispatcherConfig, LogSink};
use filex_store::Listing;

use crate::cmd::ShellArgs;
use crate::exit::{io_error, peer_error, CliResult, SUCCESS};
use crate::output::{print_client_status, print_listing, print_message, OutputFormat};

/// Local-only command that prints the client status.
const STATUS: &str = "/status";

struct StdoutSink {
    format: OutputFormat,
}

impl LogSink for StdoutSink {
    fn log(&self, message: &str) {
        print_message(message, self.format);
    }

    fn listing(&self, listing: &Listing) {
        print_listing(listing, self.format);
    }
}

pub fn run(args: ShellArgs, format: OutputFormat) -> CliResult<i32> {
    let config = DispatcherConfig {
        download_dir: args.download_dir,
        ..DispatcherConfig::default()
    };
    let mut dispatcher = Dispatcher::with_config(StdoutSink { format }, config);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| io_error("failed to read command", err))?;
        let line = line.trim();

        if line == STATUS {
            print_client_status(&dispatcher.status(), format);
            continue;
        }

        if let Err(err) = dispatcher.execute(line) {
            tracing::debug!(command = line, error = %err, "command failed");
            if args.fail_fast {
                return Err(peer_error("command failed", err));
            }
        }
    }

    Ok(SUCCESS)
}
