use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use filex_peer::protocol::render_listing;
use filex_peer::{ClientStatus, ServerStatus};
use filex_store::Listing;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Raw
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    message: &'a str,
    error: bool,
    timestamp: String,
}

#[derive(Serialize)]
struct ListingOutput<'a> {
    files: &'a [String],
    count: usize,
}

pub fn print_message(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                message,
                error: message.starts_with("Error:"),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => println!("{message}"),
    }
}

pub fn print_listing(listing: &Listing, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let files = listing.names();
            print_json(&ListingOutput {
                files,
                count: files.len(),
            });
        }
        OutputFormat::Table => {
            if listing.is_empty() {
                println!("{}", render_listing(listing));
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FILE"]);
            for name in listing.names() {
                table.add_row(vec![name.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("Files in server:\n{}", render_listing(listing)),
        OutputFormat::Raw => println!("{}", render_listing(listing)),
    }
}

pub fn print_client_status(status: &ClientStatus, format: OutputFormat) {
    let handle = status.handle.as_deref().unwrap_or("-");
    let server = status
        .server
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    match format {
        OutputFormat::Json => print_json(status),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STATE", "HANDLE", "SERVER"])
                .add_row(vec![state_name(status).to_string(), handle.to_string(), server]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "state={} handle={} server={}",
                state_name(status),
                handle,
                server
            );
        }
        OutputFormat::Raw => println!("{}", state_name(status)),
    }
}

pub fn print_server_status(status: &ServerStatus, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(status),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "USERS", "USER LIST"])
                .add_row(vec![
                    status.address.to_string(),
                    status.user_count.to_string(),
                    status.user_list.join("\n"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "address={} users={} list=[{}]",
                status.address,
                status.user_count,
                status.user_list.join(", ")
            );
        }
        OutputFormat::Raw => println!("{}", status.address),
    }
}

fn state_name(status: &ClientStatus) -> &'static str {
    match (status.connected, status.registered) {
        (false, _) => "disconnected",
        (true, false) => "connected",
        (true, true) => "registered",
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
