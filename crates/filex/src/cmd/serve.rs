use filex_frame::FrameConfig;
use filex_peer::{AddressKey, FileServer, ServerConfig, ServerHandle};
use filex_store::FileStore;

use crate::cmd::ServeArgs;
use crate::exit::{peer_error, store_error, CliError, CliResult, SUCCESS};
use crate::output::{print_server_status, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let store = FileStore::create(&args.storage_root)
        .map_err(|err| store_error("storage root unavailable", err))?;

    let config = ServerConfig {
        frame: FrameConfig {
            max_body_size: args.max_body_size,
            ..FrameConfig::default()
        },
        address_key: if args.one_per_host {
            AddressKey::Ip
        } else {
            AddressKey::SocketAddr
        },
    };
    let server = FileServer::with_config(args.bind.as_str(), store, config)
        .map_err(|err| peer_error("bind failed", err))?;

    install_ctrlc_handler(server.handle())?;
    print_server_status(&server.status(), format);

    server
        .serve()
        .map_err(|err| peer_error("accept failed", err))?;

    print_server_status(&server.status(), format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(handle: ServerHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        tracing::info!("shutdown requested");
        handle.shutdown();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
