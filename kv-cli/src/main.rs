use std::env;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::info;

use kv::config::Config;
use kv::mvcc::store::MVCCStore;
use kv::region::{Epoch, Region};
use kv::registry::RegionRegistry;
use kv::server::Server;
use kv::storage::memory::Memory;

use kvcli::config::ConfigLoad;
use kvcli::trace;

#[derive(Debug, Parser, PartialEq)]
#[command(version, author, about)]
pub struct Args {
    #[clap(short, long, help = "debug model")]
    debug: bool,

    /// Configuration file path, default 'config/kvdb.toml'
    #[clap(
        short = 'c',
        long = "config",
        help = "Configuration file path",
        default_value = "config/kvdb.toml"
    )]
    config: String,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_hooks();

    eprintln!();
    eprintln!("██  ██  █        █");
    eprintln!("██ ██   ██      ██");
    eprintln!("███      ██    ██");
    eprintln!("██ ██     ██  ██");
    eprintln!("██  ██     ████  KV Storage Node");
    eprintln!();

    let args = Args::parse();
    if args.debug {
        println!("{:?}", args);
    }

    let log_dir =
        format!("{}/.kvcli", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()));
    let _guards = trace::init_logging(&log_dir, &args.log_level).await?;
    info!("kvcli start args: {:?}", &args);

    let cfg = match ConfigLoad::new(&args.config) {
        Ok(c) => c,
        Err(err) => {
            log::warn!("failed to load config at {}: {err}; using defaults", &args.config);
            ConfigLoad::default()
        }
    };
    info!("kvcli start config: {:?}", &cfg);
    let local_store_id = cfg.local_store_id();
    let kv_config: Config = cfg.into_kv_config();

    let registry = Arc::new(RegionRegistry::new(local_store_id));
    registry.insert(Region::new(
        1,
        vec![],
        vec![],
        Epoch { version: 1, conf_version: 1 },
        local_store_id,
        true,
    ));

    let store = MVCCStore::new(Memory::new());
    let server = Arc::new(Server::new(store, registry, kv_config));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let stop_server = server.clone();
    ctrlc::set_handler(move || {
        println!("received Ctrl+C!");
        r.store(false, Ordering::SeqCst);
        stop_server.stop();
    })
    .expect("Error setting Ctrl-C handler");

    info!("kvcli serving with local_store_id={}", local_store_id);
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    info!("kvcli shutting down, in_flight={}", server.in_flight());
    Ok(())
}

fn setup_panic_hooks() {
    let meta = human_panic::Metadata {
        version: env!("CARGO_PKG_VERSION").into(),
        name: env!("CARGO_PKG_NAME").into(),
        authors: env!("CARGO_PKG_AUTHORS").replace(':', ", ").into(),
        homepage: env!("CARGO_PKG_HOMEPAGE").into(),
    };

    let default_hook = panic::take_hook();

    if env::var("RUST_BACKTRACE").is_err() {
        panic::set_hook(Box::new(move |info: &panic::PanicInfo| {
            default_hook(info);

            let file_path = human_panic::handle_dump(&meta, info);
            human_panic::print_msg(file_path, &meta)
                .expect("human-panic: printing error message to console failed");
        }));
    }
}
