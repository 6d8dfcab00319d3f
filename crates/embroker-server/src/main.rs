//! embroker - a small-footprint MQTT broker.

use log::{error, info};

use embroker_server::config::{Config, DEFAULT_CONFIG_FILE};
use embroker_server::Server;

struct Args {
    config_path: String,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = DEFAULT_CONFIG_FILE.to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    config_path = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: -c requires a file path");
                    std::process::exit(1);
                }
            }
            "-h" | "--help" => {
                println!("embroker - small-footprint MQTT broker");
                println!();
                println!("Usage: embroker [OPTIONS]");
                println!();
                println!("Options:");
                println!(
                    "  -c, --config <FILE>     Config file path (default: {})",
                    DEFAULT_CONFIG_FILE
                );
                println!("  -h, --help              Show this help message");
                println!();
                println!("Configuration:");
                println!("  Config file uses TOML format. All settings can be overridden");
                println!("  with environment variables using the EMBROKER__ prefix:");
                println!();
                println!("  EMBROKER__SERVER__BIND=0.0.0.0:1884");
                println!("  EMBROKER__LIMITS__MAX_SESSIONS=32");
                println!("  EMBROKER__SESSION__DEFAULT_KEEP_ALIVE=30");
                println!("  EMBROKER__LOG__LEVEL=debug");
                std::process::exit(0);
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                eprintln!("Use --help for usage information");
                std::process::exit(1);
            }
        }
    }

    Args { config_path }
}

fn main() {
    let args = parse_args();

    let config = match Config::load(&args.config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log.level))
        .init();

    info!("Loaded configuration from {}", args.config_path);
    info!(
        "Starting embroker (max_sessions={}, max_subscriptions={}, max_retained_topics={}, max_packet_size={})",
        config.limits.max_sessions,
        config.limits.max_subscriptions,
        config.limits.max_retained_topics,
        config.limits.max_packet_size
    );

    let mut server = match Server::new(&config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
