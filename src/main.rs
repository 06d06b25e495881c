use bankslight::cli::{self, Command};
use bankslight::config::{default_config_path, load_config, Config};
use bankslight::BankService;
use std::process;
use tracing::{error, info, Level};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match cli::parse_args(&args) {
        Ok(invocation) => invocation,
        Err(msg) => {
            eprintln!("{}\n\n{}", msg, cli::USAGE);
            process::exit(2);
        }
    };

    if invocation.command == Command::Help {
        println!("{}", cli::USAGE);
        return;
    }

    // An explicit --config wins; the per-user file is only read when present
    let config_path = invocation
        .config
        .clone()
        .or_else(|| default_config_path().filter(|path| path.exists()));
    let mut config = match config_path {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                process::exit(2);
            }
        },
        None => Config::default(),
    };
    config.store.path = invocation.store.clone();

    init_logging(&config);
    info!("Opening store {}", config.store.path.display());

    let mut service = BankService::from_config(&config);
    let outcome = cli::execute(&service, &invocation.command);
    if let Err(e) = service.shutdown() {
        error!("Failed to close store: {}", e);
    }

    match outcome {
        Ok(output) => print!("{}", output),
        Err(e) => {
            if e.is_fatal() {
                error!("{}", e);
            }
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

// Log lines go to stderr so command output stays pipeable
fn init_logging(config: &Config) {
    let level = config.log_level().parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
