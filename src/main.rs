//! RapidKV - A Single-Threaded In-Memory Key-Value Server
//!
//! This is the main entry point for the RapidKV server.
//! It parses the command line, sets up logging, and hands the thread over
//! to the event loop.

use std::net::SocketAddr;

use rapidkv::server::Server;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: rapidkv::DEFAULT_HOST.to_string(),
            port: rapidkv::DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("RapidKV version {}", rapidkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
RapidKV - A Single-Threaded In-Memory Key-Value Server

USAGE:
    rapidkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>    Port to listen on (default: 1234)
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    rapidkv                        # Start on 0.0.0.0:1234
    rapidkv --port 4321            # Start on port 4321
    rapidkv --host 127.0.0.1       # Listen on loopback only

PROTOCOL:
    Binary, length-prefixed, little-endian. A request is a framed list of
    byte strings; the response to each is one framed tagged value.
    Commands: get set del pexpire pttl keys zadd zrem zscore zquery
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
        ██████╗  █████╗ ██████╗ ██╗██████╗ ██╗  ██╗██╗   ██╗
        ██╔══██╗██╔══██╗██╔══██╗██║██╔══██╗██║ ██╔╝██║   ██║
        ██████╔╝███████║██████╔╝██║██║  ██║█████╔╝ ██║   ██║
        ██╔══██╗██╔══██║██╔═══╝ ██║██║  ██║██╔═██╗ ╚██╗ ██╔╝
        ██║  ██║██║  ██║██║     ██║██████╔╝██║  ██╗ ╚████╔╝
        ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝     ╚═╝╚═════╝ ╚═╝  ╚═╝  ╚═══╝

RapidKV v{} - Single-Threaded In-Memory Key-Value Server
──────────────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.
"#,
        rapidkv::VERSION,
        config.bind_address()
    );
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Print the banner
    print_banner(&config);

    // Bind and run; the event loop owns the thread from here on
    let addr: SocketAddr = config.bind_address().parse()?;
    let mut server = Server::bind(addr)?;
    server.run()?;

    Ok(())
}
