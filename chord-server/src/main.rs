// CLI entry point for the chord recommendation server.
//
// Usage:
//   chord-server [OPTIONS]
//     --host <HOST>          Listen host (default: 127.0.0.1)
//     --port <PORT>          Listen port (default: 8765)
//     --corpus-dir <DIR>     Corpus directory (default: data/corpus)
//     --cache-path <PATH>    StatSet snapshot path (default: data/stat_sets.json)
//
//   chord-server build-stats [OPTIONS]
//     Parses the bundled corpora and writes the StatSet snapshot to
//     --cache-path, without starting the server.

use chord_server::config::ServerConfig;
use chord_server::{cache, corpus, serve};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.get(1).map(String::as_str) == Some("build-stats") {
        let config = parse_args(&args[1..]);
        if let Err(e) = run_build_stats(&config) {
            eprintln!("build-stats failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    let config = parse_args(&args[1..]);
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve::run(config)) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

fn run_build_stats(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Parsing corpora from {}", config.corpus_dir.display());
    let stats = corpus::build_from_disk(config)?;
    cache::save(&config.cache_path, &stats)?;
    println!("Wrote stat set snapshot to {}", config.cache_path.display());
    Ok(())
}

/// Parse command-line arguments into a `ServerConfig`. Uses simple
/// `std::env::args()` matching — no clap dependency. Skips a leading
/// `build-stats` token so both call sites can pass the same slice.
fn parse_args(args: &[String]) -> ServerConfig {
    let mut config = ServerConfig::default();
    let mut i = if args.first().map(String::as_str) == Some("build-stats") { 1 } else { 0 };

    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                config.host = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--host requires a value");
                    std::process::exit(1);
                });
            }
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--corpus-dir" => {
                i += 1;
                config.corpus_dir = args.get(i).map(std::path::PathBuf::from).unwrap_or_else(|| {
                    eprintln!("--corpus-dir requires a value");
                    std::process::exit(1);
                });
            }
            "--cache-path" => {
                i += 1;
                config.cache_path = args.get(i).map(std::path::PathBuf::from).unwrap_or_else(|| {
                    eprintln!("--cache-path requires a value");
                    std::process::exit(1);
                });
            }
            "--recommendations" => {
                i += 1;
                config.default_recommendations =
                    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                        eprintln!("--recommendations requires a valid number");
                        std::process::exit(1);
                    });
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: chord-server [OPTIONS]");
    println!("       chord-server build-stats [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --host <HOST>            Listen host (default: 127.0.0.1)");
    println!("  --port <PORT>            Listen port (default: 8765)");
    println!("  --corpus-dir <DIR>       Corpus directory (default: data/corpus)");
    println!("  --cache-path <PATH>      StatSet snapshot path (default: data/stat_sets.json)");
    println!("  --recommendations <N>    Top-K recommendations per slot (default: 10)");
    println!("  --help, -h               Show this help");
}
