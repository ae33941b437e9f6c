//! Bokeh Viewer - depth-of-field glTF viewer.

use std::env;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut filter = "info";
    let mut asset_dir: Option<PathBuf> = None;
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => filter = "debug",
            "-vv" | "--trace" => filter = "trace",
            "-q" | "--quiet" => filter = "warn",
            "-h" | "--help" => {
                print_usage(&args[0]);
                return Ok(());
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown option: {}", other);
                print_usage(&args[0]);
                std::process::exit(1);
            }
            other => asset_dir = Some(PathBuf::from(other)),
        }
    }

    bokeh_viewer::viewer::run(asset_dir, filter)
}

fn print_usage(prog: &str) {
    println!("Bokeh Viewer - depth-of-field glTF viewer");
    println!();
    println!("Usage: {} [options] [ASSET_DIR]", prog);
    println!();
    println!("ASSET_DIR holds glb/ and hdr/ (default: config asset_root, then ./public)");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output (very verbose)");
    println!("  -q, --quiet    Warnings and errors only");
    println!("  -h, --help     Show this help");
    println!();
    println!("Environment:");
    println!("  RUST_LOG       Log filter, overrides the options above");
    println!("  BOKEH_TRACE=1  Write a Chrome trace to trace.json");
}
