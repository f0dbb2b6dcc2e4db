//! GTP-style Havannah engine front-end

mod game;
mod protocol;

use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;

use havannah_core::Coords;
use protocol::Engine;

#[derive(Parser, Debug)]
#[command(author, version, about = "Havannah solver with a GTP-style text interface", long_about = None)]
struct Args {
    /// Board side length (3-10)
    #[arg(short, long, default_value_t = 4)]
    size: u8,

    /// Search-tree memory limit in MiB
    #[arg(short, long, default_value_t = 100)]
    mem: u64,

    /// Time limit per solve in seconds (0 = unlimited)
    #[arg(short, long, default_value_t = 60.0)]
    time: f64,

    /// Use absolute grid columns instead of Hex-GUI per-row numbering
    #[arg(long)]
    grid_coords: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(
            env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "debug"),
        );
    } else {
        env_logger::init_from_env(
            env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
        );
    }

    let coords = if args.grid_coords {
        Coords::Grid
    } else {
        Coords::HexGui
    };
    let mut engine = Engine::new(args.size, args.mem, args.time, coords)?;

    log::info!("havannah engine starting, board size {}", args.size);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        if let Some(resp) = engine.handle(&line) {
            stdout.write_all(resp.render().as_bytes())?;
            stdout.flush()?;
            if resp.quit {
                break;
            }
        }
    }
    Ok(())
}
