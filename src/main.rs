use std::process::exit;

use clap::Parser;
use golbox::{config, Sim, SimConfig};

use view::View;
mod view;

/// a bounded game of life in the terminal.
///
/// left click or drag paints cells, right click erases them and the mouse
/// wheel advances one generation.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// number of columns in the active area
    #[arg(long, default_value_t = 60)]
    width: usize,
    /// number of rows in the active area
    #[arg(long, default_value_t = 30)]
    height: usize,
    /// terminal columns per cell
    #[arg(long, default_value_t = 2)]
    cell_side: usize,
    /// delay between generations in seconds, non-positive values use the minimum
    #[arg(long, default_value_t = config::DEFAULT_CYCLE_DELAY.as_secs_f64(), allow_negative_numbers = true)]
    delay: f64,
    /// start running immediately instead of paused
    #[arg(long)]
    run: bool,
}

pub fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = SimConfig::new((args.width, args.height), args.cell_side, args.delay).unwrap_or_else(|err| {
        eprintln!("[error] {err}");
        exit(1);
    });
    let simulation = Sim::spawn(config);
    if args.run {
        simulation.start();
    }

    let view = View::spawn(simulation.handle());
    view.join();
}
