use std::process;
use usage_plot::plot::{parse_cli, PlotConfig};
use usage_plot::{RawTable, UsageTable, HEAD_ROWS, PNG_SIZE};

fn main() {
    pretty_env_logger::init();
    let config = parse_cli();
    log::info!(
        "read data from {} and plot to {}",
        config.csvin.display(),
        config.pngout.display()
    );
    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(config: &PlotConfig) -> usage_plot::Result<()> {
    let raw = RawTable::from_csv(&config.csvin)?;
    println!("{}", raw.head(HEAD_ROWS));
    println!("{}", raw.columns_preview());
    let tab = UsageTable::from_raw(&raw)?;
    tab.plot_png(&config.pngout, PNG_SIZE)
}
