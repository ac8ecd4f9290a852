use super::VERSION;
use clap::{App, Arg};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Input csv and output png of a plotting run, from the CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    pub csvin: PathBuf,
    pub pngout: PathBuf,
}

impl PlotConfig {
    /// Parse the given arguments, the first one being the program name.
    pub fn from_args<I, T>(args: I) -> Result<PlotConfig, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let arg_csvin = Arg::with_name("input_csvfile")
            .help("csv file with Timestamp, RSS (KB), VSZ (KB) and CPU (%) columns, plotted to <CSVFILE>.png")
            .value_name("CSVFILE")
            .index(1)
            .required(true);
        let cli_args = App::new("usage_plot")
            .version(VERSION.unwrap_or("unknown"))
            .author("Luca Peruzzo")
            .about("cli app to plot the memory and cpu usage time series")
            .arg(arg_csvin)
            .get_matches_from_safe(args)?;
        let csvin = PathBuf::from(cli_args.value_of_os("input_csvfile").unwrap_or_default());
        let pngout = png_path(&csvin);
        Ok(PlotConfig { csvin, pngout })
    }
}

/// Takes the CLI arguments that control the plotting of the usage time series,
/// exits with the clap message on invalid arguments.
pub fn parse_cli() -> PlotConfig {
    PlotConfig::from_args(std::env::args_os()).unwrap_or_else(|e| e.exit())
}

/// The png is named after the whole csv path, e.g., data/run1.csv -> data/run1.csv.png
pub fn png_path<P: AsRef<Path>>(csvin: P) -> PathBuf {
    let mut pngout = csvin.as_ref().as_os_str().to_owned();
    pngout.push(".png");
    PathBuf::from(pngout)
}
