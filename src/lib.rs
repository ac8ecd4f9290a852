use chrono::prelude::*;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;
pub mod error;
pub mod plot;
pub mod timestamp;

pub use error::{Result, UsageError};
use timestamp::parse_timestamp;

pub const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

pub const COL_TIMESTAMP: &str = "Timestamp";
pub const COL_RSS_KB: &str = "RSS (KB)";
pub const COL_VSZ_KB: &str = "VSZ (KB)";
pub const COL_CPU: &str = "CPU (%)";
pub const COL_RSS_MB: &str = "RSS (MB)";
pub const COL_VSZ_MB: &str = "VSZ (MB)";

pub const KB_PER_MB: f64 = 1024.;
pub const TITLE: &str = "Memory and CPU Usage Over Time";
pub const FONT: &str = "sans-serif";

/// Size of the png, in pixels.
pub const PNG_SIZE: (u32, u32) = (1600, 800);
/// Rows printed in the preview.
pub const HEAD_ROWS: usize = 5;

// matplotlib tab:red and tab:blue, used for the axis labels
const TAB_RED: RGBColor = RGBColor(214, 39, 40);
const TAB_BLUE: RGBColor = RGBColor(31, 119, 180);
const DARK_GREEN: RGBColor = RGBColor(0, 128, 0);

/// One row of the usage csv, with the derived MB columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub rss_kb: f64,
    pub vsz_kb: f64,
    pub cpu_pct: f64,
    pub rss_mb: f64,
    pub vsz_mb: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, rss_kb: f64, vsz_kb: f64, cpu_pct: f64) -> Sample {
        Sample {
            timestamp,
            rss_kb,
            vsz_kb,
            cpu_pct,
            rss_mb: rss_kb / KB_PER_MB,
            vsz_mb: vsz_kb / KB_PER_MB,
        }
    }
}

/// The csv as read: trimmed header names and the untouched records.
/// Used for the previews, which are printed before the values are parsed.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<csv::StringRecord>,
}

impl RawTable {
    /// Read the csv at the given path.
    pub fn from_csv<P>(fin: P) -> Result<RawTable>
    where
        P: AsRef<Path>,
    {
        let path = fin.as_ref();
        let file = File::open(path).map_err(|source| UsageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        RawTable::from_reader(file)
    }

    /// Read any csv reader, trimming only the header names.
    pub fn from_reader<R: Read>(rdr: R) -> Result<RawTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(rdr);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        log::debug!("csv columns: {:?}", columns);
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(RawTable { columns, rows })
    }

    /// Text preview of the first n rows, all columns, cells trimmed.
    pub fn head(&self, n: usize) -> String {
        let mut s = self.columns.join(", ");
        s.push('\n');
        for row in self.rows.iter().take(n) {
            let cells: Vec<&str> = row.iter().map(str::trim).collect();
            s.push_str(&cells.join(", "));
            s.push('\n');
        }
        if self.rows.len() > n {
            s.push_str(&format!("... ({} rows)\n", self.rows.len()));
        }
        s
    }

    /// The column list, as read from the header.
    pub fn columns_preview(&self) -> String {
        format!("columns: [{}]", self.columns.join(", "))
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| UsageError::missing_column(name))
    }
}

/// The usage time series, in the row order of the csv.
/// `columns` keeps every (trimmed) header name, including the ignored ones.
#[derive(Debug, Clone)]
pub struct UsageTable {
    pub columns: Vec<String>,
    pub samples: Vec<Sample>,
}

impl UsageTable {
    pub fn new(columns: Vec<String>, capacity: usize) -> UsageTable {
        UsageTable {
            columns,
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Init a UsageTable from the csv at the given path.
    pub fn from_csv<P>(fin: P) -> Result<UsageTable>
    where
        P: AsRef<Path>,
    {
        UsageTable::from_raw(&RawTable::from_csv(fin)?)
    }

    /// Init a UsageTable from any csv reader.
    pub fn from_reader<R: Read>(rdr: R) -> Result<UsageTable> {
        UsageTable::from_raw(&RawTable::from_reader(rdr)?)
    }

    /// Locate the four required columns and parse every row;
    /// the timestamp cells are trimmed as text, the numeric cells are trimmed and parsed.
    /// Stops at the first invalid value, no row is skipped.
    pub fn from_raw(raw: &RawTable) -> Result<UsageTable> {
        let i_time = raw.column(COL_TIMESTAMP)?;
        let i_rss = raw.column(COL_RSS_KB)?;
        let i_vsz = raw.column(COL_VSZ_KB)?;
        let i_cpu = raw.column(COL_CPU)?;

        let mut table = UsageTable::new(raw.columns.clone(), raw.rows.len());
        for record in raw.rows.iter() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let field = |i: usize| record.get(i).unwrap_or_default();
            let time_str = field(i_time).trim();
            let timestamp = parse_timestamp(time_str).ok_or_else(|| UsageError::Timestamp {
                line,
                value: time_str.to_string(),
            })?;
            let rss_kb = parse_number(field(i_rss), line, COL_RSS_KB)?;
            let vsz_kb = parse_number(field(i_vsz), line, COL_VSZ_KB)?;
            let cpu_pct = parse_number(field(i_cpu), line, COL_CPU)?;
            table
                .samples
                .push(Sample::new(timestamp, rss_kb, vsz_kb, cpu_pct));
        }
        log::info!("read {} samples", table.len());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Split the series returned by `value` at the non-finite values,
    /// so that missing data leave a gap in the plot.
    fn finite_runs<F>(&self, value: F) -> Vec<Vec<(DateTime<Utc>, f64)>>
    where
        F: Fn(&Sample) -> f64,
    {
        let mut runs = Vec::new();
        let mut run = Vec::new();
        for s in self.samples.iter() {
            let v = value(s);
            if v.is_finite() {
                run.push((Utc.from_utc_datetime(&s.timestamp), v));
            } else if !run.is_empty() {
                runs.push(std::mem::take(&mut run));
            }
        }
        if !run.is_empty() {
            runs.push(run);
        }
        runs
    }

    /// Plots memory (left axis) and cpu (right axis) over time to png.
    /// An empty table still gives a chart, with axes and legends but no lines.
    pub fn plot_png<P>(&self, fout: P, size: (u32, u32)) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let (xmindt, xmaxdt) = time_range(self.samples.iter().map(|s| s.timestamp));
        let xmin = Utc.from_utc_datetime(&xmindt);
        let xmax = Utc.from_utc_datetime(&xmaxdt);
        let xfmt = suitable_xfmt(xmaxdt - xmindt);
        let (mem_min, mem_max) = value_range(
            self.samples
                .iter()
                .map(|s| s.rss_mb)
                .chain(self.samples.iter().map(|s| s.vsz_mb)),
        );
        let (cpu_min, cpu_max) = value_range(self.samples.iter().map(|s| s.cpu_pct));
        log::debug!(
            "x range {} - {}, memory range {} - {}, cpu range {} - {}",
            xmin,
            xmax,
            mem_min,
            mem_max,
            cpu_min,
            cpu_max
        );

        let root = BitMapBackend::new(fout.as_ref(), size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(TITLE, (FONT, 32))
            .margin(20)
            .x_label_area_size(70)
            .y_label_area_size(100)
            .right_y_label_area_size(100)
            .build_cartesian_2d(xmin..xmax, mem_min..mem_max)?
            .set_secondary_coord(xmin..xmax, cpu_min..cpu_max);
        chart
            .configure_mesh()
            .light_line_style(TRANSPARENT)
            .bold_line_style(RGBColor(150, 150, 150).stroke_width(1))
            .set_all_tick_mark_size(2)
            .label_style((FONT, 20))
            .y_label_style((FONT, 20).into_font().color(&TAB_RED))
            .axis_desc_style((FONT, 22))
            .x_labels(12)
            .x_label_formatter(&|x: &DateTime<Utc>| x.format(xfmt).to_string())
            .y_label_formatter(&|y: &f64| format!("{:.1}", y))
            .x_desc(COL_TIMESTAMP)
            .y_desc("Memory (MB)")
            .draw()?;
        chart
            .configure_secondary_axes()
            .label_style((FONT, 20).into_font().color(&TAB_BLUE))
            .axis_desc_style((FONT, 22))
            .y_label_formatter(&|y: &f64| format!("{:.1}", y))
            .y_desc(COL_CPU)
            .draw()?;

        let memory_lines: [(&str, RGBColor, fn(&Sample) -> f64); 2] = [
            (COL_RSS_MB, RED, |s: &Sample| s.rss_mb),
            (COL_VSZ_MB, BLUE, |s: &Sample| s.vsz_mb),
        ];
        for &(label, color, value) in memory_lines.iter() {
            // empty series, only carries the legend entry
            chart
                .draw_series(LineSeries::new(
                    std::iter::empty::<(DateTime<Utc>, f64)>(),
                    color.stroke_width(2),
                ))?
                .label(label)
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            for run in self.finite_runs(value) {
                chart.draw_series(LineSeries::new(run, color.stroke_width(2)))?;
            }
        }
        for run in self.finite_runs(|s| s.cpu_pct) {
            chart.draw_secondary_series(LineSeries::new(run, DARK_GREEN.stroke_width(2)))?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT, 20))
            .draw()?;
        // the series labels of a dual chart share one box, the cpu one is drawn apart
        draw_upper_right_legend(
            &chart.plotting_area().strip_coord_spec(),
            COL_CPU,
            DARK_GREEN,
        )?;

        root.present()?;
        log::info!("chart written to {}", fout.as_ref().display());
        Ok(())
    }
}

/// An empty cell is a missing value (NAN), a cell of blanks is not a number.
fn parse_number(raw: &str, line: u64, column: &str) -> Result<f64> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    let value = raw.trim();
    value.parse::<f64>().map_err(|_| UsageError::Number {
        line,
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Legend box with a single entry, in the upper right corner of the area.
fn draw_upper_right_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    label: &str,
    color: RGBColor,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let style: TextStyle = (FONT, 20).into_font().into();
    let (text_w, text_h) = area.estimate_text_size(label, &style)?;
    let (area_w, _) = area.dim_in_pixel();
    let margin = 10;
    let line_len = 20;
    let w = text_w as i32 + line_len + margin * 3;
    let h = text_h as i32 + margin * 2;
    let x0 = area_w as i32 - w - margin;
    let y0 = margin;
    area.draw(&Rectangle::new(
        [(x0, y0), (x0 + w, y0 + h)],
        WHITE.mix(0.8).filled(),
    ))?;
    area.draw(&Rectangle::new([(x0, y0), (x0 + w, y0 + h)], BLACK))?;
    let y_mid = y0 + h / 2;
    area.draw(&PathElement::new(
        vec![(x0 + margin, y_mid), (x0 + margin + line_len, y_mid)],
        color.stroke_width(2),
    ))?;
    area.draw(&Text::new(
        label,
        (x0 + margin * 2 + line_len, y0 + margin),
        style.clone(),
    ))?;
    Ok(())
}

pub fn min_and_max<T, I>(s: I) -> Option<(T, T)>
where
    T: std::cmp::PartialOrd + Copy,
    I: IntoIterator<Item = T>,
{
    let mut s_iter = s.into_iter();
    let (mut min, mut max) = match s_iter.next() {
        Some(v) => (v, v),
        None => return None,
    };
    for es in s_iter {
        if es > max {
            max = es
        }
        if es < min {
            min = es
        }
    }
    Some((min, max))
}

/// Time axis limits with a 5% margin on each side.
/// A single instant gets one minute per side, no data one hour from the epoch.
pub fn time_range<I>(times: I) -> (NaiveDateTime, NaiveDateTime)
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    match min_and_max(times) {
        None => {
            let epoch = NaiveDateTime::default();
            (epoch, epoch + chrono::Duration::hours(1))
        }
        Some((tmin, tmax)) => {
            let span = tmax - tmin;
            let margin = if span > chrono::Duration::zero() {
                span / 20
            } else {
                chrono::Duration::minutes(1)
            };
            (
                tmin.checked_sub_signed(margin).unwrap_or(tmin),
                tmax.checked_add_signed(margin).unwrap_or(tmax),
            )
        }
    }
}

/// Value axis limits with a 10% margin on each side, ignoring NAN.
/// A constant series gets one unit per side, no finite data 0 to 1.
pub fn value_range<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    match min_and_max(values.into_iter().filter(|v| v.is_finite())) {
        None => (0., 1.),
        Some((vmin, vmax)) => {
            let span = vmax - vmin;
            if span > 0. {
                (vmin - span / 10., vmax + span / 10.)
            } else {
                (vmin - 1., vmax + 1.)
            }
        }
    }
}

pub fn suitable_xfmt(d: chrono::Duration) -> &'static str {
    let xfmt = if d > chrono::Duration::weeks(1) {
        "%y-%m-%d"
    } else if d > chrono::Duration::days(1) {
        "%m-%d %H"
    } else if d > chrono::Duration::hours(1) {
        "%d %H:%M"
    } else {
        "%H:%M:%S"
    };
    return xfmt;
}
