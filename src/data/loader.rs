use crate::data::bar::Bar;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

//timestamps above this are treated as milliseconds
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

//bar interval, doubles as the sub-directory name under <root>/<coin>/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    Daily,
    Hourly,
    Minute,
}

impl Interval {
    //parse interval from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "d" | "daily" => Some(Interval::Daily),
            "h" | "hourly" => Some(Interval::Hourly),
            "m" | "minute" => Some(Interval::Minute),
            _ => None,
        }
    }

    //exactly one flag must be set
    pub fn from_flags(daily: bool, hourly: bool, minute: bool) -> Result<Self> {
        let selected: Vec<Interval> = [
            (daily, Interval::Daily),
            (hourly, Interval::Hourly),
            (minute, Interval::Minute),
        ]
        .into_iter()
        .filter_map(|(set, interval)| set.then_some(interval))
        .collect();

        match selected.as_slice() {
            [] => bail!("select interval with -d, -H, or -m"),
            [interval] => Ok(*interval),
            _ => bail!("only one interval flag is allowed: -d, -H, or -m"),
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Interval::Daily => "d",
            Interval::Hourly => "h",
            Interval::Minute => "m",
        }
    }

    pub fn points_per_day(&self) -> usize {
        match self {
            Interval::Daily => 1,
            Interval::Hourly => 24,
            Interval::Minute => 24 * 60,
        }
    }
}

//year selects files, month selects rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarFilter {
    #[serde(default)]
    pub years: Vec<i32>,
    #[serde(default)]
    pub months: Vec<u32>,
}

impl BarFilter {
    //valid months only, none means no month filtering
    fn month_set(&self) -> Option<Vec<u32>> {
        let months: Vec<u32> = self
            .months
            .iter()
            .copied()
            .filter(|m| (1..=12).contains(m))
            .collect();
        if months.is_empty() {
            None
        } else {
            Some(months)
        }
    }
}

//loads bars from a csv file in file order
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    load_csv_filtered(path, &BarFilter::default())
}

//loads bars from a csv file, keeping only rows in the filter's months
pub fn load_csv_filtered<P: AsRef<Path>>(path: P, filter: &BarFilter) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let bars = read_rows(path, filter.month_set().as_deref())?;
    if bars.is_empty() {
        bail!("{:?}: no data rows parsed", path);
    }
    info!("loaded {} bars from {:?}", bars.len(), path);
    Ok(bars)
}

//loads every csv under <root>/<coin>/<interval>/, narrowed by year files and months
pub fn load_data_root(
    root: &Path,
    coin: &str,
    interval: Interval,
    filter: &BarFilter,
) -> Result<Vec<Bar>> {
    if root.as_os_str().is_empty() {
        bail!("data root is empty");
    }
    let coin = coin.trim().to_lowercase();
    if coin.is_empty() {
        bail!("coin is empty");
    }

    let dir = root.join(&coin).join(interval.dir_name());
    let meta = fs::metadata(&dir).context(format!("Failed to open data directory {:?}", dir))?;
    if !meta.is_dir() {
        bail!("data path is not a directory: {:?}", dir);
    }

    let files = if filter.years.is_empty() {
        list_csv_files(&dir)?
    } else {
        list_csv_files_for_years(&dir, &coin, &filter.years)?
    };
    if files.is_empty() {
        bail!("no csv files found in {:?}", dir);
    }

    let months = filter.month_set();
    let mut bars = Vec::with_capacity(1024);
    for file in &files {
        let loaded = read_rows(file, months.as_deref())?;
        if loaded.is_empty() {
            debug!("skipping {:?}: no data rows parsed", file);
            continue;
        }
        info!("loaded {} bars from {:?}", loaded.len(), file);
        bars.extend(loaded);
    }

    if bars.is_empty() {
        bail!("no data loaded from {:?}", dir);
    }

    Ok(bars)
}

//keeps bars whose symbol tag is absent or matches
pub fn filter_by_symbol(bars: &[Bar], symbol: &str) -> Vec<Bar> {
    bars.iter()
        .filter(|bar| bar.symbol.as_deref().map_or(true, |s| s == symbol))
        .cloned()
        .collect()
}

fn read_rows(path: &Path, months: Option<&[u32]>) -> Result<Vec<Bar>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for (index, result) in reader.records().enumerate() {
        let line = index + 1;
        let record =
            result.context(format!("Failed to read CSV record at {:?}:{}", path, line))?;

        let Some(row) = parse_row(&record) else {
            skipped += 1;
            continue;
        };

        if let Some(months) = months {
            match row.timestamp {
                Some(ts) if months.contains(&ts.month()) => {}
                _ => continue,
            }
        }

        let mut bar = Bar::new(row.open, row.high, row.low, row.close)
            .context(format!("Invalid bar at {:?}:{}", path, line))?;
        bar.timestamp = row.timestamp;
        bars.push(bar);
    }

    if skipped > 0 {
        warn!("skipped {} malformed rows in {:?}", skipped, path);
    }

    Ok(bars)
}

struct RawRow {
    timestamp: Option<DateTime<Utc>>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

//timestamp,open,high,low,close,volume[,...]
fn parse_row(record: &StringRecord) -> Option<RawRow> {
    if record.len() < 6 {
        return None;
    }
    Some(RawRow {
        timestamp: record.get(0).and_then(parse_timestamp),
        open: record.get(1).and_then(parse_float)?,
        high: record.get(2).and_then(parse_float)?,
        low: record.get(3).and_then(parse_float)?,
        close: record.get(4).and_then(parse_float)?,
    })
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches('"')
}

fn parse_float(raw: &str) -> Option<f64> {
    let value = unquote(raw);
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

//unix seconds or milliseconds
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = unquote(raw);
    if value.is_empty() {
        return None;
    }
    let parsed = match value.parse::<i64>() {
        Ok(v) => v,
        Err(_) => value.parse::<f64>().ok()? as i64,
    };
    let secs = if parsed > MILLIS_THRESHOLD {
        parsed / 1000
    } else {
        parsed
    };
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).context(format!("Failed to read directory {:?}", dir))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

//<coin><year>.csv wins over <year>.csv
fn list_csv_files_for_years(dir: &Path, coin: &str, years: &[i32]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::with_capacity(years.len());
    for &year in years.iter().filter(|&&y| y > 0) {
        let coin_year = dir.join(format!("{}{}.csv", coin, year));
        let year_only = dir.join(format!("{}.csv", year));

        let found = [coin_year, year_only].into_iter().find(|p| p.exists());
        match found {
            Some(path) if path.is_dir() => bail!("data path is a directory: {:?}", path),
            Some(path) => files.push(path),
            None => bail!(
                "missing year file {} (expected {}{}.csv or {}.csv)",
                year,
                coin,
                year,
                year
            ),
        }
    }
    files.sort();
    Ok(files)
}
