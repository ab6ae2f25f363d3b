// core/src/buoy.rs
//! Historiske NDBC-bøyedata: CSV-filer fra fetch-steget og rå stdmet-tekst.
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{info, warn};

use crate::error::{BlueGlowError, Result};

/// Standard stdmet-kolonner i den kombinerte CSV-fila (pluss `dt`).
pub const STD_COLS: [&str; 18] = [
    "YY", "MM", "DD", "hh", "mm", "WDIR", "WSPD", "GST", "WVHT", "DPD", "APD", "MWD", "PRES",
    "ATMP", "WTMP", "DEWP", "VIS", "TIDE",
];

/// Én observasjon med gyldig tidsstempel. Verdier er rå (før sentinel-filter).
#[derive(Debug, Clone, PartialEq)]
pub struct BuoyRecord {
    pub timestamp: DateTime<Utc>,
    pub wave_height: Option<f64>,
    pub water_temp: Option<f64>,
}

/// Tall-parsing der "MM", "99.00", tomt osv. blir None / beholdes rått.
pub fn parse_num(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

fn normalize_header(h: &str) -> String {
    h.replace('#', "").trim().to_string()
}

/// To-sifret år: >50 => 19xx, ellers 20xx.
pub fn expand_year(y: i32) -> i32 {
    if y >= 100 {
        y
    } else if y > 50 {
        1900 + y
    } else {
        2000 + y
    }
}

/// `dt`-kolonnen kan være RFC3339, pandas-format med offset, eller naiv UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|n| n.and_utc())
}

fn timestamp_from_parts(get: &dyn Fn(&str) -> Option<f64>) -> Option<DateTime<Utc>> {
    let year = get("YY").or_else(|| get("YYYY"))? as i32;
    let month = get("MM")? as u32;
    let day = get("DD")? as u32;
    let hour = get("hh").unwrap_or(0.0) as u32;
    let minute = get("mm").unwrap_or(0.0) as u32;
    NaiveDate::from_ymd_opt(expand_year(year), month, day)?
        .and_hms_opt(hour, minute, 0)
        .map(|n| n.and_utc())
}

/// Leser én bøye-CSV. Rader uten tolkbart tidsstempel droppes.
pub fn read_buoy_csv<R: Read>(reader: R) -> std::result::Result<Vec<BuoyRecord>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: HashMap<String, usize> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (normalize_header(h), i))
        .collect();

    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let field = |name: &str| headers.get(name).and_then(|&i| row.get(i));
        let num = |name: &str| field(name).and_then(parse_num);

        let timestamp = match field("dt").and_then(parse_timestamp) {
            Some(t) => Some(t),
            None => timestamp_from_parts(&num),
        };
        let Some(timestamp) = timestamp else {
            continue;
        };
        out.push(BuoyRecord {
            timestamp,
            wave_height: num("WVHT"),
            water_temp: num("WTMP"),
        });
    }
    Ok(out)
}

#[derive(Debug, Default)]
pub struct BuoyLoad {
    pub records: Vec<BuoyRecord>,
    pub files: Vec<PathBuf>,
}

/// Leser alle `ndbc_*.csv` i katalogen. Filer som ikke kan leses logges og hoppes over.
pub fn load_ndbc_dir(dir: &Path) -> Result<BuoyLoad> {
    if !dir.is_dir() {
        return Err(BlueGlowError::MissingArtifact {
            what: "raw data directory",
            path: dir.to_path_buf(),
            stage: "fetch",
        });
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| BlueGlowError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("ndbc_") && n.ends_with(".csv"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut load = BuoyLoad::default();
    for path in files {
        let parsed = std::fs::File::open(&path)
            .map_err(csv::Error::from)
            .and_then(read_buoy_csv);
        match parsed {
            Ok(mut rows) => {
                info!("✅ Lastet {}: {} rader", path.display(), rows.len());
                load.records.append(&mut rows);
                load.files.push(path);
            }
            Err(e) => warn!("⚠️ Kunne ikke lese {}: {}", path.display(), e),
        }
    }
    Ok(load)
}

/// Parset stdmet-tekst: kolonnenavn + datarader.
#[derive(Debug, Clone, Default)]
pub struct StdmetTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Tolker NDBC stdmet-tekst. Første `#`-linje er kolonnenavn, øvrige `#`-linjer
/// (enheter) ignoreres. Eldre filer uten `#` har kolonnenavn på første linje.
pub fn parse_stdmet_text(text: &str) -> StdmetTable {
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            if header.is_none() {
                header = Some(rest.split_whitespace().map(str::to_string).collect());
            }
            continue;
        }
        let parts: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if header.is_none() {
            if parts.first().map(|p| parse_num(p).is_none()).unwrap_or(false) {
                header = Some(parts);
                continue;
            }
            header = Some(STD_COLS.iter().map(|c| c.to_string()).collect());
        }
        rows.push(parts);
    }
    StdmetTable {
        header: header.unwrap_or_default(),
        rows,
    }
}

/// Eldre kolonnenavn → standardnavn.
fn canonical_col(name: &str) -> &str {
    match name {
        "YYYY" => "YY",
        "WD" => "WDIR",
        "BAR" => "PRES",
        other => other,
    }
}

impl StdmetTable {
    /// Rader projisert på [`STD_COLS`] + `dt` (RFC3339, tom hvis ugyldig dato).
    pub fn standard_rows(&self) -> Vec<Vec<String>> {
        let idx: HashMap<&str, usize> = self
            .header
            .iter()
            .enumerate()
            .map(|(i, h)| (canonical_col(h), i))
            .collect();
        self.rows
            .iter()
            .map(|row| {
                let mut out: Vec<String> = STD_COLS
                    .iter()
                    .map(|c| {
                        idx.get(c)
                            .and_then(|&i| row.get(i))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect();
                let num = |c: &str| {
                    STD_COLS
                        .iter()
                        .position(|s| *s == c)
                        .and_then(|i| parse_num(&out[i]))
                };
                let dt = timestamp_from_parts(&num)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                out.push(dt);
                out
            })
            .collect()
    }
}
