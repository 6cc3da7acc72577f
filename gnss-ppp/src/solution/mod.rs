//! Engine solutions: records, storage, parsing, CSV synthesis.
use hifitime::prelude::{Epoch, TimeScale};
use serde::{Deserialize, Serialize};

pub mod csv;
pub mod parser;

/// One resolved position, as reported by the engine, in geodetic
/// coordinates with its ENU standard deviation components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Resolution instant (millisecond resolution)
    pub epoch: Epoch,
    /// Latitude, signed decimal degrees
    pub lat_ddeg: f64,
    /// Longitude, signed decimal degrees
    pub lon_ddeg: f64,
    /// Height above ellipsoid [m]
    pub height_m: f64,
    /// Fix type: 1-6 are standard codes (see [quality_label]),
    /// anything else passes through numerically
    pub quality: u8,
    /// Number of satellites contributing
    pub nb_sat: u8,
    /// North std deviation [m]
    pub sdn_m: f64,
    /// East std deviation [m]
    pub sde_m: f64,
    /// Up std deviation [m]
    pub sdu_m: f64,
    /// North/East covariance component [m]
    pub sdne_m: f64,
    /// East/Up covariance component [m]
    pub sdeu_m: f64,
    /// Up/North covariance component [m]
    pub sdun_m: f64,
}

/// Standard fix type label, when the code is a standard one.
pub fn quality_label(code: u8) -> Option<&'static str> {
    match code {
        1 => Some("Fixed"),
        2 => Some("Float"),
        3 => Some("SBAS"),
        4 => Some("DGPS"),
        5 => Some("Single"),
        6 => Some("PPP"),
        _ => None,
    }
}

/// Ordered collection of [ResultRecord]s, in engine emission order.
/// The basis for any display or export. Wiped wholesale before each
/// new parse, never merged across runs.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    records: Vec<ResultRecord>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Appends one record, preserving order of arrival
    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }
    /// Discards all records
    pub fn clear(&mut self) {
        self.records.clear();
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter()
    }
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }
}

/// Formats an [Epoch] in the engine's solution file layout
/// `YYYY/MM/DD hh:mm:ss.sss` (UTC, millisecond resolution).
pub fn format_epoch(epoch: Epoch) -> String {
    let (y, m, d, hh, mm, ss, ns) = epoch.to_gregorian_utc();
    format!(
        "{:04}/{:02}/{:02} {:02}:{:02}:{:02}.{:03}",
        y,
        m,
        d,
        hh,
        mm,
        ss,
        ns / 1_000_000
    )
}

/// Parses the `YYYY/MM/DD` + `hh:mm:ss.sss` token pair of a solution
/// line. None if either token does not follow the layout.
pub(crate) fn parse_epoch(date: &str, time: &str) -> Option<Epoch> {
    let mut ymd = date.split('/');
    let y = ymd.next()?.parse::<i32>().ok()?;
    let m = ymd.next()?.parse::<u8>().ok()?;
    let d = ymd.next()?.parse::<u8>().ok()?;
    if ymd.next().is_some() {
        return None;
    }
    let mut hms = time.split(':');
    let hh = hms.next()?.parse::<u8>().ok()?;
    let mm = hms.next()?.parse::<u8>().ok()?;
    let seconds = hms.next()?;
    if hms.next().is_some() {
        return None;
    }
    let (ss, ns) = match seconds.split_once('.') {
        Some((int, frac)) => {
            let ss = int.parse::<u8>().ok()?;
            // millisecond resolution: pad or truncate to 3 digits.
            // get(): a fraction that cannot be truncated on a char
            // boundary is no schema match, never a panic
            let frac = if frac.len() > 3 { frac.get(..3)? } else { frac };
            let mut ms = frac.parse::<u32>().ok()?;
            for _ in frac.len()..3 {
                ms *= 10;
            }
            (ss, ms * 1_000_000)
        },
        None => (seconds.parse::<u8>().ok()?, 0),
    };
    Epoch::maybe_from_gregorian(y, m, d, hh, mm, ss, ns, TimeScale::UTC).ok()
}
