//! Engine solution file parsing.
//!
//! The engine emits a fixed schema text stream: `%` prefixed comment
//! lines, then one line per resolved epoch,
//! `YYYY/MM/DD hh:mm:ss.sss lat lon height quality nsat sdn sde sdu sdne sdeu sdun`,
//! whitespace separated, trailing fields ignored.
use super::{parse_epoch, ResultRecord, ResultStore};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Comment marker of the solution file format
pub const COMMENT_MARKER: char = '%';

/// Number of fields of the solution schema (timestamp counts for two)
const SCHEMA_FIELDS: usize = 13;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to open solution file")]
    IoError(#[from] std::io::Error),
    /// The file was read entirely without a single schema match
    #[error("no solution record found")]
    NoRecords,
}

/// Matches one line against the solution schema.
fn data_line(line: &str) -> Option<ResultRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < SCHEMA_FIELDS {
        return None;
    }
    Some(ResultRecord {
        epoch: parse_epoch(fields[0], fields[1])?,
        lat_ddeg: fields[2].parse().ok()?,
        lon_ddeg: fields[3].parse().ok()?,
        height_m: fields[4].parse().ok()?,
        quality: fields[5].parse().ok()?,
        nb_sat: fields[6].parse().ok()?,
        sdn_m: fields[7].parse().ok()?,
        sde_m: fields[8].parse().ok()?,
        sdu_m: fields[9].parse().ok()?,
        sdne_m: fields[10].parse().ok()?,
        sdeu_m: fields[11].parse().ok()?,
        sdun_m: fields[12].parse().ok()?,
    })
}

/// Streams one solution file into `store`, which is wiped first:
/// parsing never merges two files. Comment lines are skipped. Once at
/// least one record matched, any later non matching line is schema
/// drift: it is reported as a warning and skipped, never fatal.
/// Returns the number of records on success; reading a file that
/// yields no record at all is an error.
pub fn parse_file<P: AsRef<Path>>(path: P, store: &mut ResultStore) -> Result<usize, ParseError> {
    let path = path.as_ref();
    store.clear();
    let reader = BufReader::new(File::open(path)?);
    let mut matched = false;
    for line in reader.lines() {
        let line = line?;
        if line.starts_with(COMMENT_MARKER) {
            continue;
        }
        if let Some(record) = data_line(&line) {
            store.push(record);
            matched = true;
        } else if matched {
            warn!("schema drift, skipping \"{}\"", line);
        }
        // anything ahead of the first record is headerish content:
        // silently ignored
    }
    if store.is_empty() {
        return Err(ParseError::NoRecords);
    }
    debug!(
        "\"{}\": {} solution records",
        path.display(),
        store.len()
    );
    Ok(store.len())
}

#[cfg(test)]
mod test {
    use super::*;
    use hifitime::prelude::Epoch;
    use std::io::Write;

    const WELL_FORMED: &str = "\
% program   : engine ver.2.4.3
% inv:roam.obs
%  GPST                  latitude(deg) longitude(deg)  height(m)   Q  ns   sdn(m)   sde(m)   sdu(m)  sdne(m)  sdeu(m)  sdun(m)
2021/01/04 00:00:00.000   30.528276776  114.356954862    42.3435   6  14   0.7864   0.5329   1.9103  -0.1275   0.3669  -0.2732
2021/01/04 00:00:30.000   30.528276851  114.356954914    42.3127   6  14   0.6553   0.4482   1.6523  -0.1042   0.3105  -0.2217
2021/01/04 00:01:00.000   30.528276903  114.356954971    42.2981   6  15   0.5817   0.4011   1.4809  -0.0901   0.2774  -0.1965
";

    fn scratch_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("gnss-ppp-{}-{}", std::process::id(), name));
        let mut fd = std::fs::File::create(&path).unwrap();
        fd.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn well_formed_file() {
        let path = scratch_file("well-formed.pos", WELL_FORMED);
        let mut store = ResultStore::new();
        let count = parse_file(&path, &mut store).unwrap();
        assert_eq!(count, 3);
        let first = &store.records()[0];
        assert_eq!(
            first.epoch,
            Epoch::from_gregorian_utc_at_midnight(2021, 1, 4)
        );
        assert_eq!(first.lat_ddeg, 30.528276776);
        assert_eq!(first.lon_ddeg, 114.356954862);
        assert_eq!(first.height_m, 42.3435);
        assert_eq!(first.quality, 6);
        assert_eq!(first.nb_sat, 14);
        assert_eq!(first.sdun_m, -0.2732);
        // file order preserved
        let last = &store.records()[2];
        assert_eq!(last.nb_sat, 15);
        let _ = std::fs::remove_file(&path);
    }
    #[test]
    fn comments_do_not_count() {
        let content = format!("{}% epilogue comment\n", WELL_FORMED);
        let path = scratch_file("comments.pos", &content);
        let mut store = ResultStore::new();
        assert_eq!(parse_file(&path, &mut store).unwrap(), 3);
        let _ = std::fs::remove_file(&path);
    }
    #[test]
    fn drift_lines_are_skipped() {
        let content = format!("{}this line does not match the schema\n", WELL_FORMED);
        let path = scratch_file("drift.pos", &content);
        let mut store = ResultStore::new();
        assert_eq!(parse_file(&path, &mut store).unwrap(), 3);
        let _ = std::fs::remove_file(&path);
    }
    #[test]
    fn multibyte_timestamp_drift_is_skipped() {
        // enough fields to reach the timestamp parse, with a seconds
        // fraction that cannot be truncated on a char boundary
        let content = "\
2021/01/04 00:00:00.000 30.5 114.3 42.0 6 14 0.7 0.5 1.9 -0.1 0.3 -0.2
2021/01/04 00:00:59.12€4 30.5 114.3 42.0 6 14 0.7 0.5 1.9 -0.1 0.3 -0.2
";
        let path = scratch_file("multibyte-drift.pos", content);
        let mut store = ResultStore::new();
        assert_eq!(parse_file(&path, &mut store).unwrap(), 1);
        let _ = std::fs::remove_file(&path);
    }
    #[test]
    fn trailing_fields_ignored() {
        let content = "2021/01/04 00:00:00.000 30.5 114.3 42.0 6 14 0.7 0.5 1.9 -0.1 0.3 -0.2 0.00 3.2\n";
        let path = scratch_file("trailing.pos", content);
        let mut store = ResultStore::new();
        assert_eq!(parse_file(&path, &mut store).unwrap(), 1);
        let _ = std::fs::remove_file(&path);
    }
    #[test]
    fn empty_file_is_an_error() {
        let path = scratch_file("empty.pos", "% header only\n");
        let mut store = ResultStore::new();
        assert!(matches!(
            parse_file(&path, &mut store),
            Err(ParseError::NoRecords)
        ));
        assert!(store.is_empty());
        let _ = std::fs::remove_file(&path);
    }
    #[test]
    fn store_is_wiped_per_parse() {
        let path = scratch_file("wipe.pos", WELL_FORMED);
        let mut store = ResultStore::new();
        parse_file(&path, &mut store).unwrap();
        parse_file(&path, &mut store).unwrap();
        // not 6: each parse starts from scratch
        assert_eq!(store.len(), 3);
        let _ = std::fs::remove_file(&path);
    }
}
