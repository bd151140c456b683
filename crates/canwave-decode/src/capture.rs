//! Read CAN_H/CAN_L captures from oscilloscope and logic analyzer CSV exports
use std::io::Read;

use eyre::WrapErr;

/// Find the index of a column given by its header name, or by its index
///
/// Without a header the column must be an index. Doesn't consume the first row.
pub fn column_index<R: Read>(
    reader: &mut csv::Reader<R>,
    name_or_index: &str,
) -> eyre::Result<usize> {
    let has_header = reader.has_headers();
    let header = reader.headers()?;

    let index = match header.iter().position(|h| h == name_or_index) {
        Some(index) if has_header => index,
        _ => name_or_index.parse().wrap_err_with(|| {
            format!("Column {name_or_index:?} isn't in the header or a column index")
        })?,
    };
    // Without a header, 'header' is the first row, which still bounds checks the index
    if header.get(index).is_none() {
        eyre::bail!("Column {name_or_index:?} not found in CSV header: {header:?}");
    }
    tracing::debug!("Found column {name_or_index:?} at index {index}");
    Ok(index)
}

/// Which CSV columns hold the capture
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureColumns {
    pub can_h: String,
    pub can_l: String,
    /// Sample timestamps in seconds, used to infer the sample period
    pub time: Option<String>,
}

impl Default for CaptureColumns {
    fn default() -> Self {
        Self {
            can_h: String::from("CAN_H"),
            can_l: String::from("CAN_L"),
            time: None,
        }
    }
}

/// A two-channel voltage capture
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Capture {
    pub can_h: Vec<f32>,
    pub can_l: Vec<f32>,
    /// Inferred from the time column, if there was one
    pub sample_period: Option<f64>,
}

impl Capture {
    /// Read every row of the CSV
    ///
    /// Rows where any of the selected columns isn't a number are skipped.
    pub fn from_reader<R: Read>(
        reader: &mut csv::Reader<R>,
        columns: &CaptureColumns,
    ) -> eyre::Result<Self> {
        let can_h = column_index(reader, &columns.can_h)?;
        let can_l = column_index(reader, &columns.can_l)?;
        let time = match &columns.time {
            Some(time) => Some(column_index(reader, time)?),
            None => None,
        };

        let mut capture = Capture::default();
        let mut first_time = None;
        let mut last_time = None;
        let mut skipped = 0;
        for (row, record) in reader.records().enumerate() {
            let record = record.wrap_err_with(|| format!("Failed to read CSV row {row}"))?;

            let parse = |index: usize| record.get(index).and_then(|f| f.trim().parse::<f64>().ok());
            let (Some(h), Some(l)) = (parse(can_h), parse(can_l)) else {
                tracing::warn!("Skipping row {row} with unparsable CAN_H or CAN_L: {record:?}");
                skipped += 1;
                continue;
            };
            let t = match time {
                Some(index) => match parse(index) {
                    Some(t) => Some(t),
                    None => {
                        tracing::warn!("Skipping row {row} with unparsable time: {record:?}");
                        skipped += 1;
                        continue;
                    }
                },
                None => None,
            };

            capture.can_h.push(h as f32);
            capture.can_l.push(l as f32);
            if let Some(t) = t {
                first_time.get_or_insert(t);
                last_time = Some(t);
            }
        }

        let samples = capture.can_h.len();
        if let (Some(first), Some(last)) = (first_time, last_time)
            && samples > 1
        {
            capture.sample_period = Some((last - first) / (samples - 1) as f64);
        }
        tracing::debug!(
            "Read {samples} samples (skipped {skipped} rows), inferred sample period {:?}",
            capture.sample_period
        );
        Ok(capture)
    }

    /// The sample period to decode with, preferring an explicit one over the inferred one
    pub fn sample_period(&self, explicit: Option<f64>) -> eyre::Result<f64> {
        match explicit.or(self.sample_period) {
            Some(period) => Ok(period),
            None => eyre::bail!(
                "No sample period for {} samples; pass --sample-period or --time-column",
                self.can_h.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn reader(content: &'static str, has_headers: bool) -> csv::Reader<&'static [u8]> {
        csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .from_reader(content.as_bytes())
    }

    #[test]
    fn test_column_index_no_header() {
        let mut reader = reader("1,a\n2,b\n", false);

        assert_eq!(column_index(&mut reader, "1").unwrap(), 1);
        assert!(column_index(&mut reader, "2").is_err());
        assert!(column_index(&mut reader, "CAN_H").is_err());

        // the first row is still data
        let first_row = reader.records().next().unwrap().unwrap();
        assert_eq!(first_row, csv::StringRecord::from(vec!["1", "a"]));
    }

    #[test]
    fn test_column_index_by_name_or_index() {
        let mut reader = reader("time,CAN_H,CAN_L\n0,2.5,2.5\n", true);
        assert_eq!(column_index(&mut reader, "CAN_L").unwrap(), 2);
        assert_eq!(column_index(&mut reader, "0").unwrap(), 0);
        assert!(column_index(&mut reader, "CAN_X").is_err());
        assert!(column_index(&mut reader, "3").is_err());
    }

    #[test]
    fn test_infers_sample_period() {
        let mut reader = reader(
            "time,CAN_H,CAN_L\n0.0,2.5,2.5\n0.5,3.5,1.5\n1.0,3.5,1.5\n1.5,2.5,2.5\n",
            true,
        );
        let columns = CaptureColumns {
            time: Some(String::from("time")),
            ..Default::default()
        };
        let capture = Capture::from_reader(&mut reader, &columns).unwrap();
        assert_eq!(capture.can_h, [2.5, 3.5, 3.5, 2.5]);
        assert_eq!(capture.can_l, [2.5, 1.5, 1.5, 2.5]);
        assert_eq!(capture.sample_period, Some(0.5));
        assert_eq!(capture.sample_period(None).unwrap(), 0.5);
        assert_eq!(capture.sample_period(Some(0.25)).unwrap(), 0.25);
    }

    #[test]
    fn test_skips_unparsable_rows() {
        let mut reader = reader("h,l\n2.5,2.5\nnan?,1.5\n3.5,\n3.5,1.5\n", true);
        let columns = CaptureColumns {
            can_h: String::from("h"),
            can_l: String::from("1"),
            time: None,
        };
        let capture = Capture::from_reader(&mut reader, &columns).unwrap();
        assert_eq!(capture.can_h, [2.5, 3.5]);
        assert_eq!(capture.can_l, [2.5, 1.5]);
        assert_eq!(capture.sample_period, None);
        assert!(capture.sample_period(None).is_err());
    }

    #[test]
    fn test_missing_column() {
        let mut reader = reader("time,CAN_H\n0,2.5\n", true);
        let result = Capture::from_reader(&mut reader, &CaptureColumns::default());
        assert!(result.is_err());
    }
}
