//! Dataset directory of per-tick CSV files.
//!
//! `<ts>.csv` holds one candle row per symbol, `<ts>.of.csv` holds the
//! logs, transactions and plots produced for the frame at `<ts>`.

use crate::domain::error::CandlebotError;
use crate::domain::market::{Market, MarketFrame};
use crate::domain::ohlcv::Ohlcv;
use crate::domain::output::{FunctionPlot, Log, OutputFrame, Transaction};
use crate::domain::symbol::Symbol;
use crate::ports::dataset_port::{DatasetPort, LoadedDataset, SkippedFile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const OUTPUT_SUFFIX: &str = ".of.csv";
const MARKET_SUFFIX: &str = ".csv";

#[derive(Debug, Serialize, Deserialize)]
struct CandleRow {
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct OutputRow {
    record: String,
    symbol: Option<String>,
    operation: Option<String>,
    kind: Option<String>,
    label: Option<String>,
    value: Option<String>,
    color: Option<String>,
    notes: Option<String>,
}

pub struct CsvDatasetAdapter {
    base_path: PathBuf,
}

impl CsvDatasetAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn market_path(&self, timestamp: i64) -> PathBuf {
        self.base_path.join(format!("{}{}", timestamp, MARKET_SUFFIX))
    }

    fn output_path(&self, timestamp: i64) -> PathBuf {
        self.base_path.join(format!("{}{}", timestamp, OUTPUT_SUFFIX))
    }

    /// Serialize `rows` next to `path`, then rename into place.
    fn write_rows<T: Serialize>(&self, path: &Path, rows: &[T]) -> Result<(), CandlebotError> {
        fs::create_dir_all(&self.base_path)?;
        let tmp = NamedTempFile::new_in(&self.base_path)?;
        {
            let mut wtr = csv::Writer::from_writer(tmp.as_file());
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        tmp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), rows = rows.len(), "wrote dataset file");
        Ok(())
    }
}

fn candle_rows(frame: &MarketFrame) -> Vec<CandleRow> {
    frame
        .ohlcv
        .iter()
        .map(|(symbol, c)| CandleRow {
            symbol: symbol.to_string(),
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        })
        .collect()
}

fn output_rows(output: &OutputFrame) -> Vec<OutputRow> {
    let logs = output.logs.iter().map(|log| OutputRow {
        record: "log".into(),
        symbol: log.symbol.as_ref().map(Symbol::to_string),
        kind: Some(log.kind.to_string()),
        value: Some(log.value.clone()),
        ..OutputRow::default()
    });
    let transactions = output.transactions.iter().map(|t| OutputRow {
        record: "transaction".into(),
        symbol: Some(t.symbol.to_string()),
        operation: Some(t.operation.to_string()),
        notes: t.notes.clone(),
        ..OutputRow::default()
    });
    let plots = output.function_plots.iter().map(|p| OutputRow {
        record: "plot".into(),
        symbol: p.symbol.as_ref().map(Symbol::to_string),
        label: Some(p.label.clone()),
        value: Some(p.value.to_string()),
        color: Some(p.color.to_string()),
        ..OutputRow::default()
    });
    logs.chain(transactions).chain(plots).collect()
}

fn parse_market_file(path: &Path, timestamp: i64) -> Result<MarketFrame, String> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| e.to_string())?;
    let mut frame = MarketFrame::new(timestamp);
    for row in rdr.deserialize::<CandleRow>() {
        let row = row.map_err(|e| e.to_string())?;
        let symbol: Symbol = row.symbol.parse().map_err(|e| format!("{}", e))?;
        let candle = Ohlcv {
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if frame.ohlcv.insert(symbol.clone(), candle).is_some() {
            return Err(format!("duplicate row for {}", symbol));
        }
    }
    if frame.ohlcv.is_empty() {
        return Err("no candle rows".into());
    }
    Ok(frame)
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, String> {
    field
        .as_deref()
        .ok_or_else(|| format!("missing {} column", name))
}

fn parse_symbol(field: &Option<String>) -> Result<Symbol, String> {
    required(field, "symbol")?.parse().map_err(|e| format!("{}", e))
}

fn parse_optional_symbol(field: &Option<String>) -> Result<Option<Symbol>, String> {
    match field {
        Some(_) => parse_symbol(field).map(Some),
        None => Ok(None),
    }
}

fn parse_output_file(path: &Path, timestamp: i64) -> Result<OutputFrame, String> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| e.to_string())?;
    let mut output = OutputFrame::new(timestamp);
    for row in rdr.deserialize::<OutputRow>() {
        let row = row.map_err(|e| e.to_string())?;
        match row.record.as_str() {
            "log" => output.logs.push(Log {
                timestamp,
                kind: required(&row.kind, "kind")?.parse()?,
                symbol: parse_optional_symbol(&row.symbol)?,
                value: row.value.unwrap_or_default(),
            }),
            "transaction" => output.transactions.push(Transaction::new(
                timestamp,
                required(&row.operation, "operation")?.parse()?,
                parse_symbol(&row.symbol)?,
                row.notes,
            )),
            "plot" => output.function_plots.push(FunctionPlot {
                timestamp,
                label: required(&row.label, "label")?.to_string(),
                value: required(&row.value, "value")?
                    .parse()
                    .map_err(|e| format!("invalid plot value: {}", e))?,
                color: required(&row.color, "color")?.parse()?,
                symbol: parse_optional_symbol(&row.symbol)?,
            }),
            other => return Err(format!("unknown record type {:?}", other)),
        }
    }
    Ok(output)
}

enum DatasetFile {
    Market(i64, PathBuf),
    Output(i64, PathBuf),
}

/// Classify a directory entry by name; `None` for files that are not part of a dataset.
fn classify(path: PathBuf) -> Option<Result<DatasetFile, SkippedFile>> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let (stem, is_output) = if let Some(stem) = name.strip_suffix(OUTPUT_SUFFIX) {
        (stem.to_string(), true)
    } else if let Some(stem) = name.strip_suffix(MARKET_SUFFIX) {
        (stem.to_string(), false)
    } else {
        return None;
    };
    Some(match stem.parse::<i64>() {
        Ok(ts) if is_output => Ok(DatasetFile::Output(ts, path)),
        Ok(ts) => Ok(DatasetFile::Market(ts, path)),
        Err(_) => Err(SkippedFile {
            file: name,
            reason: "file name is not a unix timestamp".into(),
        }),
    })
}

fn skip(skipped: &mut Vec<SkippedFile>, path: &Path, reason: String) {
    let file = path.display().to_string();
    warn!(%file, %reason, "skipping dataset file");
    skipped.push(SkippedFile { file, reason });
}

impl DatasetPort for CsvDatasetAdapter {
    fn save(&self, market: &Market) -> Result<(), CandlebotError> {
        for entry in market.entries() {
            self.save_frame(&entry.frame)?;
            if let Some(output) = &entry.output {
                self.save_output(output)?;
            }
        }
        Ok(())
    }

    fn save_frame(&self, frame: &MarketFrame) -> Result<(), CandlebotError> {
        self.write_rows(&self.market_path(frame.timestamp), &candle_rows(frame))
    }

    fn save_output(&self, output: &OutputFrame) -> Result<(), CandlebotError> {
        self.write_rows(&self.output_path(output.timestamp), &output_rows(output))
    }

    fn load(&self) -> Result<LoadedDataset, CandlebotError> {
        let mut market_files = Vec::new();
        let mut output_files = Vec::new();
        let mut skipped = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match classify(path) {
                Some(Ok(DatasetFile::Market(ts, path))) => market_files.push((ts, path)),
                Some(Ok(DatasetFile::Output(ts, path))) => output_files.push((ts, path)),
                Some(Err(s)) => {
                    warn!(file = %s.file, reason = %s.reason, "skipping dataset file");
                    skipped.push(s);
                }
                None => {}
            }
        }
        market_files.sort_by_key(|(ts, _)| *ts);
        output_files.sort_by_key(|(ts, _)| *ts);

        let mut frames = Vec::with_capacity(market_files.len());
        for (ts, path) in &market_files {
            match parse_market_file(path, *ts) {
                Ok(frame) => frames.push(frame),
                Err(reason) => skip(&mut skipped, path, reason),
            }
        }

        let mut outputs: HashMap<i64, OutputFrame> = HashMap::new();
        for (ts, path) in &output_files {
            if !frames.iter().any(|f| f.timestamp == *ts) {
                skip(&mut skipped, path, "no market frame with this timestamp".into());
                continue;
            }
            match parse_output_file(path, *ts) {
                Ok(output) => {
                    outputs.insert(*ts, output);
                }
                Err(reason) => skip(&mut skipped, path, reason),
            }
        }

        let mut market = Market::new();
        for frame in frames {
            match outputs.remove(&frame.timestamp) {
                Some(output) => market.push_with_output(frame, output),
                None => market.push(frame),
            }
        }

        debug!(
            path = %self.base_path.display(),
            frames = market.len(),
            skipped = skipped.len(),
            "loaded dataset"
        );
        Ok(LoadedDataset { market, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::output::{LogKind, Operation, PlotColor};
    use tempfile::TempDir;

    fn btc() -> Symbol {
        Symbol::pair("BTC", "USDT")
    }

    fn frame(ts: i64, close: f64) -> MarketFrame {
        MarketFrame::new(ts)
            .with(
                btc(),
                Ohlcv {
                    open: 0.1 + 0.2,
                    high: close * 1.1,
                    low: 1e-9,
                    close,
                    volume: 123456.789,
                },
            )
            .with(
                Symbol::ticker("AAPL"),
                Ohlcv {
                    open: 1.0,
                    high: 2.0,
                    low: 0.5,
                    close: 1.5,
                    volume: 10.0,
                },
            )
    }

    fn output(ts: i64) -> OutputFrame {
        let mut out = OutputFrame::new(ts);
        out.logs.push(Log::text(ts, "hello, \"world\"", None));
        out.logs.push(Log::structured(
            ts,
            &serde_json::json!({"fma": 1.5, "sma": 2.5}),
            Some(btc()),
        ));
        out.transactions.push(Transaction {
            timestamp: ts,
            operation: Operation::Buy,
            symbol: btc(),
            notes: Some("FMA 10.5 crossed SMA 10.2".into()),
        });
        out.function_plots.push(FunctionPlot {
            timestamp: ts,
            label: "BTC/USDT FMA".into(),
            value: 1.0 / 3.0,
            color: PlotColor::Blue,
            symbol: Some(btc()),
        });
        out
    }

    #[test]
    fn save_then_load_is_bit_exact() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvDatasetAdapter::new(dir.path().to_path_buf());

        let mut market = Market::new();
        market.push(frame(60, 100.0 / 7.0));
        market.push_with_output(frame(120, 3.3), output(120));
        adapter.save(&market).unwrap();

        let loaded = adapter.load().unwrap();
        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.market, market);

        let entry = &loaded.market.entries()[1];
        let out = entry.output.as_ref().unwrap();
        assert_eq!(out.logs[1].kind, LogKind::Structured);
        assert_eq!(out.function_plots[0].value.to_bits(), (1.0f64 / 3.0).to_bits());
    }

    #[test]
    fn empty_transaction_note_round_trips() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvDatasetAdapter::new(dir.path().to_path_buf());
        let mut out = OutputFrame::new(60);
        out.transactions
            .push(Transaction::new(60, Operation::Sell, btc(), Some(String::new())));
        out.transactions.push(Transaction::new(60, Operation::Skip, btc(), None));

        let mut market = Market::new();
        market.push_with_output(frame(60, 2.0), out);
        adapter.save(&market).unwrap();

        assert_eq!(adapter.load().unwrap().market, market);
    }

    #[test]
    fn load_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvDatasetAdapter::new(dir.path().to_path_buf());
        for ts in [1000, 20, 300] {
            adapter.save_frame(&frame(ts, 1.0)).unwrap();
        }
        let loaded = adapter.load().unwrap();
        assert_eq!(loaded.market.timestamps(), vec![20, 300, 1000]);
    }

    #[test]
    fn malformed_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvDatasetAdapter::new(dir.path().to_path_buf());
        adapter.save_frame(&frame(60, 1.0)).unwrap();
        adapter.save_frame(&frame(180, 1.0)).unwrap();
        fs::write(
            dir.path().join("120.csv"),
            "symbol,open,high,low,close,volume\nBTC/USDT,abc,1,1,1,1\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.csv"), "whatever\n").unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let loaded = adapter.load().unwrap();
        assert_eq!(loaded.market.timestamps(), vec![60, 180]);
        assert_eq!(loaded.skipped.len(), 2);
        assert!(loaded.skipped.iter().any(|s| s.file.ends_with("120.csv")));
    }

    #[test]
    fn orphan_output_is_skipped() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvDatasetAdapter::new(dir.path().to_path_buf());
        adapter.save_frame(&frame(60, 1.0)).unwrap();
        adapter.save_output(&output(999)).unwrap();

        let loaded = adapter.load().unwrap();
        assert_eq!(loaded.market.len(), 1);
        assert!(loaded.market.entries()[0].output.is_none());
        assert_eq!(loaded.skipped.len(), 1);
    }

    #[test]
    fn unknown_record_type_skips_output() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvDatasetAdapter::new(dir.path().to_path_buf());
        adapter.save_frame(&frame(60, 1.0)).unwrap();
        fs::write(
            dir.path().join("60.of.csv"),
            "record,symbol,operation,kind,label,value,color,notes\nalert,,,,,,,\n",
        )
        .unwrap();

        let loaded = adapter.load().unwrap();
        assert_eq!(loaded.market.len(), 1);
        assert_eq!(loaded.skipped.len(), 1);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let adapter = CsvDatasetAdapter::new(PathBuf::from("/nonexistent/candlebot/dataset"));
        assert!(matches!(adapter.load(), Err(CandlebotError::Io(_))));
    }

    #[test]
    fn output_file_layout() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvDatasetAdapter::new(dir.path().to_path_buf());
        adapter.save_output(&output(60)).unwrap();
        let text = fs::read_to_string(dir.path().join("60.of.csv")).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("record,symbol,operation,kind,label,value,color,notes")
        );
        assert!(text.contains("transaction,BTC/USDT,BUY,,,,,FMA 10.5 crossed SMA 10.2"));
    }
}
