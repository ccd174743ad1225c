//! Batch runs over a watchlist, end to end on disk.

use adamlab_core::{HolidayCalendar, WeekdayCalendar};
use adamlab_runner::{
    load_manifest, load_watchlist, run_batch, BatchFailure, CsvSink, RunConfig, RunError,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

const PRICES: &str = "\u{feff}Date,Open,High,Low,Close,Adj Close,Volume
2024-01-08,10,10,10,10,10,100
2024-01-09,12,12,12,12,12,100
2024-01-10,8,8,8,8,8,100
2024-01-11,11,11,11,11,11,100
2024-01-12,9,9,9,9,9,100
";

fn ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 12)
        .unwrap()
        .and_hms_opt(18, 0, 0)
        .unwrap()
}

fn setup(root: &Path) -> RunConfig {
    let data = root.join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("AAA.csv"), PRICES).unwrap();
    std::fs::write(root.join("other.csv"), PRICES).unwrap();
    std::fs::write(data.join("EMPTY.csv"), "Date,Close\n").unwrap();

    let mut config = RunConfig::default();
    config.data.data_dir = data;
    config.output.output_dir = root.join("out");
    config
}

fn write_watchlist(root: &Path) -> std::path::PathBuf {
    let other = root.join("other.csv");
    let text = format!(
        "ticker,name,sheet_name,csv,pivot_date,lookback,horizon,pivot_side,market\n\
         AAA,Alpha,,,,3,2,high,\n\
         BBB,Beta,Beta Sheet,{},2024-01-11,,1,,\n\
         MISSING,,,,,,,,\n\
         EMPTY,,,,,,,,\n\
         BAD,,,,,zero,,,\n\
         ,,,,,,,,\n",
        other.display()
    );
    let path = root.join("watchlist.csv");
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn batch_isolates_failures_and_writes_run_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let entries = load_watchlist(&write_watchlist(dir.path())).unwrap();
    assert_eq!(entries.len(), 5);

    let sink = CsvSink::new(&config.output.output_dir);
    let report = run_batch(&entries, &config, None, &sink, &WeekdayCalendar, ts());

    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 3);

    let tickers: Vec<&str> = report.outcomes.iter().map(|o| o.ticker.as_str()).collect();
    assert_eq!(tickers, ["AAA", "BBB", "MISSING", "EMPTY", "BAD"]);

    let aaa = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(aaa.rows, 7);
    assert_eq!(aaa.pivot.close, 11.0);

    let bbb = &report.outcomes[1];
    assert_eq!(bbb.sheet_name, "Beta Sheet");
    assert_eq!(bbb.result.as_ref().unwrap().rows, 6);

    assert!(matches!(
        report.outcomes[2].result,
        Err(BatchFailure::Run(RunError::Source { .. }))
    ));
    assert!(matches!(
        report.outcomes[3].result,
        Err(BatchFailure::Run(RunError::Pipeline { .. }))
    ));
    assert!(matches!(report.outcomes[4].result, Err(BatchFailure::Watchlist(_))));

    let manifest = load_manifest(&config.output.output_dir.join("Beta Sheet")).unwrap();
    assert_eq!(manifest.ticker, "BBB");
    assert_eq!(manifest.pivot.date, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
    let combined =
        std::fs::read_to_string(config.output.output_dir.join("Beta Sheet/combined.csv")).unwrap();
    // 2 * 11 - 8
    assert!(combined.ends_with("2024-01-15,,14\n"));

    let log_path = report.write_run_log(&config.output.output_dir).unwrap();
    assert_eq!(log_path.file_name().unwrap(), "run_log_20240112_180000.csv");
    let log = std::fs::read_to_string(log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("AAA,AAA,ok,7,2024-01-11,"));
    assert!(lines[3].starts_with("MISSING,MISSING,failed,,,,,"));
}

#[test]
fn batch_uses_configured_holidays() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path());
    config.calendar.holidays = vec![NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()];
    let entries = load_watchlist(&write_watchlist(dir.path())).unwrap();
    let calendar: HolidayCalendar = config.business_calendar();

    let sink = CsvSink::new(&config.output.output_dir);
    let report = run_batch(&entries[..1], &config, None, &sink, &calendar, ts());
    assert_eq!(report.succeeded(), 1);

    let projection =
        std::fs::read_to_string(config.output.output_dir.join("AAA/projection.csv")).unwrap();
    assert_eq!(projection, "No.,Date,Projected\n1,2024-01-16,14\n2,2024-01-17,10\n");
}
