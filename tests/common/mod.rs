#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use dayahead::prelude::*;

/// First and last UTC hour of the synthetic market extracts.
pub const MARKET_START: &str = "2017-12-20 00:00:00";
pub const MARKET_END: &str = "2018-04-05 23:00:00";

/// UTC hour removed from the German extract to mimic a spring-forward hole.
pub const GER_DROPPED_HOUR: &str = "2018-03-25 05:00:00";
/// UTC hour repeated in the German extract to mimic a fall-back duplicate.
pub const GER_REPEATED_HOUR: &str = "2018-02-10 12:00:00";

pub fn workspace(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dayahead-it-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("raw")).expect("Failed to create raw dir");
    dir
}

pub fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_raw_dir(dir.join("raw"))
        .with_processed_dir(dir.join("processed"))
}

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("valid timestamp")
}

pub fn market_price(t: NaiveDateTime) -> f64 {
    let day = (t.date() - NaiveDate::from_ymd_opt(2017, 1, 1).unwrap()).num_days() as f64;
    40.0 + t.hour() as f64 * 1.5 + day * 0.25
}

/// Writes both market extracts and the three commodity extracts into `<dir>/raw`.
pub fn write_raw_inputs(dir: &Path) {
    let raw = dir.join("raw");
    write_market(&raw.join("entsoe_germany_2015_2025.csv"), chrono_tz::Europe::Berlin, true);
    write_market(&raw.join("entsoe_spain_2015_2025.csv"), chrono_tz::Europe::Madrid, false);
    write_european(&raw.join("CO_2_allowances_2015_2025.csv"), 20.0, "%Y-%m-%d");
    write_european(&raw.join("oil_2015_2025.csv"), 60.0, "%d.%m.%Y");
    write_investing(&raw.join("ttf_gas_2017_2025.csv"), 18.0);
}

fn write_market(path: &Path, tz: Tz, offshore: bool) {
    let mut out = String::from(",day_ahead_price_eur_mwh,Forecasted Load_mw,Solar_mw,Wind Onshore_mw");
    if offshore {
        out.push_str(",Wind Offshore_mw");
    }
    out.push('\n');

    let (start, end) = (ts(MARKET_START), ts(MARKET_END));
    let mut t = start;
    while t <= end {
        let repeats = match (offshore, t) {
            (true, t) if t == ts(GER_DROPPED_HOUR) => 0,
            (true, t) if t == ts(GER_REPEATED_HOUR) => 2,
            _ => 1,
        };
        let local = Utc.from_utc_datetime(&t).with_timezone(&tz);
        for _ in 0..repeats {
            out.push_str(&format!(
                "{},{},{},{},{}",
                local.format("%Y-%m-%d %H:%M:%S%:z"),
                market_price(t),
                50_000.0 + market_price(t),
                (market_price(t) - 40.0).max(0.0),
                1_000.0,
            ));
            if offshore {
                out.push_str(",250.5");
            }
            out.push('\n');
        }
        t += Duration::hours(1);
    }
    fs::write(path, out).expect("Failed to write market extract");
}

/// Trading days of the synthetic commodity extracts: weekdays only, with a
/// Christmas cluster from 2017-12-22 to 2017-12-26.
pub fn trading_days() -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut d = NaiveDate::from_ymd_opt(2017, 12, 1).unwrap();
    let last = NaiveDate::from_ymd_opt(2018, 4, 10).unwrap();
    let holidays = (22..=26)
        .map(|day| NaiveDate::from_ymd_opt(2017, 12, day).unwrap())
        .collect::<Vec<_>>();
    while d <= last {
        let weekend = matches!(d.weekday(), Weekday::Sat | Weekday::Sun);
        if !weekend && !holidays.contains(&d) {
            days.push(d);
        }
        d += Duration::days(1);
    }
    days
}

pub fn quote(base: f64, d: NaiveDate) -> (f64, f64) {
    let offset = d.ordinal() as f64 * 0.125;
    (base + offset, base + offset + 0.5)
}

fn write_european(path: &Path, base: f64, date_format: &str) {
    let mut out = String::from("Datum;Erster;Hoch;Tief;Schlusskurs;Stuecke;Volumen\n");
    // Newest first, as the provider exports it.
    for d in trading_days().into_iter().rev() {
        let (open, close) = quote(base, d);
        out.push_str(&format!(
            "{};{};{};{};{};1000;50000\n",
            d.format(date_format),
            decimal_comma(open),
            decimal_comma(close + 1.0),
            decimal_comma(open - 1.0),
            decimal_comma(close),
        ));
    }
    fs::write(path, out).expect("Failed to write european extract");
}

fn write_investing(path: &Path, base: f64) {
    let mut out = String::from("\"Date\",\"Price\",\"Open\",\"High\",\"Low\",\"Vol.\",\"Change %\"\n");
    for d in trading_days().into_iter().rev() {
        let (open, close) = quote(base, d);
        out.push_str(&format!(
            "\"{}\",\"{close}\",\"{open}\",\"{}\",\"{}\",\"\",\"0.10%\"\n",
            d.format("%m/%d/%Y"),
            close + 1.0,
            open - 1.0,
        ));
    }
    fs::write(path, out).expect("Failed to write investing extract");
}

fn decimal_comma(v: f64) -> String {
    format!("{v}").replace('.', ",")
}
