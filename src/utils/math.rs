use std::f64::consts::PI;
use chrono::{Datelike, Timelike, NaiveDateTime, NaiveDate};

pub fn radian_to_degree(radian: f64) -> f64 {
    180.0 * radian / PI
}

pub fn degree_to_radian(degree: f64) -> f64 {
    PI * degree / 180.0
}

pub fn hour_to_degree(hour: f64) -> f64 {
    hour * 360.0 / 24.0
}

pub fn degree_to_hour(degree: f64) -> f64 {
    degree * 24.0 / 360.0
}

/// Wraps angle into [0, 360)
pub fn normalize_degree(degree: f64) -> f64 {
    let result = degree.rem_euclid(360.0);
    // rem_euclid may return exactly 360.0 for tiny negative input
    if result >= 360.0 { 0.0 } else { result }
}

/// Wraps hours into [0, 24)
pub fn normalize_hour(hour: f64) -> f64 {
    let result = hour.rem_euclid(24.0);
    if result >= 24.0 { 0.0 } else { result }
}

#[test]
fn test_normalize_degree() {
    assert_eq!(normalize_degree(0.0), 0.0);
    assert_eq!(normalize_degree(360.0), 0.0);
    assert_eq!(normalize_degree(-90.0), 270.0);
    assert_eq!(normalize_degree(725.0), 5.0);
    assert!(normalize_degree(-1e-20) < 360.0);
    assert_eq!(normalize_hour(-1.0), 23.0);
    assert_eq!(normalize_hour(24.5), 0.5);
}

pub fn calc_julian_day(date: &NaiveDate) -> i64 {
    let mon = date.month() as i64;
    let day = date.day() as i64;
    let year = date.year() as i64;
    let a = (14 - mon) / 12;
    let y = year + 4800 - a;
    let m = mon + 12 * a - 3;
    day + (153 * m + 2)/5 + 365*y + y/4 - y/100 + y/400 - 32045
}

#[test]
fn test_calc_julian_day() {
    assert_eq!(
        calc_julian_day(&NaiveDate::from_ymd_opt(2001, 1, 1).unwrap()),
        2_451_911
    );
}

/// Astronomical julian date (days since noon of 1 Jan 4713 BC)
pub fn calc_julian_time(dt: &NaiveDateTime) -> f64 {
    let julian_day = calc_julian_day(&dt.date()) as f64;
    let hour = dt.hour() as f64;
    let min = dt.minute() as f64;
    let sec = dt.second() as f64 + dt.nanosecond() as f64 / 1_000_000_000.0;
    julian_day + (hour - 12.0) / 24.0 + min / 1440.0 + sec / 86400.0
}

#[test]
fn test_calc_julian_time() {
    let jd = calc_julian_time(&j2000_time());
    assert!(f64::abs(jd - 2_451_545.0) < 1e-9);
}

/// Greenwich mean sidereal time in degrees [0, 360)
pub fn calc_sidereal_time(dt: &NaiveDateTime) -> f64 {
    let jdt = calc_julian_time(dt);
    let dtt = jdt - 2451545.0;
    let t = dtt / 36525.0;
    let result_in_degrees =
        280.46061837
        + 360.98564736629 * dtt
        + 0.000387933 * t * t
        - (t * t * t) / 38710000.0;
    normalize_degree(result_in_degrees)
}

#[test]
fn test_calc_sidereal_time() {
    // At J2000.0 GMST is 18h41m50.5s
    let gmst = calc_sidereal_time(&j2000_time());
    assert!(f64::abs(gmst - 280.46061837) < 1e-6);
}

pub fn j2000_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
}
