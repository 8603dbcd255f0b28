//! Conversion between equatorial coordinates used by clients (RA in hours,
//! DEC in degrees) and horizontal coordinates used by rotctld.
//!
//! Astronomical formulas measure azimuth from the south. Rotctld counts it
//! from the north, so `to_horizontal` subtracts 180° from the computed
//! azimuth and `to_equatorial` adds it back before the inverse conversion.

use std::fmt::Debug;
use chrono::NaiveDateTime;

use crate::{observer::ObserverPosition, utils::{math::*, sexagesimal::*}};

/// Offset between south-based azimuth of the formulas and rotctld's azimuth
pub const ROTCTLD_AZIMUTH_OFFSET: f64 = 180.0;

#[derive(Clone, Copy, Default, PartialEq)]
pub struct EqCoord {
    pub ra:  f64, // in hours
    pub dec: f64, // in degrees
}

impl EqCoord {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }
}

impl Debug for EqCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqCoord")
            .field("ra", &value_to_sexagesimal(self.ra, true, 2))
            .field("dec", &value_to_sexagesimal(self.dec, true, 1))
            .finish()
    }
}

#[derive(Clone, Copy, Default, PartialEq)]
pub struct HorizCoord {
    pub az: f64, // in degrees
    pub el: f64, // in degrees
}

impl HorizCoord {
    pub fn new(az: f64, el: f64) -> Self {
        Self { az, el }
    }
}

impl Debug for HorizCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HorizCoord")
            .field("az", &value_to_sexagesimal(self.az, true, 1))
            .field("el", &value_to_sexagesimal(self.el, true, 1))
            .finish()
    }
}

// Unit vector on celestial sphere
//
// hour angle frame:       horizontal frame:
//  x: meridian (H = 0)     x: south
//  y: H = 90° (west)       y: west
//  z: north pole           z: zenith
struct SpherePt {
    x: f64,
    y: f64,
    z: f64,
}

impl SpherePt {
    fn from_angles(lon: f64, lat: f64) -> Self {
        let (sin_lon, cos_lon) = f64::sin_cos(degree_to_radian(lon));
        let (sin_lat, cos_lat) = f64::sin_cos(degree_to_radian(lat));
        Self {
            x: cos_lat * cos_lon,
            y: cos_lat * sin_lon,
            z: sin_lat,
        }
    }

    fn to_angles(&self) -> (f64, f64) {
        let lon = radian_to_degree(f64::atan2(self.y, self.x));
        let lat = radian_to_degree(f64::atan2(self.z, f64::hypot(self.x, self.y)));
        (lon, lat)
    }
}

fn local_sidereal_time(observer: &ObserverPosition, time: &NaiveDateTime) -> f64 {
    calc_sidereal_time(time) + observer.longitude
}

/// Horizontal coordinates with azimuth measured from the south (westward)
pub fn raw_horizontal(
    observer: &ObserverPosition,
    eq:       &EqCoord,
    time:     &NaiveDateTime,
) -> HorizCoord {
    let hour_angle = local_sidereal_time(observer, time) - hour_to_degree(eq.ra);
    let pt = SpherePt::from_angles(hour_angle, eq.dec);
    let (sin_lat, cos_lat) = f64::sin_cos(degree_to_radian(observer.latitude));
    let hrz_pt = SpherePt {
        x: pt.x * sin_lat - pt.z * cos_lat,
        y: pt.y,
        z: pt.x * cos_lat + pt.z * sin_lat,
    };
    let (az, el) = hrz_pt.to_angles();
    HorizCoord { az: normalize_degree(az), el }
}

/// Inverse of `raw_horizontal`
pub fn raw_equatorial(
    observer: &ObserverPosition,
    horiz:    &HorizCoord,
    time:     &NaiveDateTime,
) -> EqCoord {
    let pt = SpherePt::from_angles(horiz.az, horiz.el);
    let (sin_lat, cos_lat) = f64::sin_cos(degree_to_radian(observer.latitude));
    let eq_pt = SpherePt {
        x: pt.x * sin_lat + pt.z * cos_lat,
        y: pt.y,
        z: pt.z * sin_lat - pt.x * cos_lat,
    };
    let (hour_angle, dec) = eq_pt.to_angles();
    let ra = local_sidereal_time(observer, time) - hour_angle;
    EqCoord { ra: normalize_hour(degree_to_hour(ra)), dec }
}

/// RA/DEC -> az/el in rotctld convention (azimuth from the north)
pub fn to_horizontal(
    observer: &ObserverPosition,
    eq:       &EqCoord,
    time:     &NaiveDateTime,
) -> HorizCoord {
    let raw = raw_horizontal(observer, eq, time);
    HorizCoord {
        az: normalize_degree(raw.az - ROTCTLD_AZIMUTH_OFFSET),
        el: raw.el,
    }
}

/// az/el in rotctld convention -> RA/DEC
pub fn to_equatorial(
    observer: &ObserverPosition,
    horiz:    &HorizCoord,
    time:     &NaiveDateTime,
) -> EqCoord {
    let raw = HorizCoord {
        az: horiz.az + ROTCTLD_AZIMUTH_OFFSET,
        el: horiz.el,
    };
    raw_equatorial(observer, &raw, time)
}

#[cfg(test)]
fn test_time() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        .and_hms_milli_opt(21, 37, 12, 250).unwrap()
}

#[cfg(test)]
fn angle_diff(a: f64, b: f64, period: f64) -> f64 {
    let diff = (a - b).rem_euclid(period);
    f64::min(diff, period - diff)
}

#[test]
fn test_round_trip() {
    let time = test_time();
    for lat in [-90.0, -64.5, -30.0, 0.0, 12.25, 45.0, 55.75, 89.0, 90.0] {
        for lon in [-180.0, -122.4, -3.0, 0.0, 37.62, 151.2, 180.0] {
            let observer = ObserverPosition::new(lat, lon);
            for ra_idx in 0..24 {
                let ra = ra_idx as f64 + 0.37;
                for dec in [-89.5, -60.0, -23.44, -1.0, 0.0, 7.5, 45.0, 78.9, 89.5] {
                    let eq = EqCoord::new(ra, dec);
                    let horiz = to_horizontal(&observer, &eq, &time);
                    assert!((0.0..360.0).contains(&horiz.az));
                    let back = to_equatorial(&observer, &horiz, &time);
                    assert!(
                        angle_diff(back.ra, ra, 24.0) < 1e-6,
                        "ra {} -> {}, lat={}, lon={}, dec={}", ra, back.ra, lat, lon, dec
                    );
                    assert!(f64::abs(back.dec - dec) < 1e-6);
                    assert!((0.0..24.0).contains(&back.ra));
                }
            }
        }
    }
}

#[test]
fn test_rotctld_azimuth_offset() {
    let time = test_time();
    let observer = ObserverPosition::new(51.48, -0.0015);
    for (ra, dec) in [(0.0, 0.0), (5.5, -20.0), (10.0, 45.0), (18.2, 70.0)] {
        let eq = EqCoord::new(ra, dec);
        let raw = raw_horizontal(&observer, &eq, &time);
        let horiz = to_horizontal(&observer, &eq, &time);
        assert!(angle_diff(horiz.az, raw.az - 180.0, 360.0) < 1e-9);
        assert_eq!(horiz.el, raw.el);

        let back_raw = raw_equatorial(&observer, &raw, &time);
        let back = to_equatorial(&observer, &horiz, &time);
        assert!(angle_diff(back.ra, back_raw.ra, 24.0) < 1e-9);
        assert!(f64::abs(back.dec - back_raw.dec) < 1e-9);
    }
}

#[test]
fn test_known_positions() {
    let time = test_time();
    let observer = ObserverPosition::new(50.0, 20.0);
    let lst_hours = degree_to_hour(normalize_degree(local_sidereal_time(&observer, &time)));

    // On meridian to the south: rotctld azimuth 180
    let horiz = to_horizontal(&observer, &EqCoord::new(lst_hours, 20.0), &time);
    assert!(f64::abs(horiz.el - 60.0) < 1e-9);
    assert!(angle_diff(horiz.az, 180.0, 360.0) < 1e-9);

    // On meridian to the north: rotctld azimuth 0
    let horiz = to_horizontal(&observer, &EqCoord::new(lst_hours, 70.0), &time);
    assert!(f64::abs(horiz.el - 70.0) < 1e-9);
    assert!(angle_diff(horiz.az, 0.0, 360.0) < 1e-9);

    // Rising on celestial equator: due east at horizon
    let horiz = to_horizontal(&observer, &EqCoord::new(normalize_hour(lst_hours + 6.0), 0.0), &time);
    assert!(f64::abs(horiz.el) < 1e-9);
    assert!(angle_diff(horiz.az, 90.0, 360.0) < 1e-9);

    // Zenith
    let horiz = to_horizontal(&observer, &EqCoord::new(lst_hours, 50.0), &time);
    assert!(f64::abs(horiz.el - 90.0) < 1e-9);
}

#[test]
fn test_conversion_is_deterministic() {
    let time = test_time();
    let observer = ObserverPosition::new(-33.87, 151.21);
    let eq = EqCoord::new(10.0, 45.0);
    let h1 = to_horizontal(&observer, &eq, &time);
    let h2 = to_horizontal(&observer, &eq, &time);
    assert_eq!(h1, h2);
}
