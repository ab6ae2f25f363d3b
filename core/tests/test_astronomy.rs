// core/tests/test_astronomy.rs
use blueglow_core::astronomy::{illumination_from_phase, moon_illumination, moon_phase, Astronomy, SolarDay};
use blueglow_core::config::{AstronomyConfig, BlueGlowConfig, Location};
use blueglow_core::types::parse_date;
use chrono::{Duration, NaiveDate, TimeZone, Timelike, Utc};

fn la_jolla() -> Astronomy {
    Astronomy::from_config(&BlueGlowConfig::default())
}

#[test]
fn illumination_triangle_endpoints() {
    assert_eq!(illumination_from_phase(14.0), 1.0);
    assert_eq!(illumination_from_phase(0.0), 0.0);
    assert_eq!(illumination_from_phase(28.0), 0.0);
    assert!((illumination_from_phase(7.0) - 0.5).abs() < 1e-12);
    assert!((illumination_from_phase(21.0) - 0.5).abs() < 1e-12);
}

#[test]
fn illumination_stays_in_unit_interval() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for h in (0..24 * 60).step_by(7) {
        let t = t0 + Duration::hours(h);
        let phase = moon_phase(t);
        assert!((0.0..28.0).contains(&phase), "fase {phase} ved {t}");
        let illum = moon_illumination(t);
        assert!((0.0..=1.0).contains(&illum));
    }
}

#[test]
fn known_new_and_full_moon_2024() {
    // Nymåne 2024-01-11 11:57 UTC, fullmåne 2024-01-25 17:54 UTC
    let new_moon = Utc.with_ymd_and_hms(2024, 1, 11, 12, 0, 0).unwrap();
    let full_moon = Utc.with_ymd_and_hms(2024, 1, 25, 18, 0, 0).unwrap();
    assert!(moon_illumination(new_moon) < 0.1);
    assert!(moon_illumination(full_moon) > 0.9);
}

#[test]
fn tide_level_bounded_and_periodic() {
    let astro = la_jolla();
    // 12.42 t
    let period = Duration::seconds(44_712);
    let t0 = Utc.with_ymd_and_hms(2024, 3, 5, 7, 13, 0).unwrap();
    for k in 0..200 {
        let t = t0 + Duration::minutes(37 * k);
        let level = astro.tide_level(t);
        assert!((-1.0..=1.0).contains(&level));
        assert!((level - astro.tide_level(t + period)).abs() < 1e-9);
    }
}

#[test]
fn tide_is_high_at_reference() {
    let astro = la_jolla();
    let reference = astro.cfg.tide_reference;
    assert!((astro.tide_level(reference) - 1.0).abs() < 1e-12);
    let half = Duration::seconds(22_356);
    assert!((astro.tide_level(reference + half) + 1.0).abs() < 1e-9);
}

#[test]
fn tide_extremes_are_real_highs_and_lows() {
    let astro = la_jolla();
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let (highs, lows) = astro.tide_extremes(date);
    assert_eq!(highs.len(), 2);
    assert_eq!(lows.len(), 2);
    assert_eq!(highs[0], astro.cfg.tide_reference);
    for h in &highs {
        assert!(astro.tide_level(*h) > 0.999);
        assert_eq!(h.date_naive(), date);
    }
    for l in &lows {
        assert!(astro.tide_level(*l) < -0.999);
        assert_eq!(l.date_naive(), date);
    }
}

#[test]
fn extremes_on_a_later_day_stay_inside_that_day() {
    let astro = la_jolla();
    let date = NaiveDate::from_ymd_opt(2024, 8, 17).unwrap();
    let (highs, lows) = astro.tide_extremes(date);
    assert!(!highs.is_empty() && highs.len() <= 2);
    assert!(!lows.is_empty() && lows.len() <= 2);
    for t in highs.iter().chain(&lows) {
        assert_eq!(t.date_naive(), date);
    }
}

#[test]
fn near_low_tide_window() {
    let astro = la_jolla();
    let (_, lows) = astro.tide_extremes(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    let low = lows[0];
    assert!(astro.is_near_low_tide(low, 2.0));
    assert!(astro.is_near_low_tide(low + Duration::minutes(90), 2.0));
    assert!(!astro.is_near_low_tide(astro.cfg.tide_reference, 2.0));
}

#[test]
fn summer_solstice_sun_in_la_jolla() {
    let astro = la_jolla();
    let sun = astro
        .sun_events(NaiveDate::from_ymd_opt(2024, 6, 21).unwrap())
        .unwrap();
    // ~05:41 PDT = 12:41 UTC
    assert_eq!(sun.sunrise.hour(), 12);
    let day_len = (sun.sunset - sun.sunrise).num_minutes();
    assert!((840..=875).contains(&day_len), "daglengde {day_len} min");
    assert!(sun.sunrise < sun.noon && sun.noon < sun.sunset);
}

#[test]
fn polar_day_is_reported() {
    let svalbard = Astronomy::new(
        Location {
            name: "Longyearbyen".into(),
            lat: 78.22,
            lon: 15.65,
        },
        AstronomyConfig::default(),
    );
    let midsummer = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
    assert_eq!(svalbard.solar_day(midsummer).unwrap(), SolarDay::AlwaysUp);
    assert!(svalbard.sun_events(midsummer).is_err());
    let midwinter = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
    assert_eq!(svalbard.solar_day(midwinter).unwrap(), SolarDay::AlwaysDown);
    assert!(svalbard.is_night(Utc.with_ymd_and_hms(2024, 12, 21, 12, 0, 0).unwrap()));
}

#[test]
fn night_flag_handles_sunset_after_utc_midnight() {
    let astro = la_jolla();
    // 13:00 PDT
    assert!(!astro.is_night(Utc.with_ymd_and_hms(2024, 6, 21, 20, 0, 0).unwrap()));
    // 19:00 PDT, sola fortsatt oppe, men UTC-datoen er 22.
    assert!(!astro.is_night(Utc.with_ymd_and_hms(2024, 6, 22, 2, 0, 0).unwrap()));
    // 23:00 PDT
    assert!(astro.is_night(Utc.with_ymd_and_hms(2024, 6, 22, 6, 0, 0).unwrap()));
}

#[test]
fn snapshot_covers_n_days_at_noon() {
    let astro = la_jolla();
    let start = parse_date("2024-02-10").unwrap();
    let snap = astro.snapshot(start, 7);
    assert_eq!(snap.forecast_days.len(), 7);
    for (i, day) in snap.forecast_days.iter().enumerate() {
        assert_eq!(day.date.date_naive(), start + Duration::days(i as i64));
        assert_eq!(day.date.hour(), 12);
        assert!(day.sun.is_some());
        assert!(day.tide.low_tide_times.len() <= 2);
        assert_eq!(
            day.moon.is_dark_night,
            moon_illumination(day.date) < astro.cfg.dark_threshold
        );
    }
}

#[test]
fn malformed_dates_are_rejected() {
    assert!(parse_date("2024-13-01").is_err());
    assert!(parse_date("not a date").is_err());
    assert!(parse_date(" 2024-02-29 ").is_ok());
}
