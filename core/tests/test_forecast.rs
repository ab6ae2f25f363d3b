// core/tests/test_forecast.rs
use blueglow_core::astronomy::{season_sin, Astronomy};
use blueglow_core::climatology::Climatology;
use blueglow_core::config::{BlueGlowConfig, RatingThresholds};
use blueglow_core::features::{feature_names, Environment, NightMode};
use blueglow_core::forecast::{
    best_window, daily_recommendation, detailed_recommendation, night_low_tides_first, score_at,
    score_from_probability, Forecaster,
};
use blueglow_core::model::{sigmoid, Evaluation, ModelMetadata, TrainedModel, MODEL_TYPE};
use blueglow_core::types::{Rating, SlotConditions, Timeslot};
use blueglow_core::BlueGlowError;
use chrono::{Duration, NaiveDate, TimeZone, Utc};

fn known_model() -> TrainedModel {
    TrainedModel {
        model_type: MODEL_TYPE.to_string(),
        intercept: -1.0,
        // moon, is_night, tide, wave, temp, season
        coefficients: vec![0.0, 0.5, -0.5, -1.0, 0.1, 2.0],
        feature_names: feature_names(),
        metadata: ModelMetadata {
            trained_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            version: "1.0-climatology".to_string(),
            n_samples: 0,
            positive_rate: 0.0,
            seed: 42,
            iterations: 0,
            converged: true,
            evaluation: Evaluation::default(),
            note: "håndlaget testmodell".to_string(),
        },
    }
}

fn fixture_climatology() -> Climatology {
    let mut clim = Climatology::from_records(&[], "test", Vec::new());
    clim.wave_height_doy.insert(1, 0.8);
    clim.water_temp_doy.insert(1, 15.0);
    clim
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

#[test]
fn hand_computed_score_for_new_year_midnight() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let env = Environment::new(&astro, &clim);
    let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let (score, features) = score_at(&known_model(), &env, t, NightMode::AssumeNight).unwrap();

    // tidevann = cos(0) = 1 ved referansen
    assert!((features.tide_level - 1.0).abs() < 1e-12);
    assert_eq!(features.wave_height, 0.8);
    assert_eq!(features.water_temp, 15.0);
    assert!(features.is_night);

    let season = (2.0 * std::f64::consts::PI / 365.0).sin();
    assert!((season_sin(t) - season).abs() < 1e-15);
    let z = -1.0 + 0.5 * 1.0 - 0.5 * 1.0 - 1.0 * 0.8 + 0.1 * 15.0 + 2.0 * season;
    let expected = (sigmoid(z) * 100.0).trunc() as u8;
    assert_eq!(expected, 43);
    assert_eq!(score, expected);
}

#[test]
fn rating_buckets_are_exhaustive_and_monotonic() {
    let r = RatingThresholds::default();
    let mut prev = Rating::Poor;
    for s in 0..=100u8 {
        let rating = r.rate(s);
        assert!(rating as u8 >= prev as u8, "ikke monoton ved {s}");
        prev = rating;
    }
    assert_eq!(r.rate(0), Rating::Poor);
    assert_eq!(r.rate(29), Rating::Poor);
    assert_eq!(r.rate(30), Rating::Fair);
    assert_eq!(r.rate(49), Rating::Fair);
    assert_eq!(r.rate(50), Rating::Good);
    assert_eq!(r.rate(69), Rating::Good);
    assert_eq!(r.rate(70), Rating::Excellent);
    assert_eq!(r.rate(100), Rating::Excellent);
}

#[test]
fn score_is_truncated_and_clamped() {
    assert_eq!(score_from_probability(0.4399), 43);
    assert_eq!(score_from_probability(0.7), 70);
    assert_eq!(score_from_probability(1.5), 100);
}

#[test]
fn best_window_finds_unique_best_block() {
    let mut values = vec![10.0; 30];
    for v in values.iter_mut().skip(12).take(7) {
        *v = 80.0;
    }
    let (start, mean) = best_window(&values, 7).unwrap();
    assert_eq!(start, 12);
    assert!((mean - 80.0).abs() < 1e-12);
}

#[test]
fn best_window_ties_keep_earliest() {
    let values = vec![5.0; 30];
    assert_eq!(best_window(&values, 7).map(|(s, _)| s), Some(0));

    let mut two_peaks = vec![0.0; 20];
    two_peaks[3] = 50.0;
    two_peaks[15] = 50.0;
    assert_eq!(best_window(&two_peaks, 3).map(|(s, _)| s), Some(1));
}

#[test]
fn best_window_needs_enough_days() {
    assert!(best_window(&[1.0; 6], 7).is_none());
    assert_eq!(best_window(&[1.0; 7], 7).map(|(s, _)| s), Some(0));
}

#[test]
fn daily_recommendation_texts() {
    let low = Utc.with_ymd_and_hms(2024, 1, 1, 6, 12, 36).unwrap();
    assert_eq!(
        daily_recommendation(Rating::Excellent, 0.1, &[low], 0.5),
        "Excellent conditions! Best viewing during low tide at 06:12 UTC."
    );
    assert_eq!(
        daily_recommendation(Rating::Excellent, 0.1, &[], 0.5),
        "Excellent conditions! Best viewing during low tide at evening."
    );
    assert_eq!(
        daily_recommendation(Rating::Good, 0.9, &[], 0.5),
        "Good conditions for bioluminescence viewing. Try visiting during low tide."
    );
    assert_eq!(
        daily_recommendation(Rating::Fair, 0.9, &[], 0.5),
        "Fair conditions. May see some bioluminescence, but not guaranteed."
    );
    assert_eq!(
        daily_recommendation(Rating::Poor, 0.51, &[], 0.5),
        "Poor conditions due to bright moonlight. Try a darker night."
    );
    assert_eq!(
        daily_recommendation(Rating::Poor, 0.5, &[], 0.5),
        "Conditions are not ideal. Check back in a few days."
    );
}

fn slot(time: &str, score: u8, is_night: bool) -> Timeslot {
    Timeslot {
        time: time.to_string(),
        datetime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        score,
        rating: RatingThresholds::default().rate(score),
        is_night,
        conditions: SlotConditions {
            moon_illumination: 0.1,
            tide_level: -0.9,
            near_low_tide: true,
            wave_height_m: 0.8,
            water_temp_c: 15.0,
        },
    }
}

#[test]
fn detailed_recommendation_uses_best_night_slot() {
    let r = RatingThresholds::default();
    assert_eq!(
        detailed_recommendation(&[slot("12:00", 90, false)], &r),
        "No night-time slots available"
    );
    assert_eq!(
        detailed_recommendation(
            &[slot("00:00", 71, true), slot("03:00", 75, true), slot("21:00", 75, true)],
            &r
        ),
        "Best window: 03:00 (score 75), night-time low tide window"
    );
    assert_eq!(
        detailed_recommendation(&[slot("03:00", 55, true), slot("12:00", 95, false)], &r),
        "Recommended slot: 03:00 (score 55)"
    );
    assert_eq!(
        detailed_recommendation(&[slot("03:00", 49, true)], &r),
        "Conditions are average today, consider another date"
    );
}

#[test]
fn daily_best_week_matches_window_over_all_days() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let model = known_model();
    let fc = Forecaster::new(&cfg, &model, &astro, &clim);

    let doc = fc.best_week_daily(start()).unwrap();
    assert_eq!(doc.forecasts.len(), 7);
    for pair in doc.forecasts.windows(2) {
        assert_eq!(pair[1].date, pair[0].date + Duration::days(1));
    }

    let all: Vec<f64> = start()
        .iter_days()
        .take(30)
        .map(|d| f64::from(fc.daily(d).unwrap().score))
        .collect();
    let (best_start, best_avg) = best_window(&all, 7).unwrap();
    assert_eq!(doc.forecasts[0].date, start() + Duration::days(best_start as i64));
    assert_eq!(
        doc.metadata.best_window_avg,
        Some((best_avg * 10.0).round() / 10.0)
    );

    for day in &doc.forecasts {
        assert_eq!(day.rating, cfg.rating.rate(day.score));
        assert!(day.conditions.tide.low_tide_times.len() <= 2);
        assert_eq!(day.day_of_week, day.date.format("%A").to_string());
    }
    assert_eq!(doc.model_version, "1.0-climatology");
    assert_eq!(doc.location.name, "La Jolla Shores (Scripps Nearshore)");
    assert_eq!(doc.metadata.search_window, "30 days");
    assert!(doc.forecast_type.is_none());
}

#[test]
fn daily_document_json_shape() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let model = known_model();
    let doc = Forecaster::new(&cfg, &model, &astro, &clim)
        .best_week_daily(start())
        .unwrap();

    let v = serde_json::to_value(&doc).unwrap();
    let day = &v["forecasts"][0];
    assert!(day["date"].as_str().unwrap().starts_with("2024-"));
    assert!(day["conditions"]["moon"]["phase"].is_string());
    assert!(day["conditions"]["tide"]["low_tide_times"].is_array());
    assert!(day["conditions"]["wave_height_m"].is_number());
    assert!(["Poor", "Fair", "Good", "Excellent"].contains(&day["rating"].as_str().unwrap()));
    assert!(v.get("forecast_type").is_none());
    assert!(v["metadata"].get("timeslot_interval").is_none());
    assert_eq!(v["metadata"]["weak_supervision"], true);
    assert_eq!(v["metadata"]["features_used"].as_array().unwrap().len(), 6);
}

#[test]
fn detailed_day_has_eight_slots_from_midnight() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let model = known_model();
    let fc = Forecaster::new(&cfg, &model, &astro, &clim);

    let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
    let (day, mean) = fc.detailed(date).unwrap();
    let times: Vec<&str> = day.timeslots.iter().map(|s| s.time.as_str()).collect();
    assert_eq!(
        times,
        ["00:00", "03:00", "06:00", "09:00", "12:00", "15:00", "18:00", "21:00"]
    );
    assert_eq!(day.avg_score, mean.trunc() as u8);
    let max = day.timeslots.iter().map(|s| s.score).max().unwrap();
    assert_eq!(day.best_score, max);
    let first_max = day.timeslots.iter().find(|s| s.score == max).unwrap();
    assert_eq!(day.best_time, first_max.time);
    assert_eq!(
        day.recommendation,
        detailed_recommendation(&day.timeslots, &cfg.rating)
    );

    // 20:00 UTC = 13:00 PDT, 06:00 UTC = 23:00 PDT
    let at = |h: &str| day.timeslots.iter().find(|s| s.time == h).unwrap();
    assert!(at("06:00").is_night);
    assert!(!at("21:00").is_night);
}

#[test]
fn detailed_best_week_document() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let model = known_model();
    let doc = Forecaster::new(&cfg, &model, &astro, &clim)
        .best_week_detailed(start())
        .unwrap();

    assert_eq!(doc.forecasts.len(), 7);
    assert_eq!(
        doc.forecast_type.as_deref(),
        Some("3-hour intervals (8 timeslots per day)")
    );
    assert_eq!(doc.metadata.timeslots_per_day, Some(8));
    assert_eq!(doc.metadata.timeslot_interval.as_deref(), Some("3 hours"));
    for day in &doc.forecasts {
        assert_eq!(day.timeslots.len(), 8);
        assert!(day.avg_score <= day.best_score);
    }
}

#[test]
fn horizon_shorter_than_window_is_an_error() {
    let mut cfg = BlueGlowConfig::default();
    cfg.forecast.horizon_days = 5;
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let model = known_model();
    let fc = Forecaster::new(&cfg, &model, &astro, &clim);
    assert!(matches!(
        fc.best_week_daily(start()),
        Err(BlueGlowError::Validation(_))
    ));
    assert!(fc.best_week_detailed(start()).is_err());
    // config-validering fanger det samme
    assert!(cfg.validate().is_err());
}

#[test]
fn next_days_scores_consecutive_days_without_search() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let model = known_model();
    let doc = Forecaster::new(&cfg, &model, &astro, &clim)
        .next_days(start())
        .unwrap();
    assert_eq!(doc.forecasts.len(), 7);
    assert_eq!(doc.forecasts[0].date, start());
    assert_eq!(doc.forecasts[6].date, start() + Duration::days(6));
    assert!(doc.metadata.search_window.is_empty());
    assert!(doc.note.contains("climatology + astronomy"));
}

#[test]
fn excellent_text_quotes_the_night_low_tide() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    // 12:00 PST og 22:00 PST
    let midday = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
    let night = Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap();
    assert!(!astro.is_night(midday));
    assert!(astro.is_night(night));

    let ordered = night_low_tides_first(&astro, &[midday, night]);
    assert_eq!(ordered, vec![night, midday]);
    assert_eq!(
        daily_recommendation(Rating::Excellent, 0.1, &ordered, 0.5),
        "Excellent conditions! Best viewing during low tide at 06:00 UTC."
    );

    // bare dagslavvann: faller tilbake til det første
    assert_eq!(night_low_tides_first(&astro, &[midday]), vec![midday]);
}

#[test]
fn detailed_range_covers_consecutive_days() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let model = known_model();
    let fc = Forecaster::new(&cfg, &model, &astro, &clim);

    // over skuddagen
    let first = NaiveDate::from_ymd_opt(2024, 2, 26).unwrap();
    let doc = fc.detailed_range(first, 10).unwrap();
    assert_eq!(doc.forecasts.len(), 10);
    for (i, pair) in doc.forecasts.windows(2).enumerate() {
        assert_eq!(pair[1].date - pair[0].date, Duration::days(1), "hull etter dag {i}");
    }
    assert_eq!(doc.forecasts[3].date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    assert!(doc.forecasts.iter().all(|d| d.timeslots.len() == 8));

    let range = doc.date_range.unwrap();
    assert_eq!(range.total_days, 10);
    assert_eq!(range.start, first);
    assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
    assert_eq!(range.end, doc.forecasts[9].date);

    let v = serde_json::to_value(&doc).unwrap();
    assert_eq!(v["date_range"]["total_days"], 10);
    assert_eq!(v["date_range"]["end"], "2024-03-06");
    assert_eq!(v["forecast_type"], "3-hour intervals (8 timeslots per day)");

    // dagene er de samme som enkeltvis
    let (same, _) = fc.detailed(first).unwrap();
    assert_eq!(doc.forecasts[0].avg_score, same.avg_score);
    assert_eq!(doc.forecasts[0].best_time, same.best_time);

    assert!(matches!(
        fc.detailed_range(first, 0),
        Err(BlueGlowError::Validation(_))
    ));
    // vanlige dokumenter har ingen date_range
    let week = serde_json::to_value(fc.best_week_daily(start()).unwrap()).unwrap();
    assert!(week.get("date_range").is_none());
}

#[test]
fn database_is_keyed_by_date() {
    let cfg = BlueGlowConfig::default();
    let astro = Astronomy::from_config(&cfg);
    let clim = fixture_climatology();
    let model = known_model();
    let fc = Forecaster::new(&cfg, &model, &astro, &clim);

    let db = fc.database(start(), 5).unwrap();
    assert_eq!(db.forecasts.len(), 5);
    assert_eq!(db.date_range.total_days, 5);
    let jan3 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
    assert_eq!(db.get(jan3).unwrap().date, jan3);
    assert!(db.get(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()).is_none());

    let v = serde_json::to_value(&db).unwrap();
    assert_eq!(v["forecasts"]["2024-01-05"]["timeslots"].as_array().unwrap().len(), 8);
}
