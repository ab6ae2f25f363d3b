// core/tests/test_climatology.rs
use std::fs;

use blueglow_core::buoy::read_buoy_csv;
use blueglow_core::climatology::{fill_gaps, Climatology, DAYS_IN_YEAR};
use blueglow_core::BlueGlowError;
use std::collections::BTreeMap;

const STATION: &str = "46254 (Scripps Nearshore - Wave Buoy)";

fn write_raw(dir: &std::path::Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("kunne ikke skrive testfil");
}

fn sample_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_raw(
        dir.path(),
        "ndbc_46254_2023_2024.csv",
        "#YY,MM,DD,hh,mm,WVHT,WTMP\n\
         2024,01,01,00,00,1.0,15.0\n\
         2023,01,01,06,00,2.0,999.0\n\
         2024,01,01,12,00,99.0,MM\n\
         2024,01,03,00,00,0.5,MM\n\
         xx,01,05,00,00,0.7,16.0\n\
         99,12,31,00,00,3.0,14.0\n",
    );
    // ikke en NDBC-fil, skal ignoreres
    write_raw(dir.path(), "sst_202401.nc", "binary");
    dir
}

#[test]
fn medians_per_day_of_year_with_sentinels_removed() {
    let dir = sample_dir();
    let clim = Climatology::build_from_dir(dir.path(), STATION).unwrap();

    // median(1.0, 2.0); 99.0 er sentinel
    assert!((clim.wave_height(1) - 1.5).abs() < 1e-12);
    assert!((clim.wave_height(3) - 0.5).abs() < 1e-12);
    // 99 => 1999, DOY 365
    assert!((clim.wave_height(365) - 3.0).abs() < 1e-12);
    // 999 filtrert bort
    assert!((clim.water_temp(1) - 15.0).abs() < 1e-12);
    assert!((clim.water_temp(365) - 14.0).abs() < 1e-12);
}

#[test]
fn gaps_are_filled_from_neighbours() {
    let dir = sample_dir();
    let clim = Climatology::build_from_dir(dir.path(), STATION).unwrap();

    assert_eq!(clim.wave_height_doy.len(), DAYS_IN_YEAR as usize);
    assert_eq!(clim.water_temp_doy.len(), DAYS_IN_YEAR as usize);
    // mellom DOY 1 (1.5) og DOY 3 (0.5)
    assert!((clim.wave_height(2) - 1.0).abs() < 1e-12);
    // mellom DOY 3 (0.5) og DOY 365 (3.0)
    assert!((clim.wave_height(200) - 1.75).abs() < 1e-12);
    // bare nabo før
    assert!((clim.wave_height(366) - 3.0).abs() < 1e-12);
    assert!((clim.water_temp(100) - 14.5).abs() < 1e-12);
}

#[test]
fn metadata_reports_what_was_used() {
    let dir = sample_dir();
    let clim = Climatology::build_from_dir(dir.path(), STATION).unwrap();
    let meta = &clim.metadata;
    // raden med "xx" som år droppes
    assert_eq!(meta.ndbc_records, 5);
    assert_eq!(meta.valid_wave_observations, 4);
    assert_eq!(meta.valid_temp_observations, 2);
    assert_eq!(meta.ndbc_station, STATION);
    assert_eq!(meta.source_files, vec!["ndbc_46254_2023_2024.csv".to_string()]);
    let range = meta.time_range.as_ref().unwrap();
    assert_eq!(range.start.to_rfc3339(), "1999-12-31T00:00:00+00:00");
    assert_eq!(range.end.to_rfc3339(), "2024-01-03T00:00:00+00:00");
}

#[test]
fn dt_column_wins_over_date_parts() {
    let csv = "YY,MM,DD,hh,mm,WVHT,WTMP,dt\n\
               2020,06,01,00,00,1.1,18.0,2024-01-02 03:00:00+00:00\n\
               ,,,,,0.9,17.0,2024-01-02T04:00:00Z\n";
    let rows = read_buoy_csv(csv.as_bytes()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].timestamp.to_rfc3339(), "2024-01-02T03:00:00+00:00");
    assert_eq!(rows[1].wave_height, Some(0.9));
}

#[test]
fn unparseable_values_are_missing_not_zero() {
    let csv = "#YY,MM,DD,hh,mm,WVHT,WTMP\n2024,02,01,00,00,MM,abc\n";
    let rows = read_buoy_csv(csv.as_bytes()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].wave_height, None);
    assert_eq!(rows[0].water_temp, None);
}

#[test]
fn default_when_no_observations_at_all() {
    let filled = fill_gaps(&BTreeMap::new(), 1.0);
    assert_eq!(filled.len(), 366);
    assert!(filled.values().all(|v| *v == 1.0));
}

#[test]
fn missing_raw_data_points_at_fetch_stage() {
    let dir = tempfile::tempdir().unwrap();
    match Climatology::build_from_dir(dir.path(), STATION) {
        Err(BlueGlowError::MissingArtifact { stage, .. }) => assert_eq!(stage, "fetch"),
        other => panic!("forventet MissingArtifact, fikk {other:?}"),
    }
    let gone = dir.path().join("finnes-ikke");
    assert!(matches!(
        Climatology::build_from_dir(&gone, STATION),
        Err(BlueGlowError::MissingArtifact { .. })
    ));
}

#[test]
fn saved_file_uses_string_day_keys_and_loads_back() {
    let dir = sample_dir();
    let clim = Climatology::build_from_dir(dir.path(), STATION).unwrap();
    let path = dir.path().join("out/climatology.json");
    clim.save(&path).unwrap();

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["wave_height_doy"]["1"].as_f64(), Some(1.5));
    assert_eq!(v["seasonal_defaults"]["chla"]["spring"].as_f64(), Some(1.5));
    assert_eq!(v["seasonal_defaults"]["sst"]["summer"].as_f64(), Some(20.0));

    let loaded = Climatology::load(&path).unwrap();
    assert_eq!(loaded.wave_height_doy, clim.wave_height_doy);
    assert_eq!(loaded.seasonal_sst(7), 20.0);
    assert_eq!(loaded.seasonal_chla(4), 1.5);
}

#[test]
fn missing_climatology_file_names_its_stage() {
    let dir = tempfile::tempdir().unwrap();
    match Climatology::load(&dir.path().join("climatology.json")) {
        Err(BlueGlowError::MissingArtifact { stage, .. }) => assert_eq!(stage, "climatology"),
        other => panic!("forventet MissingArtifact, fikk {other:?}"),
    }
}

#[test]
fn file_written_by_the_python_pipeline_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("climatology.json");
    fs::write(
        &path,
        r#"{
  "wave_height_doy": {"1": 0.8, "2": 0.9},
  "water_temp_doy": {"1": 15.0},
  "seasonal_defaults": {
    "sst": {"winter": 15.5, "spring": 16.5, "summer": 20.0, "fall": 18.5},
    "chla": {"winter": 0.8, "spring": 1.5, "summer": 0.5, "fall": 0.6}
  },
  "metadata": {
    "created": "2025-10-20T08:15:42.123456Z",
    "ndbc_records": 10,
    "ndbc_station": "46254",
    "note": "x",
    "time_range": {"start": "2023-01-01T00:00:00", "end": "2024-12-31T23:30:00"}
  }
}"#,
    )
    .unwrap();

    let clim = Climatology::load(&path).unwrap();
    assert!((clim.wave_height(2) - 0.9).abs() < 1e-12);
    assert!((clim.water_temp(1) - 15.0).abs() < 1e-12);
    assert_eq!(clim.metadata.ndbc_records, 10);
    assert_eq!(clim.metadata.valid_wave_observations, 0);
    assert!(clim.metadata.source_files.is_empty());
    let range = clim.metadata.time_range.unwrap();
    assert_eq!(range.start.to_rfc3339(), "2023-01-01T00:00:00+00:00");
    assert_eq!(range.end.to_rfc3339(), "2024-12-31T23:30:00+00:00");
}
