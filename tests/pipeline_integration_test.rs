use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use edu_locations::app::ports::{GeocodeError, GeocodeHit, GeocoderPort};
use edu_locations::app::{GeocodeUseCase, MergeUseCase, RefineUseCase};
use edu_locations::config::{GeocoderConfig, PathsConfig};
use edu_locations::domain::{GeocodeStatus, Sector, TemporalStatus};
use edu_locations::error::PipelineError;
use edu_locations::pipeline::geocoding::read_geocoded;
use edu_locations::pipeline::storage::read_merged_locations;

const ORG_HEADER: &str = "NR_ADMINISTRATIE,CODE_FUNCTIE,CODE_SOORT,NAAM_VOLLEDIG,NAAM_STRAAT_VEST,NR_HUIS_VEST,NR_HUIS_TOEV_VEST,POSTCODE_VEST,NAAM_PLAATS_VEST,PROVINCIE_VEST,DT_IN_BEDRIJF,DT_UIT_BEDRIJF";
const EDU_HEADER: &str =
    "NR_ADMINISTRATIE,OPLEIDINGSCODE,ONDERWIJSTYPE,ONDERWIJSSECTOR,BEGINDATUM,EINDDATUM";

type Behavior = fn(&str) -> Result<GeocodeHit, GeocodeError>;

/// Geocoder double that counts every request it receives
struct MockGeocoder {
    calls: Arc<AtomicUsize>,
    behavior: Behavior,
}

impl MockGeocoder {
    fn new(behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
                behavior,
            },
            calls,
        )
    }
}

#[async_trait]
impl GeocoderPort for MockGeocoder {
    async fn geocode(&self, query: &str) -> Result<GeocodeHit, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.behavior)(query)
    }
}

fn amsterdam(_query: &str) -> Result<GeocodeHit, GeocodeError> {
    Ok(GeocodeHit {
        latitude: 52.37,
        longitude: 4.89,
        quality: Some("rooftop".to_string()),
    })
}

fn paths(root: &Path) -> PathsConfig {
    PathsConfig {
        raw_dir: root.join("raw"),
        merged_dir: root.join("merged"),
        geocoded_dir: root.join("geocoded"),
        output_dir: root.join("final"),
        log_dir: root.join("logs"),
        ..PathsConfig::default()
    }
}

fn settings() -> GeocoderConfig {
    GeocoderConfig {
        delay_ms: 0,
        max_attempts: 3,
        backoff_base_ms: 1,
        backoff_max_ms: 4,
        ..GeocoderConfig::default()
    }
}

fn write_raw(paths: &PathsConfig, org_rows: &[&str]) {
    fs::create_dir_all(&paths.raw_dir).unwrap();
    let mut orgs = format!("{ORG_HEADER}\n");
    for row in org_rows {
        orgs.push_str(row);
        orgs.push('\n');
    }
    fs::write(paths.organizations_path(), orgs).unwrap();
    fs::write(paths.education_path(), format!("{EDU_HEADER}\n")).unwrap();
}

fn read_refined(path: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.deserialize().map(|row| row.unwrap()).collect()
}

#[tokio::test]
async fn test_duplicate_rows_flow_through_all_three_stages() -> Result<()> {
    let dir = tempdir()?;
    let paths = paths(dir.path());
    write_raw(
        &paths,
        &[
            "00AA,VEST,BAS,De Regenboog,Main St,1,,1234AB,Amsterdam,Noord-Holland,01-01-1990,",
            "00BB,VEST,BAS,De Boog,Main St,1,,1234 AB,Amsterdam,Noord-Holland,01-01-1985,31-12-1995",
        ],
    );

    let report = MergeUseCase::new(paths.clone()).run(&Sector::ALL)?;
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.collapsed_rows, 1);

    let merged = read_merged_locations(&paths.merged_path("primary"))?;
    assert_eq!(merged.rows.len(), 1);
    let row = &merged.rows[0];
    assert_eq!(row.identifiers, "00AA;00BB");
    assert_eq!(row.full_address, "main st 1, 1234ab, amsterdam");
    assert_eq!(row.start_date.map(|d| d.to_string()).as_deref(), Some("1985-01-01"));
    assert_eq!(row.end_date, None);
    assert_eq!(row.sector, Sector::Primary);
    assert_eq!(row.temporal_status, TemporalStatus::Active);

    let (geocoder, calls) = MockGeocoder::new(amsterdam);
    GeocodeUseCase::new(Box::new(geocoder), paths.clone(), settings())
        .run(&[Sector::Primary])
        .await?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    RefineUseCase::new(paths.clone()).run(&[Sector::Primary])?;
    let refined = read_refined(&paths.refined_path("primary"));
    assert_eq!(refined.len(), 1);
    let row = &refined[0];
    assert_eq!(row["latitude"], "52.37");
    assert_eq!(row["longitude"], "4.89");
    assert_eq!(row["geocode_status"], "ok");
    assert_eq!(row["location_status"], "active");
    assert_eq!(row["years_of_operation"], "ongoing");
    assert_eq!(row["decade_opened"], "1980");
    assert_eq!(row["decade_closed"], "");
    assert_eq!(row["facility_type"], "Regular Primary School");
    assert_eq!(row["operation_period"], "1985-01-01 to present");
    Ok(())
}

#[tokio::test]
async fn test_second_geocode_run_issues_no_requests() -> Result<()> {
    let dir = tempdir()?;
    let paths = paths(dir.path());
    write_raw(
        &paths,
        &[
            "1,VEST,BAS,A,Kerkstraat,1,,1000AA,Utrecht,Utrecht,01-08-1970,",
            "2,VEST,VOS,B,Kerkstraat,1,,1000AA,Utrecht,Utrecht,01-08-1975,",
            "3,VEST,MBO,C,Stationsplein,5,a,2000BB,Zwolle,Overijssel,01-08-1990,",
        ],
    );
    MergeUseCase::new(paths.clone()).run(&Sector::ALL)?;

    let (geocoder, calls) = MockGeocoder::new(amsterdam);
    let use_case = GeocodeUseCase::new(Box::new(geocoder), paths.clone(), settings());

    let first = use_case.run(&Sector::ALL).await?;
    // The shared address is asked once and copied to the second sector
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(first.copied, 1);

    let second = use_case.run(&Sector::ALL).await?;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(second.requests, 0);
    assert_eq!(second.cached, 3);
    Ok(())
}

#[tokio::test]
async fn test_refined_row_count_matches_merged_row_count() -> Result<()> {
    let dir = tempdir()?;
    let paths = paths(dir.path());
    write_raw(
        &paths,
        &[
            "1,VEST,BAS,A,Laan,1,,1000AA,Delft,Zuid-Holland,01-01-2000,01-01-2010",
            "2,VEST,BAS,B,Laan,2,,1000AA,Delft,Zuid-Holland,not a date,",
            "3,VEST,HBO,C,Campus,9,,3000CC,Leiden,Zuid-Holland,,",
            "4,VEST,QQQ,D,Hof,4,,4000DD,Gouda,Zuid-Holland,01-01-1960,",
            "5,VEST,BAS,E,,,,,Nergens,Zuid-Holland,,",
        ],
    );
    let report = MergeUseCase::new(paths.clone()).run(&Sector::ALL)?;
    assert_eq!(report.dropped_missing_address, 1);
    assert_eq!(report.malformed_dates, 1);
    assert_eq!(report.unknown_sector, 1);

    // Only the primary sector gets coordinates; the rest stay ungeocoded
    let (geocoder, _) = MockGeocoder::new(amsterdam);
    GeocodeUseCase::new(Box::new(geocoder), paths.clone(), settings())
        .run(&[Sector::Primary])
        .await?;

    let summaries = RefineUseCase::new(paths.clone()).run(&Sector::ALL)?;
    for sector in Sector::ALL {
        let merged = read_merged_locations(&paths.merged_path(sector.as_str()))?;
        let refined = read_refined(&paths.refined_path(sector.as_str()));
        assert_eq!(refined.len(), merged.rows.len(), "sector {sector}");
        assert_eq!(summaries[&sector].total, merged.rows.len());
    }

    let higher = read_refined(&paths.refined_path("higher"));
    assert_eq!(higher[0]["geocode_status"], "ungeocoded");
    assert_eq!(higher[0]["latitude"], "");

    let primary = read_refined(&paths.refined_path("primary"));
    let closed = primary.iter().find(|r| r["identifiers"] == "1").unwrap();
    assert_eq!(closed["years_of_operation"], "10");
    assert_eq!(closed["location_status"], "inactive");
    let undated = primary.iter().find(|r| r["identifiers"] == "2").unwrap();
    assert_eq!(undated["years_of_operation"], "");
    assert_eq!(undated["operation_period"], "");

    let unknown = read_refined(&paths.refined_path("unknown"));
    assert_eq!(unknown[0]["facility_type"], "Other");
    Ok(())
}

#[tokio::test]
async fn test_transient_failures_are_bounded_and_retried_next_run() -> Result<()> {
    let dir = tempdir()?;
    let paths = paths(dir.path());
    write_raw(&paths, &["1,VEST,BAS,A,Laan,1,,1000AA,Delft,Zuid-Holland,,"]);
    MergeUseCase::new(paths.clone()).run(&[Sector::Primary])?;

    let (flaky, calls) =
        MockGeocoder::new(|_| Err(GeocodeError::Transient("HTTP 503".to_string())));
    let report = GeocodeUseCase::new(Box::new(flaky), paths.clone(), settings())
        .run(&[Sector::Primary])
        .await?;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.failed, 1);

    let cached = read_geocoded(&paths.geocoded_path("primary"))?;
    let entry = &cached["laan 1, 1000aa, delft"];
    assert_eq!(entry.status, GeocodeStatus::Error);
    assert_eq!(entry.latitude, None);

    // An error is not a final answer, so the next run asks again
    let (healthy, calls) = MockGeocoder::new(amsterdam);
    GeocodeUseCase::new(Box::new(healthy), paths.clone(), settings())
        .run(&[Sector::Primary])
        .await?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let cached = read_geocoded(&paths.geocoded_path("primary"))?;
    assert_eq!(cached["laan 1, 1000aa, delft"].status, GeocodeStatus::Ok);
    Ok(())
}

#[tokio::test]
async fn test_permanent_failure_is_attempted_once() -> Result<()> {
    let dir = tempdir()?;
    let paths = paths(dir.path());
    write_raw(&paths, &["1,VEST,BAS,A,Laan,1,,1000AA,Delft,Zuid-Holland,,"]);
    MergeUseCase::new(paths.clone()).run(&[Sector::Primary])?;

    let (invalid, calls) =
        MockGeocoder::new(|_| Err(GeocodeError::Invalid("INVALID_REQUEST".to_string())));
    let report = GeocodeUseCase::new(Box::new(invalid), paths.clone(), settings())
        .run(&[Sector::Primary])
        .await?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.not_found, 1);

    let cached = read_geocoded(&paths.geocoded_path("primary"))?;
    let entry = &cached["laan 1, 1000aa, delft"];
    assert_eq!(entry.status, GeocodeStatus::NotFound);
    assert_eq!(entry.reason.as_deref(), Some("INVALID_REQUEST"));
    Ok(())
}

#[tokio::test]
async fn test_fatal_provider_failure_aborts_but_keeps_progress() -> Result<()> {
    let dir = tempdir()?;
    let paths = paths(dir.path());
    write_raw(
        &paths,
        &[
            "1,VEST,BAS,A,Alpha,1,,1000AA,Delft,Zuid-Holland,,",
            "2,VEST,BAS,B,Omega,2,,2000BB,Delft,Zuid-Holland,,",
        ],
    );
    MergeUseCase::new(paths.clone()).run(&[Sector::Primary])?;

    // Rows are ordered by address, so "alpha" is asked before "omega"
    let (quota, calls) = MockGeocoder::new(|query| {
        if query.starts_with("alpha") {
            amsterdam(query)
        } else {
            Err(GeocodeError::Fatal("OVER_DAILY_LIMIT".to_string()))
        }
    });
    let err = GeocodeUseCase::new(Box::new(quota), paths.clone(), settings())
        .run(&[Sector::Primary])
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Provider { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let cached = read_geocoded(&paths.geocoded_path("primary"))?;
    assert_eq!(cached.len(), 1);
    assert!(cached.contains_key("alpha 1, 1000aa, delft"));
    Ok(())
}

#[test]
fn test_missing_organization_registry_is_fatal() {
    let dir = tempdir().unwrap();
    let err = MergeUseCase::new(paths(dir.path()))
        .run(&Sector::ALL)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::MissingInput(_))
    ));
}

#[test]
fn test_ragged_and_undecodable_rows_do_not_abort_merge() -> Result<()> {
    let dir = tempdir()?;
    let paths = paths(dir.path());
    write_raw(
        &paths,
        &[
            "00AA,VEST,BAS,De Regenboog,Main St,1,,1234AB,Amsterdam,Noord-Holland,01-01-1990,",
            "00BB,VEST,BAS,Het Anker,Dorpsstraat,3,b,5678CD,Zwolle",
        ],
    );
    let mut orgs = fs::read(paths.organizations_path())?;
    orgs.extend_from_slice(b"00CC,VEST,BAS,\xff\xfe,Kerkweg,7,,9999ZZ,Assen,Drenthe,,\n");
    fs::write(paths.organizations_path(), orgs)?;

    let report = MergeUseCase::new(paths.clone()).run(&[Sector::Primary])?;
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.unreadable_rows, 1);

    let merged = read_merged_locations(&paths.merged_path("primary"))?;
    assert_eq!(merged.rows.len(), 2);
    let short = merged
        .rows
        .iter()
        .find(|row| row.identifiers == "00BB")
        .expect("short row is merged");
    assert_eq!(short.province, None);
    assert_eq!(short.start_date, None);
    Ok(())
}
