#![cfg(feature = "integration-tests")]

use chrono::{TimeZone, Utc};
use common::domain::{
    CachedVehiclePosition, RawTelemetryRow, UpsertPositionsInput, VehiclePosition,
    VehiclePositionRepository,
};
use common::postgres::{PostgresClient, PostgresVehiclePositionRepository};
use goose::MigrationRunner;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresVehiclePositionRepository) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let migrations_dir = format!(
        "{}/../fleet_tracker_all_in_one/migrations/postgres",
        env!("CARGO_MANIFEST_DIR")
    );
    let dsn = format!(
        "postgres://postgres:postgres@{}:{}/postgres?sslmode=disable",
        host, port
    );
    let goose_path = which::which("goose").expect("goose binary not found");

    MigrationRunner::new(
        goose_path.to_string_lossy().to_string(),
        migrations_dir,
        "postgres".to_string(),
        dsn,
    )
    .run_migrations()
    .await
    .expect("Migrations failed");

    let client = PostgresClient::new(
        &host.to_string(),
        port,
        "postgres",
        "postgres",
        "postgres",
        5,
    )
    .expect("Failed to create client");

    (postgres, PostgresVehiclePositionRepository::new(client))
}

fn cached(key: &str, speed: Option<f64>, minute: u32) -> CachedVehiclePosition {
    VehiclePosition {
        vehicle_key: key.to_string(),
        lat: 51.5,
        lng: -0.12,
        speed_kph: speed,
        heading: Some(45.0),
        pos_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap()),
        raw: RawTelemetryRow::new(serde_json::json!({"objectname": key, "speed": speed})),
    }
    .into_cached(Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 30).unwrap())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_upsert_and_exact_lookup() {
    let (_container, repo) = setup_test_db().await;

    repo.upsert_positions(UpsertPositionsInput {
        positions: vec![cached("A1", Some(10.0), 0), cached("B2", None, 0)],
    })
    .await
    .unwrap();

    let a1 = repo.get_position("A1").await.unwrap().unwrap();
    assert_eq!(a1, cached("A1", Some(10.0), 0));

    let b2 = repo.get_position("B2").await.unwrap().unwrap();
    assert_eq!(b2.position.speed_kph, None);

    assert!(repo.get_position("C3").await.unwrap().is_none());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_upsert_replaces_existing_row() {
    let (_container, repo) = setup_test_db().await;

    for (speed, minute) in [(10.0, 0), (20.0, 5)] {
        repo.upsert_positions(UpsertPositionsInput {
            positions: vec![cached("A1", Some(speed), minute)],
        })
        .await
        .unwrap();
    }

    let a1 = repo.get_position("A1").await.unwrap().unwrap();
    assert_eq!(a1.position.speed_kph, Some(20.0));
    assert_eq!(a1.collected_at, Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 30).unwrap());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_fuzzy_lookup_picks_smallest_key() {
    let (_container, repo) = setup_test_db().await;

    repo.upsert_positions(UpsertPositionsInput {
        positions: vec![
            cached("XMLC9", None, 0),
            cached("D1MLC", None, 0),
            cached("B2MLC", None, 0),
            cached("ZZ100", None, 0),
        ],
    })
    .await
    .unwrap();

    let found = repo.find_position_containing("MLC").await.unwrap().unwrap();
    assert_eq!(found.vehicle_key(), "B2MLC");

    // LIKE wildcards are matched literally
    assert!(repo.find_position_containing("%").await.unwrap().is_none());
    assert!(repo.find_position_containing("QQ").await.unwrap().is_none());
}
