mod support;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone as _;
use datapulse::extract::geocode::Geocoder;
use datapulse::gold::memory::MemoryWarehouse;
use datapulse::http::PoliteClient;
use datapulse::object_store::LocalFsObjectStore;
use datapulse::pipeline::{Pipeline, PipelineSettings, Stage, StagePlan};
use datapulse::run::RunId;
use rust_xlsxwriter::Workbook;
use support::{MockServer, json};
use url::Url;

const HIT: &str = r#"{"type":"FeatureCollection","features":[
  {"type":"Feature","geometry":{"type":"Point","coordinates":[2.347,48.859]},
   "properties":{"label":"12 Rue de Rivoli 75004 Paris","score":0.93}}]}"#;

const HEADER: [&str; 10] = [
    "nom_librairie",
    "adresse",
    "code_postal",
    "ville",
    "contact_nom",
    "contact_email",
    "contact_telephone",
    "ca_annuel",
    "date_partenariat",
    "specialite",
];

const PARTNERS: [[&str; 10]; 2] = [
    [
        "Librairie du Marais",
        "12 rue de Rivoli",
        "75004",
        "Paris",
        "Jeanne Martin",
        "jeanne.martin@example.fr",
        "0612345678",
        "",
        "2021-05-04",
        "BD",
    ],
    [
        "Le Bateau Livre",
        "1 quai de la Gare",
        "69002",
        "Lyon",
        "Paul Durand",
        "paul.durand@example.fr",
        "0698765432",
        "",
        "15/09/2019",
        "Jeunesse",
    ],
];

fn write_workbook(path: &Path) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, name) in HEADER.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }
    // Row 1 stays empty.
    for (offset, partner) in PARTNERS.iter().enumerate() {
        let row = 2 + offset as u32;
        for (col, value) in partner.iter().enumerate() {
            if HEADER[col] == "ca_annuel" {
                sheet.write_number(row, col as u16, 125000.0 + offset as f64)?;
            } else {
                sheet.write_string(row, col as u16, *value)?;
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

#[tokio::test]
async fn partners_then_geocoding_from_a_workbook() -> anyhow::Result<()> {
    let api = MockServer::start(vec![json("/search/", 200, HIT)]);
    let tmp = tempfile::TempDir::new()?;
    let xlsx = tmp.path().join("partenaire_librairies.xlsx");
    write_workbook(&xlsx)?;

    let warehouse = MemoryWarehouse::default();
    let http = PoliteClient::new("DataPulseTest/1.0", Duration::ZERO)?;
    let geocoder = Geocoder::new(
        http.client().clone(),
        Url::parse(&api.url("/search/"))?,
        "DataPulseTest/1.0",
        Duration::ZERO,
    );
    let settings = PipelineSettings {
        books_seed: Url::parse(&api.url("/"))?,
        quotes_seed: Url::parse(&api.url("/"))?,
        partners_xlsx: xlsx.clone(),
        bronze_root: tmp.path().join("bronze"),
        silver_root: tmp.path().join("silver"),
        gbp_to_eur: 1.17,
        images: None,
        geocode_missing_only: false,
        pii_salt: "salt".to_owned(),
    };
    let pipeline = Pipeline::new(
        settings,
        http,
        geocoder,
        Arc::new(LocalFsObjectStore::new(tmp.path().join("objects"))),
        Arc::new(warehouse.clone()),
    );

    let run_id = RunId::from_timestamp(chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap());
    let plan = StagePlan::new([Stage::Geocoding, Stage::Partners])?;
    let summary = pipeline.run_with_id(run_id, &plan).await?;

    let stages: Vec<Stage> = summary.stages.iter().map(|r| r.stage).collect();
    assert_eq!(stages, vec![Stage::Partners, Stage::Geocoding]);
    assert_eq!(summary.stages[0].extracted, 2);
    assert_eq!(summary.stages[0].cleaned, 2);
    assert_eq!(summary.stages[0].loaded, 2);
    assert_eq!(summary.stages[1].loaded, 2);

    let bronze_dir = tmp.path().join("bronze/run_id=2026-03-04T05-06-07");
    assert_eq!(
        std::fs::read(bronze_dir.join("partners_source.xlsx"))?,
        std::fs::read(&xlsx)?
    );
    let bronze: serde_json::Value =
        serde_json::from_slice(&std::fs::read(bronze_dir.join("partners_raw.json"))?)?;
    assert_eq!(bronze["dataset"], "partners");
    assert_eq!(bronze["rows"].as_array().map(Vec::len), Some(2));
    assert_eq!(bronze["rows"][0]["contact_email"], "jeanne.martin@example.fr");

    let silver = std::fs::read_to_string(
        tmp.path()
            .join("silver/run_id=2026-03-04T05-06-07/partners_clean.csv"),
    )?;
    let mut lines = silver.lines();
    assert_eq!(
        lines.next(),
        Some("adresse,ca_annuel,code_postal,contact_hash,date_partenariat,nom_librairie,specialite,ville")
    );
    assert_eq!(lines.count(), 2);
    for pii in ["Jeanne Martin", "jeanne.martin@example.fr", "0612345678", "Paul Durand", "0698765432"] {
        assert!(!silver.contains(pii), "{pii} leaked into silver");
    }
    assert!(silver.contains("2019-09-15"), "{silver}");

    let partners = warehouse.partners();
    assert_eq!(partners.len(), 2);
    assert_eq!(partners[0].1.nom_librairie, "Librairie du Marais");
    assert_eq!(partners[1].1.code_postal.as_deref(), Some("69002"));
    assert_eq!(partners[0].1.contact_hash.len(), 64);

    let geocoding = warehouse.geocoding();
    assert_eq!(geocoding.len(), 2);
    assert_eq!(geocoding[1].partner_id, partners[1].0);
    assert_eq!(api.hits("/search/"), 2);
    assert_eq!(warehouse.open_connections(), 0);
    Ok(())
}
