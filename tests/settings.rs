use std::collections::BTreeMap;
use std::path::PathBuf;

use tempfile::tempdir;
use tinvest_sheets::ExportError;
use tinvest_sheets::config::{
    CliSettings, ExportConfig, TEMPLATE_SPREADSHEET_ID, TemplateStrategy, keys,
};
use tinvest_sheets::store::{self, settings};

fn persisted(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn reserved_keys_are_never_persisted() {
    let dir = tempdir().expect("temporary directory");
    let mut conn = store::open(&dir.path().join("store.db")).expect("database opened");

    let written = settings::store_settings(
        &mut conn,
        [
            ("spreadsheetId", Some("X".to_string())),
            ("storeArgs", Some("true".to_string())),
            ("fileName", Some("f.xlsx".to_string())),
            ("credentials", None),
        ],
    )
    .expect("settings stored");

    assert_eq!(written, 1);
    let stored = settings::read_settings(&conn).expect("settings read");
    assert_eq!(stored, persisted(&[("spreadsheetId", "X")]));
}

#[test]
fn cli_entries_round_trip_through_the_store() {
    let dir = tempdir().expect("temporary directory");
    let database = dir.path().join("store.db");
    let cli = CliSettings {
        file_name: Some(PathBuf::from("f.xlsx")),
        spreadsheet_id: Some("sheet-1".into()),
        credentials: Some(PathBuf::from("credentials.json")),
        store_args: true,
        ..CliSettings::default()
    };

    {
        let mut conn = store::open(&database).expect("database opened");
        settings::store_settings(&mut conn, cli.entries()).expect("settings stored");
    }

    let conn = store::open(&database).expect("database reopened");
    let stored = settings::read_settings(&conn).expect("settings read");
    assert_eq!(
        stored,
        persisted(&[
            (keys::CREDENTIALS, "credentials.json"),
            (keys::SPREADSHEET_ID, "sheet-1"),
        ])
    );
}

#[test]
fn stored_values_are_replaced_on_conflict() {
    let dir = tempdir().expect("temporary directory");
    let mut conn = store::open(&dir.path().join("store.db")).expect("database opened");

    settings::store_settings(&mut conn, [("spreadsheetId", Some("old".to_string()))])
        .expect("first store");
    settings::store_settings(&mut conn, [("spreadsheetId", Some("new".to_string()))])
        .expect("second store");

    let stored = settings::read_settings(&conn).expect("settings read");
    assert_eq!(stored.get("spreadsheetId").map(String::as_str), Some("new"));
    assert_eq!(stored.len(), 1);
}

#[test]
fn cli_values_take_precedence_over_persisted_ones() {
    let cli = CliSettings {
        spreadsheet_id: Some("from-cli".into()),
        ..CliSettings::default()
    };
    let stored = persisted(&[
        (keys::SPREADSHEET_ID, "from-db"),
        (keys::CREDENTIALS, "stored-credentials.json"),
    ]);

    let config = ExportConfig::resolve(&cli, &stored).expect("configuration resolved");

    assert_eq!(config.spreadsheet_id, "from-cli");
    assert_eq!(config.credentials, PathBuf::from("stored-credentials.json"));
    match config.templates {
        TemplateStrategy::Library(library) => {
            assert_eq!(library.spreadsheet_id, TEMPLATE_SPREADSHEET_ID);
            assert_eq!(library.templates.len(), 2);
        }
        other => panic!("unexpected template strategy {other:?}"),
    }
}

#[test]
fn missing_spreadsheet_id_fails_before_anything_else() {
    let cli = CliSettings {
        credentials: Some(PathBuf::from("credentials.json")),
        ..CliSettings::default()
    };

    let error = ExportConfig::resolve(&cli, &BTreeMap::new()).expect_err("missing id rejected");

    assert!(matches!(
        error,
        ExportError::MissingSetting {
            key: keys::SPREADSHEET_ID,
            ..
        }
    ));
    assert!(error.to_string().contains("--spreadsheet-id"));
}

#[test]
fn missing_credentials_are_reported() {
    let stored = persisted(&[(keys::SPREADSHEET_ID, "sheet-1")]);

    let error = ExportConfig::resolve(&CliSettings::default(), &stored)
        .expect_err("missing credentials rejected");

    assert!(matches!(
        error,
        ExportError::MissingSetting {
            key: keys::CREDENTIALS,
            ..
        }
    ));
}

#[test]
fn explicit_template_ids_select_the_explicit_strategy() {
    let cli = CliSettings {
        rub_sheet_id: Some("11".into()),
        ..CliSettings::default()
    };
    let stored = persisted(&[
        (keys::SPREADSHEET_ID, "sheet-1"),
        (keys::CREDENTIALS, "credentials.json"),
        (keys::USD_SHEET_ID, "22"),
    ]);

    let config = ExportConfig::resolve(&cli, &stored).expect("configuration resolved");

    assert_eq!(
        config.templates,
        TemplateStrategy::Explicit { rub: 11, usd: 22 }
    );
}

#[test]
fn a_single_template_id_is_rejected() {
    let cli = CliSettings {
        spreadsheet_id: Some("sheet-1".into()),
        credentials: Some(PathBuf::from("credentials.json")),
        rub_sheet_id: Some("11".into()),
        ..CliSettings::default()
    };

    let error = ExportConfig::resolve(&cli, &BTreeMap::new()).expect_err("incomplete templates");

    assert!(matches!(
        error,
        ExportError::MissingSetting {
            key: keys::USD_SHEET_ID,
            ..
        }
    ));
}

#[test]
fn non_numeric_template_ids_are_rejected() {
    let cli = CliSettings {
        spreadsheet_id: Some("sheet-1".into()),
        credentials: Some(PathBuf::from("credentials.json")),
        rub_sheet_id: Some("eleven".into()),
        usd_sheet_id: Some("22".into()),
        ..CliSettings::default()
    };

    let error = ExportConfig::resolve(&cli, &BTreeMap::new()).expect_err("invalid id");

    assert!(matches!(
        error,
        ExportError::InvalidSetting {
            key: keys::RUB_SHEET_ID,
            ..
        }
    ));
}
