mod common;

use std::sync::Arc;

use anyhow::{Result, bail};
use common::{TestWorkspace, xlsx_workbook, zip_archive};
use drive_tables::{
    data::{Row, RowTable, Value},
    decode::{FileDecoder, SourceKind, TableDecoder, decode_delimited},
    drive::DriveStore,
    error::TableError,
    export::serialize_rows,
    query::{Operation, QueryOutput, QueryRequest},
    service::{ExportSource, LoadStatus, ServiceSettings, TableService},
    store::Decoded,
};
use proptest::prelude::*;

#[test]
fn invoices_archive_sums_valor_end_to_end() {
    let workspace = TestWorkspace::new();
    let file_id = workspace.upload_archive(
        "notas.zip",
        &[("Invoices.csv", b"uf,valor\nSP,10.5\nRJ,abc\nMG,4\n")],
    );
    let mut service = workspace.service();

    let summary = service.load_archive(&file_id).expect("load archive");
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.total_rows, 3);

    let result = service
        .query(
            "invoices.csv",
            QueryRequest::new(Operation::Sum).with_column("valor"),
        )
        .expect("sum");
    assert_eq!(
        result.output,
        QueryOutput::Sum {
            column: "valor".to_string(),
            sum: 14.5,
        }
    );
}

#[test]
fn archive_skips_folders_hidden_entries_and_unknown_formats() {
    let workspace = TestWorkspace::new();
    let file_id = workspace.upload_archive(
        "mixed.zip",
        &[
            ("dados/", b""),
            ("dados/Clientes.TSV", b"nome\tcidade\nAna\tSantos\n"),
            ("__MACOSX/dados/._Clientes.TSV", b"junk"),
            ("dados/.hidden.csv", b"a\n1\n"),
            ("dados/leia-me.pdf", b"%PDF"),
            (
                "dados/vendas.xlsx",
                &xlsx_workbook(&[("Jan", &[&["uf", "valor"], &["SP", "1"]])]),
            ),
        ],
    );
    let mut service = workspace.service();
    let summary = service.load_archive(&file_id).expect("load archive");

    let sources = summary
        .items
        .iter()
        .map(|item| (item.source.as_str(), item.kind))
        .collect::<Vec<_>>();
    assert_eq!(
        sources,
        vec![
            ("clientes.tsv", SourceKind::Tsv),
            ("vendas.xlsx", SourceKind::Xlsx)
        ]
    );
    assert_eq!(
        service.store().list_names(),
        vec!["clientes.tsv", "vendas.xlsx", "vendas.xlsx_Jan"]
    );
}

struct RejectSpreadsheets;

impl TableDecoder for RejectSpreadsheets {
    fn decode(&self, bytes: &[u8], kind: SourceKind) -> Result<Decoded> {
        if kind.is_spreadsheet() {
            bail!("spreadsheets are disabled");
        }
        FileDecoder.decode(bytes, kind)
    }
}

#[test]
fn one_failing_source_does_not_abort_the_batch() {
    let workspace = TestWorkspace::new();
    let archive = zip_archive(&[
        ("a.xlsx", b"not really a workbook"),
        ("b.csv", b"x\n1\n2\n"),
    ]);
    let mut service = workspace.service().with_decoder(RejectSpreadsheets);
    let summary = service.load_archive_bytes(&archive).expect("load");

    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.items[0].status, LoadStatus::Failed);
    assert_eq!(
        summary.items[0].error.as_deref(),
        Some("spreadsheets are disabled")
    );
    assert_eq!(service.store().list_names(), vec!["b.csv"]);
}

#[test]
fn corrupt_workbook_is_reported_per_source() {
    let workspace = TestWorkspace::new();
    let archive = zip_archive(&[("broken.xlsx", b"PK not a workbook"), ("ok.csv", b"a\n1\n")]);
    let mut service = workspace.service();
    let summary = service.load_archive_bytes(&archive).expect("load");
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);
    assert!(summary.items[0].error.is_some());
}

#[test]
fn export_uploads_csv_with_extension() {
    let workspace = TestWorkspace::new();
    let mut service = workspace.service();
    service
        .load_archive_bytes(&zip_archive(&[(
            "clientes.csv",
            "nome;cidade\nAna;São Paulo\n\"Silva, Bia\";Rio\n".as_bytes(),
        )]))
        .expect("load");

    let receipt = service
        .export_and_upload(ExportSource::Table("clientes".to_string()), "resumo")
        .expect("export");
    assert_eq!(receipt.filename, "resumo.csv");
    assert_eq!(receipt.rows, 2);

    let uploaded = workspace.drive().download(&receipt.file_id).expect("download");
    assert_eq!(uploaded.len(), receipt.bytes);
    assert_eq!(
        String::from_utf8(uploaded).expect("utf-8"),
        "nome,cidade\nAna,São Paulo\n\"Silva, Bia\",Rio"
    );
    let listed = workspace.drive().list().expect("list");
    assert!(listed.iter().any(|file| file.name == "resumo.csv"));
}

#[test]
fn export_rejects_empty_sources() {
    let workspace = TestWorkspace::new();
    let mut service = workspace.service();
    service
        .load_archive_bytes(&zip_archive(&[("vazia.csv", b"a,b\n")]))
        .expect("load");

    let err = service
        .export(ExportSource::Table("vazia.csv".to_string()), "x")
        .expect_err("empty table");
    assert!(matches!(err, TableError::EmptyTable(_)));

    let err = service
        .export(ExportSource::Rows(Vec::new()), "x")
        .expect_err("no rows");
    assert!(matches!(err, TableError::NoData));
}

#[test]
fn list_loaded_reports_rows_sheets_and_sample_columns() {
    let workspace = TestWorkspace::new();
    let mut service = TableService::new(Arc::new(workspace.drive()), ServiceSettings::default());
    service
        .load_archive_bytes(&zip_archive(&[
            ("a.csv", b"x,y\n1,2\n"),
            (
                "b.xlsx",
                &xlsx_workbook(&[("S1", &[&["k"], &["1"]]), ("S2", &[&["k"], &["2"]])]),
            ),
        ]))
        .expect("load");

    let loaded = service.list_loaded();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded[0].rows, Some(1));
    assert_eq!(loaded[0].sample_columns, vec!["x", "y"]);
    assert_eq!(loaded[1].name, "b.xlsx");
    assert_eq!(
        loaded[1].sheets.as_deref(),
        Some(&["S1".to_string(), "S2".to_string()][..])
    );
    assert_eq!(loaded[2].name, "b.xlsx_S1");
}

#[test]
fn all_null_rows_survive_serialize_and_decode() {
    let mut filled = Row::new();
    filled.insert("x".to_string(), Value::from_text("1"));
    filled.insert("y".to_string(), Value::from_text("2"));
    let mut blank = Row::new();
    blank.insert("x".to_string(), Value::Null);
    blank.insert("y".to_string(), Value::Null);
    let table = RowTable::new(vec![filled, blank]);

    let csv = serialize_rows(&table).expect("serialize");
    assert_eq!(csv, "x,y\n1,2\n,");
    let decoded = decode_delimited(csv.as_bytes(), SourceKind::Csv).expect("decode");
    assert_eq!(decoded.len(), 2);
    assert!(decoded.rows()[1].values().all(Value::is_null));
}

#[test]
fn single_column_blank_cells_survive_serialize_and_decode() {
    let mut filled = Row::new();
    filled.insert("x".to_string(), Value::from_text("1"));
    let mut blank = Row::new();
    blank.insert("x".to_string(), Value::Null);
    let table = RowTable::new(vec![filled, blank]);

    let csv = serialize_rows(&table).expect("serialize");
    assert_eq!(csv, "x\n1\n\"\"");
    let decoded = decode_delimited(csv.as_bytes(), SourceKind::Csv).expect("decode");
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded.rows()[1]["x"], Value::Null);
}

proptest! {
    #[test]
    fn serialized_tables_decode_back(
        rows in prop::collection::vec(
            prop::collection::vec("[A-Za-z0-9 ,\"]{0,8}", 3),
            1..20,
        )
    ) {
        let table = RowTable::new(
            rows.iter()
                .map(|cells| {
                    ["alpha", "beta", "gamma"]
                        .iter()
                        .zip(cells)
                        .map(|(key, cell)| (key.to_string(), Value::from_text(cell)))
                        .collect::<Row>()
                })
                .collect(),
        );
        let csv = serialize_rows(&table).expect("serialize");
        let decoded = decode_delimited(csv.as_bytes(), SourceKind::Csv).expect("decode");

        prop_assert_eq!(decoded.len(), table.len());
        for (original, round_tripped) in table.rows().iter().zip(decoded.rows()) {
            for (key, value) in original.iter().filter(|(_, value)| !value.is_null()) {
                prop_assert_eq!(round_tripped.get(key), Some(value));
            }
        }
    }
}
