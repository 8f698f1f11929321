#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use drive_tables::{
    drive::{DriveStore, LocalDrive},
    service::{ServiceSettings, TableService},
};
use rust_xlsxwriter::Workbook;
use tempfile::{TempDir, tempdir};
use zip::{ZipWriter, write::SimpleFileOptions};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Drive rooted in a `drive/` subdirectory of the workspace.
    pub fn drive(&self) -> LocalDrive {
        LocalDrive::new(self.path().join("drive")).expect("local drive")
    }

    /// Service backed by [`Self::drive`], default settings.
    pub fn service(&self) -> TableService {
        TableService::new(Arc::new(self.drive()), ServiceSettings::default())
    }

    /// Uploads an archive built from `entries` to the drive and returns its id.
    pub fn upload_archive(&self, name: &str, entries: &[(&str, &[u8])]) -> String {
        self.drive()
            .upload(&zip_archive(entries), name)
            .expect("upload archive")
    }
}

/// Builds an in-memory ZIP archive.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("zip directory");
            continue;
        }
        writer.start_file(*name, options).expect("zip entry");
        writer.write_all(bytes).expect("zip entry bytes");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Builds an xlsx workbook where each sheet is `(name, rows)` and the first
/// row is the header. Cells that parse as numbers are written as numbers.
pub fn xlsx_workbook(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (sheet_name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*sheet_name).expect("sheet name");
        for (row_idx, row) in rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let (row_idx, col_idx) = (row_idx as u32, col_idx as u16);
                match cell.parse::<f64>() {
                    Ok(number) => worksheet.write_number(row_idx, col_idx, number),
                    Err(_) => worksheet.write_string(row_idx, col_idx, *cell),
                }
                .expect("write cell");
            }
        }
    }
    workbook.save_to_buffer().expect("save workbook")
}

pub const INVOICE_HEADERS: &str = "Numero;UF_Emitente;Municipio_Emitente;Via_Internet;Valor_Nota_Fiscal\n\
    1;SP;São Paulo;S;100,50\n\
    2;RJ;Rio de Janeiro;N;20\n\
    3;SP;Campinas;sim;30\n\
    4;MG;Belo Horizonte;1;1.000,00\n\
    5;SP;São Paulo;true;5\n";

pub const INVOICE_ITEMS: &str = "numero,descricao_do_produto,valor_total\n\
    1,LIVROS DIDATICOS,50\n\
    1,Caneta azul,2.5\n\
    3,Livros infantis,30\n\
    4,livros tecnicos,n/a\n";
