use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use tracing::{debug, info};

use crate::coerce;
use crate::error::LoadError;
use crate::header::{self, Cell, ColumnMap};
use crate::models::{DataSource, FlowRecord, FlowTable};

#[derive(Debug, Clone)]
pub struct Upload {
    pub name: PathBuf,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            name: path.to_path_buf(),
            bytes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub prefer_clean: bool,
    pub clean_csv: PathBuf,
    pub upload: Option<Upload>,
    pub fallback_xlsx: PathBuf,
    pub sheet_name: String,
}

pub fn load(request: &LoadRequest) -> Result<FlowTable, LoadError> {
    if request.prefer_clean && request.clean_csv.exists() {
        let records = read_clean_csv(&request.clean_csv)?;
        info!(path = %request.clean_csv.display(), rows = records.len(), "loaded clean csv");
        return Ok(FlowTable {
            source: DataSource::CleanCsv(request.clean_csv.clone()),
            records,
        });
    }

    if let Some(upload) = &request.upload {
        let records = read_workbook(&upload.bytes, &request.sheet_name, &upload.name)?;
        info!(path = %upload.name.display(), rows = records.len(), "loaded uploaded workbook");
        return Ok(FlowTable {
            source: DataSource::Upload(upload.name.clone()),
            records,
        });
    }

    if request.fallback_xlsx.exists() {
        let bytes = std::fs::read(&request.fallback_xlsx).map_err(|source| LoadError::Io {
            path: request.fallback_xlsx.clone(),
            source,
        })?;
        let records = read_workbook(&bytes, &request.sheet_name, &request.fallback_xlsx)?;
        info!(
            path = %request.fallback_xlsx.display(),
            rows = records.len(),
            "loaded fallback workbook"
        );
        return Ok(FlowTable {
            source: DataSource::FallbackWorkbook(request.fallback_xlsx.clone()),
            records,
        });
    }

    Err(LoadError::NoSource)
}

/// Reads the pre-cleaned CSV. Headers are matched the same way as workbook
/// headers so a stray duplicated column does not break the load.
pub fn read_clean_csv(path: &Path) -> Result<Vec<FlowRecord>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns = ColumnMap::from_header(&header::dedup_names(&names));
    if columns.is_empty() {
        return Err(LoadError::NoExpectedColumns(path.to_path_buf()));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect::<Vec<_>>(),
        );
    }

    Ok(records_from_rows(&rows, &columns))
}

pub fn read_workbook(
    bytes: &[u8],
    sheet_name: &str,
    origin: &Path,
) -> Result<Vec<FlowRecord>, LoadError> {
    let rows = sheet_rows(bytes, sheet_name, origin)?;
    normalize_rows(&rows, origin)
}

fn sheet_rows(bytes: &[u8], sheet_name: &str, origin: &Path) -> Result<Vec<Vec<Cell>>, LoadError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;

    let range = match workbook.worksheet_range(sheet_name) {
        Ok(range) => range,
        Err(err) => {
            debug!(sheet = sheet_name, error = %err, "named sheet unavailable, using first sheet");
            let first = workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| LoadError::NoSheet(origin.to_path_buf()))?;
            workbook.worksheet_range(&first)?
        }
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::String(s) | Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::DateTime(dt) => dt.as_datetime().map_or(Cell::Empty, Cell::DateTime),
        _ => Cell::Empty,
    }
}

pub fn normalize_rows(rows: &[Vec<Cell>], origin: &Path) -> Result<Vec<FlowRecord>, LoadError> {
    let header_idx = header::detect_header(rows)
        .ok_or_else(|| LoadError::HeaderNotFound(origin.to_path_buf()))?;
    let names = header::header_names(&rows[header_idx]);
    let columns = ColumnMap::from_header(&names);
    if columns.is_empty() {
        return Err(LoadError::NoExpectedColumns(origin.to_path_buf()));
    }
    debug!(header_row = header_idx, columns = columns.matched(), "header detected");

    Ok(records_from_rows(&rows[header_idx + 1..], &columns))
}

fn records_from_rows(rows: &[Vec<Cell>], columns: &ColumnMap) -> Vec<FlowRecord> {
    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows {
        let record = FlowRecord {
            company: coerce::cell_text(cell_at(row, columns.company)),
            store: coerce::cell_text(cell_at(row, columns.store)),
            store_id: coerce::cell_text(cell_at(row, columns.store_id)),
            date: coerce::cell_date(cell_at(row, columns.date)),
            hour: coerce::cell_hour(cell_at(row, columns.hour)),
            flow: coerce::cell_flow(cell_at(row, columns.flow)),
        };

        if carries_no_information(&record) {
            dropped += 1;
            continue;
        }
        records.push(record);
    }

    if dropped > 0 {
        debug!(dropped, "dropped rows without date, hour, flow or store");
    }
    records
}

fn cell_at(row: &[Cell], idx: Option<usize>) -> &Cell {
    idx.and_then(|i| row.get(i)).unwrap_or(&Cell::Empty)
}

fn carries_no_information(record: &FlowRecord) -> bool {
    record.date.is_none() && record.hour.is_none() && record.flow.is_none() && record.store.is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceKey {
    prefer_clean: bool,
    clean_csv: (PathBuf, Option<SystemTime>),
    upload: Option<(PathBuf, u64)>,
    fallback_xlsx: (PathBuf, Option<SystemTime>),
    sheet_name: String,
}

impl SourceKey {
    fn of(request: &LoadRequest) -> Self {
        Self {
            prefer_clean: request.prefer_clean,
            clean_csv: (request.clean_csv.clone(), modified(&request.clean_csv)),
            upload: request.upload.as_ref().map(|u| {
                let mut hasher = DefaultHasher::new();
                u.bytes.hash(&mut hasher);
                (u.name.clone(), hasher.finish())
            }),
            fallback_xlsx: (request.fallback_xlsx.clone(), modified(&request.fallback_xlsx)),
            sheet_name: request.sheet_name.clone(),
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[derive(Debug, Default)]
pub struct CachedLoader {
    last: Option<(SourceKey, Rc<FlowTable>)>,
}

impl CachedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, request: &LoadRequest) -> Result<Rc<FlowTable>, LoadError> {
        let key = SourceKey::of(request);
        if let Some((cached_key, table)) = &self.last {
            if *cached_key == key {
                debug!("source unchanged, reusing loaded table");
                return Ok(Rc::clone(table));
            }
        }

        let table = Rc::new(load(request)?);
        self.last = Some((key, Rc::clone(&table)));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_xlsxwriter::Workbook;

    fn workbook_bytes(sheet: &str, rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(n) => worksheet.write_number(r as u32, c as u16, n).unwrap(),
                    Err(_) => worksheet.write_string(r as u32, c as u16, *value).unwrap(),
                };
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    fn request(dir: &Path) -> LoadRequest {
        LoadRequest {
            prefer_clean: true,
            clean_csv: dir.join("fluxo_seed_limpo.csv"),
            upload: None,
            fallback_xlsx: dir.join("Fluxo SEED 30d.xlsx"),
            sheet_name: "Fluxo seed 30d".to_string(),
        }
    }

    const SHEET: &[&[&str]] = &[
        &["Fluxo SEED", "", "", "", "", "", ""],
        &["gerado em", "01/02/2024", "", "", "", "", ""],
        &["Company", "Loja", "ID_Loja", "Data", "Hora", "Fluxo", "Data"],
        &["ACME", " Centro ", "1", "02/01/2024", "10", "50", "x"],
        &["ACME", "Centro", "1", "02/01/2024", "onze", "abc", "x"],
        &["", "", "", "", "", "", "rodape"],
        &["ACME", "Norte", "2", "2024-01-03", "9", "12.5", ""],
    ];

    #[test]
    fn reads_uploaded_workbook_with_metadata_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.upload = Some(Upload {
            name: PathBuf::from("upload.xlsx"),
            bytes: workbook_bytes("Fluxo seed 30d", SHEET),
        });

        let table = load(&req).unwrap();
        assert_eq!(table.source, DataSource::Upload(PathBuf::from("upload.xlsx")));
        assert_eq!(table.records.len(), 3);

        let first = &table.records[0];
        assert_eq!(first.store, "Centro");
        assert_eq!(first.store_id, "1");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(first.hour, Some(10));
        assert_eq!(first.flow, Some(50.0));

        let malformed = &table.records[1];
        assert_eq!(malformed.hour, None);
        assert_eq!(malformed.flow, None);
        assert!(malformed.date.is_some());

        assert_eq!(table.records[2].flow, Some(12.5));
    }

    #[test]
    fn native_date_cells_become_dates() {
        use rust_xlsxwriter::{ExcelDateTime, Format};

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Fluxo seed 30d").unwrap();
        for (c, name) in header::EXPECTED_COLUMNS.iter().enumerate() {
            worksheet.write_string(0, c as u16, *name).unwrap();
        }
        let day = ExcelDateTime::from_ymd(2024, 1, 2).unwrap();
        let format = Format::new().set_num_format("dd/mm/yyyy");
        worksheet.write_string(1, 0, "ACME").unwrap();
        worksheet.write_string(1, 1, "Centro").unwrap();
        worksheet.write_number(1, 2, 1.0).unwrap();
        worksheet.write_datetime_with_format(1, 3, &day, &format).unwrap();
        worksheet.write_number(1, 4, 10.0).unwrap();
        worksheet.write_number(1, 5, 42.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let records = read_workbook(&bytes, "Fluxo seed 30d", Path::new("x.xlsx")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(records[0].store_id, "1");
        assert_eq!(records[0].hour, Some(10));
        assert_eq!(records[0].flow, Some(42.0));
    }

    #[test]
    fn calamine_cells_map_to_raw_cells() {
        assert_eq!(cell_from_data(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(cell_from_data(&Data::Float(1.5)), Cell::Number(1.5));
        assert_eq!(
            cell_from_data(&Data::String("Centro".to_string())),
            Cell::Text("Centro".to_string())
        );
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
    }

    #[test]
    fn falls_back_to_first_sheet_when_name_differs() {
        let bytes = workbook_bytes("Planilha1", SHEET);
        let records = read_workbook(&bytes, "Fluxo seed 30d", Path::new("x.xlsx")).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn missing_header_is_terminal() {
        let bytes = workbook_bytes("Fluxo seed 30d", &[&["a", "b"], &["1", "2"]]);
        let err = read_workbook(&bytes, "Fluxo seed 30d", Path::new("x.xlsx")).unwrap_err();
        assert!(matches!(err, LoadError::HeaderNotFound(_)));
    }

    #[test]
    fn reduced_header_keeps_only_present_columns() {
        let bytes = workbook_bytes(
            "Fluxo seed 30d",
            &[&["Loja", "Data", "Fluxo"], &["Sul", "05/01/2024", "7"]],
        );
        let records = read_workbook(&bytes, "Fluxo seed 30d", Path::new("x.xlsx")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].store, "Sul");
        assert_eq!(records[0].company, "");
        assert_eq!(records[0].hour, None);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 5));
    }

    #[test]
    fn clean_csv_wins_when_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        std::fs::write(
            &req.clean_csv,
            "Company,Loja,ID_Loja,Data,Hora,Fluxo\nACME, Centro ,1,02/01/2024,10,50\nACME,Centro,1,bad,x,\n",
        )
        .unwrap();

        let table = load(&req).unwrap();
        assert!(matches!(table.source, DataSource::CleanCsv(_)));
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].store, "Centro");
        assert_eq!(table.records[0].date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(table.records[1].date, None);
        assert_eq!(table.records[1].hour, None);
        assert_eq!(table.records[1].flow, None);
    }

    #[test]
    fn upload_used_when_clean_not_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        std::fs::write(&req.clean_csv, "Company,Loja,ID_Loja,Data,Hora,Fluxo\n").unwrap();
        req.prefer_clean = false;
        req.upload = Some(Upload {
            name: PathBuf::from("upload.xlsx"),
            bytes: workbook_bytes("Fluxo seed 30d", SHEET),
        });
        assert!(matches!(load(&req).unwrap().source, DataSource::Upload(_)));
    }

    #[test]
    fn fallback_workbook_then_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path());
        assert!(matches!(load(&req), Err(LoadError::NoSource)));

        std::fs::write(&req.fallback_xlsx, workbook_bytes("Fluxo seed 30d", SHEET)).unwrap();
        let table = load(&req).unwrap();
        assert!(matches!(table.source, DataSource::FallbackWorkbook(_)));
        assert_eq!(table.records.len(), 3);
    }

    #[test]
    fn cached_loader_reuses_identical_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.upload = Some(Upload {
            name: PathBuf::from("upload.xlsx"),
            bytes: workbook_bytes("Fluxo seed 30d", SHEET),
        });

        let mut loader = CachedLoader::new();
        let first = loader.load(&req).unwrap();
        let second = loader.load(&req).unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        req.upload = Some(Upload {
            name: PathBuf::from("upload.xlsx"),
            bytes: workbook_bytes("Fluxo seed 30d", &SHEET[..4]),
        });
        let third = loader.load(&req).unwrap();
        assert!(!Rc::ptr_eq(&first, &third));
        assert_eq!(third.records.len(), 1);
    }
}
