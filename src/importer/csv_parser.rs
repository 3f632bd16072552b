// ==========================================
// 图书馆借阅管理系统 - CSV 解析器
// ==========================================
// 职责: CSV → 行记录（表头 → 值），去空白、跳过空行
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 一行原始记录: (行号, 表头 → 值)；行号从 2 开始（第 1 行为表头）
pub type RawRecord = (usize, HashMap<String, String>);

pub struct CsvParser;

impl CsvParser {
    /// 解析 CSV 文件
    pub fn parse_file(path: &Path) -> ImportResult<Vec<RawRecord>> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(path)?;
        Self::parse_reader(file)
    }

    /// 从任意输入流解析
    pub fn parse_reader<R: Read>(input: R) -> ImportResult<Vec<RawRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let mut row_map = HashMap::new();
            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }
            records.push((idx + 2, row_map));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reader_trims_and_skips_blank() {
        let data = "Title , Total_Copies\n  Dune , 3 \n,\nEmma,2\n";
        let records = CsvParser::parse_reader(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 2);
        assert_eq!(records[0].1.get("title").map(String::as_str), Some("Dune"));
        assert_eq!(records[1].0, 4);
        assert_eq!(records[1].1.get("total_copies").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_parse_file_rejects_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.txt");
        std::fs::write(&path, "title\nX\n").unwrap();
        assert!(matches!(
            CsvParser::parse_file(&path),
            Err(ImportError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            CsvParser::parse_file(&dir.path().join("missing.csv")),
            Err(ImportError::FileNotFound(_))
        ));
    }
}
