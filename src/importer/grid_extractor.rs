// ==========================================
// 表格数据导入系统 - 网格提取器
// ==========================================
// 支持: 分隔符文本 (.csv/.txt/.tsv) / 工作簿 (.xlsx/.xlsm/.xlsb/.xls/.ods)
// 只读取第一个工作表
// 两遍处理:
// - 第一遍: 统计行数（最后一个非空数据行 + 1，从第 1 行开始扫描）与列数
// - 第二遍: 按坐标逐格填充 [1, rows-1] × [1, cols]
// ==========================================

use crate::domain::{ColumnExtentMode, Grid};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use csv::ReaderBuilder;
use encoding_rs::Encoding;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, instrument};

/// 默认的旧版单字节编码
pub const DEFAULT_LEGACY_ENCODING: &str = "windows-1252";

/// 候选分隔符（按优先级排列，计数相同时取靠前者）
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const OLE2_SIGNATURE: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

// ==========================================
// FileFormat - 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// 分隔符文本
    Delimited,
    /// 工作簿（OLE2 旧版或 ZIP 容器）
    Workbook,
}

/// 识别文件格式：先看内容签名，再看扩展名与类型提示
pub fn identify_format(
    bytes: &[u8],
    filename: &str,
    content_type: Option<&str>,
) -> ImportResult<FileFormat> {
    if bytes.starts_with(OLE2_SIGNATURE) || bytes.starts_with(ZIP_SIGNATURE) {
        return Ok(FileFormat::Workbook);
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" | "tsv" => return Ok(FileFormat::Delimited),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => return Ok(FileFormat::Workbook),
        _ => {}
    }

    match content_type.map(|c| c.to_ascii_lowercase()) {
        Some(ct) if ct.starts_with("text/csv") || ct.starts_with("text/plain") => {
            Ok(FileFormat::Delimited)
        }
        _ => Err(ImportError::UnreadableFile(format!(
            "无法识别的文件格式: {}",
            filename
        ))),
    }
}

/// 探测分隔符：取第一行非空文本中出现次数最多的候选分隔符，默认逗号
pub fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut best = (b',', 0usize);
    for candidate in DELIMITER_CANDIDATES {
        let count = first_line.bytes().filter(|b| *b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

// ==========================================
// CellSource - 提取源抽象
// ==========================================
// 坐标约定与 Grid 相同：行号 0 为表头，列号从 1 开始
trait CellSource {
    /// 所有非空单元格坐标
    fn occupied(&self) -> Vec<(usize, usize)>;

    /// 按坐标取值（缺失返回空串）
    fn value_at(&self, row: usize, col: usize) -> String;
}

/// 分隔符文本的逐行记录
struct DelimitedRows {
    rows: Vec<Vec<String>>,
}

impl CellSource for DelimitedRows {
    fn occupied(&self) -> Vec<(usize, usize)> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, fields)| {
                fields
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_empty())
                    .map(move |(c, _)| (r, c + 1))
            })
            .collect()
    }

    fn value_at(&self, row: usize, col: usize) -> String {
        if col == 0 {
            return String::new();
        }
        self.rows
            .get(row)
            .and_then(|fields| fields.get(col - 1))
            .cloned()
            .unwrap_or_default()
    }
}

/// 工作表区域（calamine Range 的坐标为 0 起始的绝对坐标）
struct SheetRange {
    range: Range<Data>,
}

impl CellSource for SheetRange {
    fn occupied(&self) -> Vec<(usize, usize)> {
        let (start_row, start_col) = match self.range.start() {
            Some((r, c)) => (r as usize, c as usize),
            None => return Vec::new(),
        };
        self.range
            .used_cells()
            .filter(|(_, _, data)| !cell_to_string(data).is_empty())
            .map(|(r, c, _)| (start_row + r, start_col + c + 1))
            .collect()
    }

    fn value_at(&self, row: usize, col: usize) -> String {
        if col == 0 {
            return String::new();
        }
        self.range
            .get_value((row as u32, (col - 1) as u32))
            .map(cell_to_string)
            .unwrap_or_default()
    }
}

/// 单元格值转字符串（整数值的浮点数不带小数部分）
fn cell_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

// ==========================================
// GridExtractor
// ==========================================
#[derive(Debug, Clone)]
pub struct GridExtractor {
    column_extent_mode: ColumnExtentMode,
    legacy_encoding: &'static Encoding,
}

impl Default for GridExtractor {
    fn default() -> Self {
        Self {
            column_extent_mode: ColumnExtentMode::default(),
            legacy_encoding: encoding_rs::WINDOWS_1252,
        }
    }
}

impl GridExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置列数统计口径
    pub fn with_column_extent_mode(mut self, mode: ColumnExtentMode) -> Self {
        self.column_extent_mode = mode;
        self
    }

    /// 设置旧版编码（WHATWG 编码标签，如 "windows-1252"）
    pub fn with_legacy_encoding_label(mut self, label: &str) -> ImportResult<Self> {
        self.legacy_encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| ImportError::Config(format!("未知的编码标签: {}", label)))?;
        Ok(self)
    }

    /// 从本地文件提取网格
    ///
    /// # 参数
    /// - path: 本地文件路径
    /// - legacy_encoding: 分隔符文本是否按旧版单字节编码转码
    ///
    /// # 返回
    /// - Err(Io): 文件无法打开
    /// - Err(UnreadableFile): 格式无法识别或读取器拒绝内容
    pub fn extract(&self, path: &Path, legacy_encoding: bool) -> ImportResult<Grid> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.extract_bytes(&bytes, &filename, None, legacy_encoding)
    }

    /// 从内存内容提取网格
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: Option<&str>,
        legacy_encoding: bool,
    ) -> ImportResult<Grid> {
        let format = identify_format(bytes, filename, content_type)?;
        debug!(?format, "文件格式识别完成");

        let grid = match format {
            FileFormat::Delimited => {
                let source = self.read_delimited(bytes, legacy_encoding)?;
                self.build_grid(&source)
            }
            FileFormat::Workbook => {
                let source = Self::read_first_sheet(bytes)?;
                self.build_grid(&source)
            }
        };

        debug!(rows = grid.rows, cols = grid.cols, "网格提取完成");
        Ok(grid)
    }

    fn read_delimited(&self, bytes: &[u8], legacy_encoding: bool) -> ImportResult<DelimitedRows> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let text = if legacy_encoding {
            let (decoded, had_errors) = self.legacy_encoding.decode_without_bom_handling(bytes);
            if had_errors {
                debug!(encoding = self.legacy_encoding.name(), "转码过程中存在无法映射的字节");
            }
            decoded.into_owned()
        } else {
            String::from_utf8(bytes.to_vec()).map_err(|_| {
                ImportError::UnreadableFile("文本不是有效的 UTF-8，请启用旧版编码转码".to_string())
            })?
        };

        let delimiter = sniff_delimiter(&text);
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(DelimitedRows { rows })
    }

    fn read_first_sheet(bytes: &[u8]) -> ImportResult<SheetRange> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::UnreadableFile("工作簿中没有工作表".to_string()))??;
        Ok(SheetRange { range })
    }

    fn build_grid(&self, source: &dyn CellSource) -> Grid {
        // === 第一遍: 统计范围 ===
        let occupied = source.occupied();
        let mut per_row: BTreeMap<usize, usize> = BTreeMap::new();
        let mut max_col = 0;
        let mut header_width = 0;
        for &(row, col) in &occupied {
            if row == 0 {
                header_width = header_width.max(col);
                continue;
            }
            *per_row.entry(row).or_insert(0) += 1;
            max_col = max_col.max(col);
        }

        let rows = per_row.keys().next_back().map(|last| last + 1).unwrap_or(1);
        let cols = match self.column_extent_mode {
            ColumnExtentMode::ExistingCellCount => per_row.values().copied().max().unwrap_or(0),
            ColumnExtentMode::MaxColumnIndex => max_col,
        };

        // === 第二遍: 按坐标填充 ===
        let mut grid = Grid::new(rows, cols);
        grid.header = (1..=header_width).map(|col| source.value_at(0, col)).collect();
        for row in 1..rows {
            for col in 1..=cols {
                grid.set_cell(row, col, source.value_at(row, col));
            }
        }
        grid
    }
}
