// ==========================================
// 表格数据导入系统 - 提交数据集解码
// ==========================================
// 职责: 把操作员提交的逐行数据还原为 {行号 → {列号 → 值}}，并叠加到网格上
// 合并规则: 按出现顺序合并，同一 (行, 键) 后到者覆盖
// 导入标记:
// - 未提交数据集时，网格全部数据行都导入
// - 结构化片段未给出 import 时视为导入
// - 表单序列化形式未出现 import 时视为不导入（未勾选的复选框不会被提交）
// ==========================================

use crate::domain::{FormPair, Grid, ImportRow, RowFragment, SubmittedDataset};
use std::collections::BTreeMap;
use tracing::debug;

/// 表单路径中的数据集段名
const DATASET_SEGMENT: &str = "dataset";
/// 导入标记键
const IMPORT_KEY: &str = "import";

/// 解码后的单行数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedRow {
    /// 列号 → 值
    pub cells: BTreeMap<usize, String>,
    /// 最后一次显式给出的导入标记
    pub import: Option<bool>,
}

/// 解析布尔形式的导入标记
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// 解析表单路径 "ns[dataset][3][2]" → (3, "2")
fn parse_form_path(name: &str) -> Option<(usize, String)> {
    let mut segments = Vec::new();
    let mut rest = name;
    while let Some(open) = rest.find('[') {
        let close = rest[open..].find(']')? + open;
        segments.push(&rest[open + 1..close]);
        rest = &rest[close + 1..];
    }

    let pos = segments.iter().position(|s| *s == DATASET_SEGMENT)?;
    let row = segments.get(pos + 1)?.trim().parse::<usize>().ok()?;
    let key = segments.get(pos + 2)?.trim().to_string();
    Some((row, key))
}

fn merge_entry(rows: &mut BTreeMap<usize, DecodedRow>, row: usize, key: &str, value: &str) {
    let entry = rows.entry(row).or_default();
    if key == IMPORT_KEY {
        entry.import = Some(parse_flag(value));
        return;
    }
    match key.parse::<usize>() {
        Ok(col) if col >= 1 => {
            entry.cells.insert(col, value.to_string());
        }
        _ => debug!(row, key, "忽略无法识别的数据集键"),
    }
}

fn decode_fragments(fragments: &[RowFragment]) -> BTreeMap<usize, DecodedRow> {
    let mut rows = BTreeMap::new();
    for fragment in fragments {
        for (key, value) in &fragment.fields {
            merge_entry(&mut rows, fragment.row, key, value);
        }
        let entry = rows.entry(fragment.row).or_default();
        if let Some(flag) = fragment.import {
            entry.import = Some(flag);
        }
    }
    rows
}

fn decode_form_pairs(pairs: &[FormPair]) -> BTreeMap<usize, DecodedRow> {
    let mut rows = BTreeMap::new();
    for pair in pairs {
        match parse_form_path(&pair.name) {
            Some((row, key)) => merge_entry(&mut rows, row, &key, &pair.value),
            None => debug!(name = %pair.name, "忽略非数据集表单项"),
        }
    }
    rows
}

/// 解码提交的数据集
pub fn decode_dataset(dataset: &SubmittedDataset) -> BTreeMap<usize, DecodedRow> {
    match dataset {
        SubmittedDataset::Fragments(fragments) => decode_fragments(fragments),
        SubmittedDataset::FormPairs(pairs) => decode_form_pairs(pairs),
    }
}

fn is_empty_dataset(dataset: &SubmittedDataset) -> bool {
    match dataset {
        SubmittedDataset::Fragments(f) => f.is_empty(),
        SubmittedDataset::FormPairs(p) => p.is_empty(),
    }
}

/// 按网格与提交数据集生成待导入行（按行号升序）
///
/// # 参数
/// - grid: 提取出的网格
/// - dataset: 操作员提交的数据集（为空时网格全部数据行都导入）
pub fn import_rows(grid: &Grid, dataset: &SubmittedDataset) -> Vec<ImportRow> {
    let grid_row = |row: usize| -> BTreeMap<usize, String> {
        (1..=grid.cols)
            .map(|col| (col, grid.cell(row, col).to_string()))
            .collect()
    };

    if is_empty_dataset(dataset) {
        return grid
            .data_rows()
            .map(|row| ImportRow {
                row,
                cells: grid_row(row),
                import: true,
            })
            .collect();
    }

    let default_flag = matches!(dataset, SubmittedDataset::Fragments(_));
    decode_dataset(dataset)
        .into_iter()
        .map(|(row, decoded)| {
            let mut cells = grid_row(row);
            cells.extend(decoded.cells);
            ImportRow {
                row,
                cells,
                import: decoded.import.unwrap_or(default_flag),
            }
        })
        .collect()
}
