// ==========================================
// 表格数据导入系统 - 单元格网格
// ==========================================
// 职责: 表示从上传文件中提取出的行列网格
// 坐标: 行号 0 为表头行（不计入数据区），数据区行号从 1 开始；列号从 1 开始
// 不变量: 数据区为 [1, rows-1] × [1, cols]，区外坐标一律返回空值
// ==========================================

use std::collections::HashMap;

/// 单元格网格
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    /// 行数（最后一个非空数据行的行号 + 1）
    pub rows: usize,
    /// 列数
    pub cols: usize,
    /// 表头行（行号 0）的值，仅用于展示，下标 0 对应第 1 列
    pub header: Vec<String>,
    /// 数据区单元格（稀疏存储，缺失即空值）
    cells: HashMap<(usize, usize), String>,
}

impl Grid {
    /// 创建指定范围的空网格
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            header: Vec::new(),
            cells: HashMap::new(),
        }
    }

    /// 判断坐标是否落在数据区内
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= 1 && row < self.rows && col >= 1 && col <= self.cols
    }

    /// 读取单元格（区外或缺失时返回空字符串）
    pub fn cell(&self, row: usize, col: usize) -> &str {
        if !self.contains(row, col) {
            return "";
        }
        self.cells.get(&(row, col)).map(String::as_str).unwrap_or("")
    }

    /// 写入单元格（区外写入被忽略，空值不占用存储）
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if !self.contains(row, col) {
            return;
        }
        let value = value.into();
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    /// 数据区行号迭代器
    pub fn data_rows(&self) -> impl Iterator<Item = usize> {
        1..self.rows.max(1)
    }

    /// 数据区行数
    pub fn data_row_count(&self) -> usize {
        self.rows.saturating_sub(1)
    }

    /// 读取一整行（下标 0 对应第 1 列）
    pub fn row_values(&self, row: usize) -> Vec<String> {
        (1..=self.cols)
            .map(|col| self.cell(row, col).to_string())
            .collect()
    }

    /// 数据区是否为空
    pub fn is_empty(&self) -> bool {
        self.data_row_count() == 0 || self.cols == 0
    }
}
