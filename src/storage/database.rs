//! 数据库存储模块
//!
//! 使用SQLite存储课程目录的原始记录。
//! 核心只需要读接口；导入（seed）是一次性的数据装载步骤。

use crate::core::graph::{CourseGraph, LoadOptions, LoadReport};
use crate::core::models::{CourseCode, RawCourseRecord};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;

/// 导入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// 先清空再导入
    #[default]
    Replace,
    /// 按代码覆盖已有记录
    Merge,
}

/// 导入统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    /// 写入的课程数
    pub imported: usize,
    /// 代码无效被跳过的记录数
    pub skipped: usize,
    /// 规范化后重复、被后一条覆盖的记录数
    pub duplicates: usize,
}

/// 课程目录存储
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// 打开或创建数据库
    pub fn open(path: &Path) -> Result<Self> {
        // 确保目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// 内存数据库，测试用
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_tables()?;
        Ok(store)
    }

    /// 初始化表结构
    fn init_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- 课程表，代码已规范化
            CREATE TABLE IF NOT EXISTS courses (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                prereqs_json TEXT NOT NULL DEFAULT 'null',
                antireqs_json TEXT NOT NULL DEFAULT 'null',
                coreqs_json TEXT NOT NULL DEFAULT 'null',
                postrequisites_json TEXT NOT NULL DEFAULT '[]',
                imported_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// 批量导入原始记录（单个事务）
    pub fn import_records(
        &mut self,
        records: Vec<RawCourseRecord>,
        mode: ImportMode,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        // 先在内存里按规范化代码去重，后出现的记录覆盖前面的
        let mut order = Vec::new();
        let mut by_code: HashMap<CourseCode, RawCourseRecord> = HashMap::new();
        for mut record in records {
            let Some(code) = CourseCode::parse(&record.code) else {
                summary.skipped += 1;
                continue;
            };
            record.code = code.to_string();
            if by_code.insert(code.clone(), record).is_some() {
                tracing::warn!("导入时发现重复课程 {}，使用后一条记录", code);
                summary.duplicates += 1;
            } else {
                order.push(code);
            }
        }

        let imported_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        if mode == ImportMode::Replace {
            let deleted = tx.execute("DELETE FROM courses", [])?;
            tracing::info!("已清空 {} 条旧课程记录", deleted);
        }
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO courses
                (code, name, description, prereqs_json, antireqs_json, coreqs_json,
                 postrequisites_json, imported_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for code in &order {
                let Some(record) = by_code.get(code) else {
                    continue;
                };
                stmt.execute(params![
                    record.code,
                    record.name,
                    record.description,
                    serde_json::to_string(&record.prereqs)?,
                    serde_json::to_string(&record.antireqs)?,
                    serde_json::to_string(&record.coreqs)?,
                    serde_json::to_string(&record.postrequisites)?,
                    imported_at,
                ])?;
                summary.imported += 1;
            }
        }
        tx.commit()?;

        tracing::info!(
            "导入完成: {} 门课程，跳过 {} 条，重复 {} 条",
            summary.imported,
            summary.skipped,
            summary.duplicates
        );
        Ok(summary)
    }

    /// 从JSON文件导入（原始记录数组）
    pub fn import_json_file(&mut self, path: &Path, mode: ImportMode) -> Result<ImportSummary> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<RawCourseRecord> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("解析课程文件失败 {}: {}", path.display(), e))?;
        tracing::info!("从 {} 读取到 {} 条课程记录", path.display(), records.len());
        self.import_records(records, mode)
    }

    /// 加载全部记录，按代码排序
    pub fn load_records(&self) -> Result<Vec<RawCourseRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT code, name, description, prereqs_json, antireqs_json, coreqs_json,
                   postrequisites_json
            FROM courses
            ORDER BY code
            "#,
        )?;

        let rows = stmt.query_map([], row_to_columns)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(columns_to_record(row?)?);
        }
        Ok(records)
    }

    /// 查询单条记录
    pub fn get_record(&self, raw_code: &str) -> Result<Option<RawCourseRecord>> {
        let code = CourseCode::normalize(raw_code);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT code, name, description, prereqs_json, antireqs_json, coreqs_json,
                   postrequisites_json
            FROM courses
            WHERE code = ?1
            "#,
        )?;

        let result = stmt.query_row(params![code], row_to_columns);

        match result {
            Ok(columns) => Ok(Some(columns_to_record(columns)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 课程数量
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 清空课程表
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM courses", [])?)
    }

    /// 读取全部记录并构建课程图
    pub fn load_graph(&self, options: LoadOptions) -> Result<LoadReport> {
        let records = self.load_records()?;
        CourseGraph::load_with(records, options).map_err(|e| {
            for issue in &e.issues {
                tracing::warn!("{}", issue);
            }
            anyhow::Error::new(e)
        })
    }
}

type Columns = (String, String, String, String, String, String, String);

fn row_to_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<Columns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn columns_to_record(columns: Columns) -> Result<RawCourseRecord> {
    let (code, name, description, prereqs, antireqs, coreqs, postrequisites) = columns;
    Ok(RawCourseRecord {
        code,
        name,
        description,
        prereqs: serde_json::from_str(&prereqs)?,
        antireqs: serde_json::from_str(&antireqs)?,
        coreqs: serde_json::from_str(&coreqs)?,
        postrequisites: serde_json::from_str(&postrequisites)?,
    })
}
