//! 课程图模块
//!
//! 以规范化课程代码为键的内存索引，负责：
//! - 从原始记录整体构建（不提供局部修改接口）
//! - 反推后续课程（postrequisites）
//! - O(1) 查找

use crate::core::error::{CatalogError, LoadError};
use crate::core::models::{Course, CourseCode, RawCourseRecord};
use crate::core::requirement::{RequirementBuilder, DEFAULT_MAX_DEPTH};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};

/// 遇到格式错误的课程时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// 整轮加载失败
    #[default]
    Abort,
    /// 跳过该课程，其余照常加载
    Skip,
}

/// 加载选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub policy: MalformedPolicy,
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            policy: MalformedPolicy::Abort,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl LoadOptions {
    pub fn skip_malformed(mut self) -> Self {
        self.policy = MalformedPolicy::Skip;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// 宽松加载的结果
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub graph: CourseGraph,
    /// 被跳过的课程及原因
    pub skipped: Vec<CatalogError>,
}

/// 课程图
#[derive(Debug, Clone, Default)]
pub struct CourseGraph {
    courses: HashMap<CourseCode, Course>,
}

impl CourseGraph {
    /// 严格加载：任何格式错误都会让加载失败
    pub fn load(rows: impl IntoIterator<Item = RawCourseRecord>) -> Result<Self, LoadError> {
        Self::load_with(rows, LoadOptions::default()).map(|report| report.graph)
    }

    /// 按选项加载
    ///
    /// 全部记录处理完之后才汇报问题，避免一行错误掩盖其他错误。
    /// 代码重复总是致命的。
    pub fn load_with(
        rows: impl IntoIterator<Item = RawCourseRecord>,
        options: LoadOptions,
    ) -> Result<LoadReport, LoadError> {
        let builder = RequirementBuilder::new(options.max_depth);
        let mut courses = HashMap::new();
        let mut seen = HashSet::new();
        let mut issues = Vec::new();

        for row in rows {
            let Some(code) = CourseCode::parse(&row.code) else {
                issues.push(CatalogError::InvalidCourseCode { raw: row.code });
                continue;
            };
            if !seen.insert(code.clone()) {
                issues.push(CatalogError::DuplicateCourse(code));
                continue;
            }
            match build_course(&builder, code, row) {
                Ok(course) => {
                    courses.insert(course.code.clone(), course);
                }
                Err(e) => issues.push(e),
            }
        }

        let fatal = issues.iter().any(CatalogError::is_fatal);
        if fatal || (options.policy == MalformedPolicy::Abort && !issues.is_empty()) {
            tracing::warn!("课程图加载失败，共 {} 个问题", issues.len());
            return Err(LoadError { issues });
        }

        for issue in &issues {
            tracing::warn!("跳过课程: {}", issue);
        }

        derive_postrequisites(&mut courses);
        tracing::info!(
            "课程图加载完成，共 {} 门课程，跳过 {} 条",
            courses.len(),
            issues.len()
        );

        Ok(LoadReport {
            graph: Self { courses },
            skipped: issues,
        })
    }

    /// 按规范化代码查找
    pub fn get(&self, code: &CourseCode) -> Option<&Course> {
        self.courses.get(code)
    }

    /// 按原始输入查找（先规范化）
    pub fn get_raw(&self, raw: &str) -> Option<&Course> {
        self.courses.get(CourseCode::normalize(raw).as_str())
    }

    pub fn contains(&self, code: &CourseCode) -> bool {
        self.courses.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// 全部课程代码，按字典序
    pub fn codes(&self) -> Vec<&CourseCode> {
        let mut codes: Vec<_> = self.courses.keys().collect();
        codes.sort();
        codes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    /// 课程内容的 SHA-256 指纹，与记录顺序无关
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for code in self.codes() {
            hasher.update(code.as_str().as_bytes());
            if let Some(course) = self.courses.get(code) {
                if let Ok(bytes) = serde_json::to_vec(course) {
                    hasher.update(&bytes);
                }
            }
        }
        hex::encode(hasher.finalize())
    }
}

fn build_course(
    builder: &RequirementBuilder,
    code: CourseCode,
    row: RawCourseRecord,
) -> Result<Course, CatalogError> {
    let tag = |e: CatalogError| e.with_course(code.as_str());

    let prereqs = builder.build(&row.prereqs).map_err(tag)?;
    let antireqs = builder.build_antirequisites(&row.antireqs).map_err(tag)?;
    let coreqs = builder.build(&row.coreqs).map_err(tag)?;

    let mut program_restrictions = prereqs.programs;
    for name in antireqs.programs.into_iter().chain(coreqs.programs) {
        if !program_restrictions.contains(&name) {
            program_restrictions.push(name);
        }
    }

    Ok(Course {
        code,
        name: row.name,
        description: row.description,
        prerequisites: prereqs.node,
        antirequisites: antireqs.node,
        corequisites: coreqs.node,
        postrequisites: BTreeSet::new(),
        program_restrictions,
        listed_postrequisites: row
            .postrequisites
            .into_iter()
            .map(|p| p.into_ref())
            .collect(),
    })
}

/// 反转先修引用，只记录图中存在的课程，忽略自引用
fn derive_postrequisites(courses: &mut HashMap<CourseCode, Course>) {
    let mut back: HashMap<CourseCode, BTreeSet<CourseCode>> = HashMap::new();
    for course in courses.values() {
        for leaf in course.prerequisites.leaves() {
            if leaf.code != course.code && courses.contains_key(&leaf.code) {
                back.entry(leaf.code.clone())
                    .or_default()
                    .insert(course.code.clone());
            }
        }
    }
    for (code, postrequisites) in back {
        if let Some(course) = courses.get_mut(&code) {
            course.postrequisites = postrequisites;
        }
    }
}
