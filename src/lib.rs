//! coursetree - 课程先修关系求值
//!
//! 核心设计原则：
//! - 先修要求是封闭的布尔表达式树（All / AnyOf / Not / 叶子）
//! - 课程之间只通过代码互相引用，由课程图统一查找
//! - 课程图构建后不可变，刷新时整体替换
//! - 每次查询都针对调用方给出的完成集合真实求值

pub mod core;
pub mod storage;

pub use crate::core::catalog::{CatalogHandle, CatalogSnapshot};
pub use crate::core::error::{CatalogError, LoadError, ResolveError};
pub use crate::core::graph::{CourseGraph, LoadOptions, MalformedPolicy};
pub use crate::core::models::{Course, CourseCode, RawCourseRecord, RequirementNode, Verdict};
pub use crate::core::resolver::Resolver;
pub use crate::core::validator::{validate, ValidationOutcome, ValidationReport};
