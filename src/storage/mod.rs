//! 存储模块 - 课程目录数据库与配置文件

pub mod config;
pub mod database;
