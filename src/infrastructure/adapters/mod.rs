//! 出站适配器

pub mod provider;
