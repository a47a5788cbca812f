//! Rewrite Commands - 分块重写命令

use uuid::Uuid;

/// 分块润色命令
///
/// 只重写叙述片段，对白与空白原样透传
#[derive(Debug, Clone)]
pub struct RefineChapterCommand {
    pub story_id: Uuid,
    pub chapter_index: usize,
    /// 润色风格指示（如"更凝练"、"加强悬念"）
    pub style_instruction: String,
}

/// 分块润色响应
#[derive(Debug, Clone)]
pub struct RefineChapterResponse {
    pub story_id: Uuid,
    pub chapter_index: usize,
    pub content: String,
    /// 送去重写的叙述片段数
    pub rewritten_sections: usize,
    /// 重写失败回退原文的片段数
    pub fallback_sections: usize,
}
