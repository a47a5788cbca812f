//! Outline Commands - 大纲合成命令

/// 合成大纲命令
///
/// 要求模型产出 [min,max] 范围内的有序节拍列表
#[derive(Debug, Clone)]
pub struct CreateOutlineCommand {
    pub premise: String,
    pub min_chapters: usize,
    pub max_chapters: usize,
}

/// 合成大纲响应
#[derive(Debug, Clone)]
pub struct CreateOutlineResponse {
    /// 有序节拍，与未来章节 1:1
    pub beats: Vec<String>,
    /// 实际使用的降级层级（结构化/字段恢复/启发式）
    pub parse_tier: &'static str,
    /// 消耗的合成尝试次数
    pub attempts: u32,
}
