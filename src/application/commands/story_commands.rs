//! Story Commands - 故事创建命令

use uuid::Uuid;

/// 创建故事命令
///
/// 一次性完成: 大纲合成 + 人物表生成 + 章节播种
#[derive(Debug, Clone)]
pub struct CreateStoryCommand {
    pub title: String,
    pub premise: String,
    pub owner_id: String,
    pub min_chapters: usize,
    pub max_chapters: usize,
    /// 续作时指向前作
    pub parent_id: Option<Uuid>,
}

/// 创建故事响应
#[derive(Debug, Clone)]
pub struct CreateStoryResponse {
    pub id: Uuid,
    pub title: String,
    pub beats: Vec<String>,
    pub characters: String,
}
