//! 提示词装配
//!
//! 纯函数构造各类生成请求的消息序列。
//!
//! 场景写作的上下文包含:
//! - 最近若干已写章节，按字符预算从最旧一端截断
//! - 所有尚未写作的未来节拍，以"可铺垫、不可揭示"的单向剧透屏障框定

use crate::application::ports::{ChatMessage, SessionKind};

/// 章节上下文（提示词视角的故事切面）
#[derive(Debug, Clone)]
pub struct SceneContext<'a> {
    pub premise: &'a str,
    pub characters: &'a str,
    /// 当前章节之前的 (标题, 正文)，按故事顺序
    pub prior_chapters: &'a [(String, String)],
    /// 尚未写作的未来节拍
    pub future_beats: Vec<&'a str>,
    /// 当前章节的节拍
    pub beat: &'a str,
    /// 1-based 章节号
    pub chapter_number: usize,
    pub total_chapters: usize,
}

/// 大纲合成提示词
///
/// 显式给出数量边界并要求结构化输出
pub fn outline_messages(premise: &str, min: usize, max: usize) -> Vec<ChatMessage> {
    let system = "You are a fiction story architect. \
        Respond with a JSON array only, no commentary before or after.";
    let user = format!(
        "Break the following story premise into an ordered chapter outline.\n\
         Produce between {min} and {max} chapters (inclusive). \
         Respond with a JSON array of objects, each {{\"index\": n, \"beat\": \"...\"}}, \
         where beat is 1-3 sentences describing the intended events of that chapter.\n\n\
         Premise:\n{premise}"
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// 人物表生成提示词
pub fn characters_messages(premise: &str, beats: &[String]) -> Vec<ChatMessage> {
    let outline = beats
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{}. {}", i + 1, b))
        .collect::<Vec<_>>()
        .join("\n");
    let user = format!(
        "Given this story premise and chapter outline, write a character roster: \
         each main character's name, role, and one-paragraph description.\n\n\
         Premise:\n{premise}\n\nOutline:\n{outline}"
    );
    vec![
        ChatMessage::system("You are a fiction story architect."),
        ChatMessage::user(user),
    ]
}

/// 场景写作/修订/衔接提示词
///
/// `existing` 为会话前的章节正文（Revise/Transition 需要）；
/// `context_char_budget` 限制已写章节回看窗口的字符总量。
pub fn scene_messages(
    ctx: &SceneContext<'_>,
    kind: SessionKind,
    existing: &str,
    instructions: Option<&str>,
    context_char_budget: usize,
) -> Vec<ChatMessage> {
    let mut context = String::new();

    context.push_str(&format!("Story premise:\n{}\n\n", ctx.premise));
    if !ctx.characters.is_empty() {
        context.push_str(&format!("Characters:\n{}\n\n", ctx.characters));
    }

    let window = recent_window(ctx.prior_chapters, context_char_budget);
    if !window.is_empty() {
        context.push_str("Most recent chapters so far:\n");
        context.push_str(&window);
        context.push('\n');
    }

    if !ctx.future_beats.is_empty() {
        // 单向剧透屏障: 未来节拍只作导向，严禁提前揭示
        context.push_str(
            "Planned beats for FUTURE chapters. You must NOT reveal these events, \
             twists or outcomes in the current chapter. You may plant subtle \
             foreshadowing at most:\n",
        );
        for beat in &ctx.future_beats {
            context.push_str(&format!("- {beat}\n"));
        }
        context.push('\n');
    }

    let task = match kind {
        SessionKind::Write => format!(
            "Write chapter {} of {} as flowing prose. Chapter beat:\n{}",
            ctx.chapter_number, ctx.total_chapters, ctx.beat
        ),
        SessionKind::Revise => format!(
            "Revise the following draft of chapter {} according to the instructions. \
             Return the full revised chapter.\n\nInstructions: {}\n\nDraft:\n{}",
            ctx.chapter_number,
            instructions.unwrap_or("improve flow and clarity"),
            existing
        ),
        SessionKind::Transition => format!(
            "Write a transition passage that bridges from the end of the previous \
             chapter into chapter {}. Chapter beat:\n{}\n\n\
             Current chapter draft (the transition goes before it):\n{}",
            ctx.chapter_number, ctx.beat, existing
        ),
        SessionKind::Refine => format!(
            "Polish the following chapter {} prose while preserving events and \
             dialogue verbatim.\n\n{}",
            ctx.chapter_number, existing
        ),
    };

    vec![
        ChatMessage::system(
            "You are a novelist writing long-form fiction. Write immersive prose. \
             Output the chapter text only, no headings or commentary.",
        ),
        ChatMessage::user(format!("{context}{task}")),
    ]
}

/// 单个叙述片段的重写提示词（分块重写引擎）
pub fn rewrite_section_messages(section: &str, style_instruction: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You rewrite narrative prose passages. Keep the same events, names and \
             meaning. Output only the rewritten passage, nothing else.",
        ),
        ChatMessage::user(format!(
            "Rewrite this narrative passage. Style instruction: {style_instruction}\n\n{section}"
        )),
    ]
}

/// 回看窗口: 从最近的章节向前取，总量不超过字符预算
///
/// 预算内放不下的最早一章取其结尾部分（故事语境里结尾最相关）
fn recent_window(prior_chapters: &[(String, String)], budget: usize) -> String {
    if budget == 0 || prior_chapters.is_empty() {
        return String::new();
    }

    let mut picked: Vec<String> = Vec::new();
    let mut used = 0usize;

    for (title, content) in prior_chapters.iter().rev() {
        if content.trim().is_empty() {
            continue;
        }
        let remaining = budget - used;
        if remaining == 0 {
            break;
        }

        let chars: Vec<char> = content.chars().collect();
        let block = if chars.len() <= remaining {
            format!("## {title}\n{content}\n")
        } else {
            let tail: String = chars[chars.len() - remaining..].iter().collect();
            format!("## {title} (excerpt)\n...{tail}\n")
        };
        used += content.chars().count().min(remaining);
        picked.push(block);

        if used >= budget {
            break;
        }
    }

    picked.reverse();
    picked.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(prior: &'a [(String, String)], future: Vec<&'a str>) -> SceneContext<'a> {
        SceneContext {
            premise: "a premise",
            characters: "a hero",
            prior_chapters: prior,
            future_beats: future,
            beat: "the current beat",
            chapter_number: 2,
            total_chapters: 5,
        }
    }

    #[test]
    fn test_outline_messages_state_bounds() {
        let messages = outline_messages("premise", 6, 12);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("between 6 and 12"));
        assert!(messages[1].content.contains("\"beat\""));
    }

    #[test]
    fn test_spoiler_barrier_wraps_future_beats() {
        let prior = vec![("Chapter 1".to_string(), "written text".to_string())];
        let messages = scene_messages(
            &ctx(&prior, vec!["the villain is her father", "final battle"]),
            SessionKind::Write,
            "",
            None,
            10_000,
        );
        let body = &messages[1].content;

        assert!(body.contains("NOT reveal"));
        assert!(body.contains("foreshadowing"));
        assert!(body.contains("the villain is her father"));
        // 屏障文本必须在未来节拍之前
        let barrier_pos = body.find("NOT reveal").unwrap();
        let beat_pos = body.find("the villain is her father").unwrap();
        assert!(barrier_pos < beat_pos);
    }

    #[test]
    fn test_recent_window_respects_budget() {
        let prior = vec![
            ("One".to_string(), "a".repeat(500)),
            ("Two".to_string(), "b".repeat(500)),
        ];
        let window = recent_window(&prior, 600);

        // 最近的一章完整保留，更早的一章只取结尾
        assert!(window.contains("## Two"));
        assert!(window.contains("## One (excerpt)"));
        let a_count = window.chars().filter(|c| *c == 'a').count();
        let b_count = window.chars().filter(|c| *c == 'b').count();
        assert_eq!(b_count, 500);
        assert_eq!(a_count, 100);
    }

    #[test]
    fn test_recent_window_orders_old_to_new() {
        let prior = vec![
            ("One".to_string(), "first".to_string()),
            ("Two".to_string(), "second".to_string()),
        ];
        let window = recent_window(&prior, 10_000);
        assert!(window.find("## One").unwrap() < window.find("## Two").unwrap());
    }

    #[test]
    fn test_unwritten_prior_chapters_skipped() {
        let prior = vec![
            ("One".to_string(), "   ".to_string()),
            ("Two".to_string(), "content".to_string()),
        ];
        let window = recent_window(&prior, 10_000);
        assert!(!window.contains("## One"));
    }

    #[test]
    fn test_revise_includes_existing_draft_and_instructions() {
        let prior: Vec<(String, String)> = Vec::new();
        let messages = scene_messages(
            &ctx(&prior, vec![]),
            SessionKind::Revise,
            "the old draft",
            Some("darker tone"),
            1_000,
        );
        let body = &messages[1].content;
        assert!(body.contains("the old draft"));
        assert!(body.contains("darker tone"));
    }
}
