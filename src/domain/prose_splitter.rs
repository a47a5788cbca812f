//! 正文分段器
//!
//! 为分块重写提供对白/叙述分段，保证无损重组:
//! `join_sections(split_into_sections(x)) == x` 严格成立。
//!
//! 分段策略:
//! 1. 以包含换行的空白串作为段落边界，边界本身保留为独立片段
//! 2. 非空白片段按首个非空白字符分类: 引号开头为对白，其余为叙述
//!
//! 只有叙述片段会被送去重写，对白与空白原样透传。

/// 片段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// 对白（引号开头，不参与重写）
    Dialogue,
    /// 叙述（重写目标）
    Narrative,
    /// 空白分隔（段落边界，原样保留）
    Whitespace,
}

/// 正文片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub text: String,
}

impl Section {
    fn new(kind: SectionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// 引号判定（中西文引号均视为对白开头）
fn is_quote_char(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}' | '「' | '『' | '«'
    )
}

/// 判定一个空白串是否构成段落边界（必须含换行）
fn is_paragraph_break(run: &str) -> bool {
    run.contains('\n')
}

/// 对内容片段分类
fn classify(text: &str) -> SectionKind {
    match text.trim_start().chars().next() {
        Some(ch) if is_quote_char(ch) => SectionKind::Dialogue,
        Some(_) => SectionKind::Narrative,
        // 纯空白但不含换行（如行内多个空格单独成段的极端情形）
        None => SectionKind::Whitespace,
    }
}

/// 将正文分为对白/叙述/空白片段
///
/// 扫描所有极大空白串；含换行的空白串作为边界单独成段，
/// 不含换行的空白保留在所属内容片段内。
pub fn split_into_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut content_start = 0usize;
    let mut run_start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if run_start.is_none() {
                run_start = Some(i);
            }
            continue;
        }

        if let Some(start) = run_start.take() {
            let run = &text[start..i];
            if is_paragraph_break(run) {
                if start > content_start {
                    let chunk = &text[content_start..start];
                    sections.push(Section::new(classify(chunk), chunk));
                }
                sections.push(Section::new(SectionKind::Whitespace, run));
                content_start = i;
            }
            // 不含换行的空白串并入当前内容片段
        }
    }

    // 收尾: 末尾可能是内容、空白或两者都有
    match run_start {
        Some(start) if is_paragraph_break(&text[start..]) => {
            if start > content_start {
                let chunk = &text[content_start..start];
                sections.push(Section::new(classify(chunk), chunk));
            }
            sections.push(Section::new(SectionKind::Whitespace, &text[start..]));
        }
        _ => {
            if content_start < text.len() {
                let chunk = &text[content_start..];
                sections.push(Section::new(classify(chunk), chunk));
            }
        }
    }

    sections
}

/// 按原顺序拼接片段（分隔符本身就是片段，直接连接即可）
pub fn join_sections(sections: &[Section]) -> String {
    sections.iter().map(|s| s.text.as_str()).collect()
}
