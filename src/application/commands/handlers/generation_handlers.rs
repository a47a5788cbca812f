//! Generation Handlers - 流式生成会话
//!
//! StartGenerationHandler 立即签发 token 并返回，实际的流驱动在
//! detached task 中进行。正确性依赖 token 比较:
//! 每个恢复点（每个增量、完成、揭示节拍）先判定 token 是否仍为当前会话，
//! 被取代的会话静默丢弃输出，永不触碰章节状态。
//!
//! 终局缓冲只在会话走到自然结束且 token 仍有效时持久化一次。

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use uuid::Uuid;

use crate::application::autosave::AutosaveService;
use crate::application::commands::{
    CancelGenerationCommand, CancelGenerationResponse, StartGenerationCommand,
    StartGenerationResponse,
};
use crate::application::error::ApplicationError;
use crate::application::pacing::RevealPacer;
use crate::application::ports::{
    ChapterState, DeltaStream, GenerationError, GenerationRequest, SessionKind,
    SessionManagerPort, SessionToken, StoryRecord, StoryRepositoryPort, TextGeneratorPort,
};
use crate::application::prompt::{scene_messages, SceneContext};
use crate::infrastructure::events::EventPublisher;

/// 揭示空转轮询间隔: 流已结束但墙钟尚未追上时的等待粒度
const REVEAL_DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// 生成会话参数
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    /// 章节完成判定的词数阈值
    pub word_threshold: usize,
    /// 回看窗口的字符预算
    pub context_char_budget: usize,
    /// 逐词揭示速率（<=0 表示不节流）
    pub reveal_words_per_sec: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.9,
            word_threshold: 400,
            context_char_budget: 24_000,
            reveal_words_per_sec: 40.0,
        }
    }
}

/// 开始生成会话处理器
#[derive(Clone)]
pub struct StartGenerationHandler {
    session_manager: Arc<dyn SessionManagerPort>,
    story_repo: Arc<dyn StoryRepositoryPort>,
    generator: Arc<dyn TextGeneratorPort>,
    autosave: Arc<AutosaveService>,
    publisher: Arc<EventPublisher>,
    settings: GenerationSettings,
}

impl StartGenerationHandler {
    pub fn new(
        session_manager: Arc<dyn SessionManagerPort>,
        story_repo: Arc<dyn StoryRepositoryPort>,
        generator: Arc<dyn TextGeneratorPort>,
        autosave: Arc<AutosaveService>,
        publisher: Arc<EventPublisher>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            session_manager,
            story_repo,
            generator,
            autosave,
            publisher,
            settings,
        }
    }

    /// 开始生成会话
    ///
    /// 校验通过后签发 token、spawn 驱动任务并立即返回；
    /// 同一编辑面上的旧会话被隐式取代。
    pub async fn handle(
        &self,
        command: StartGenerationCommand,
    ) -> Result<StartGenerationResponse, ApplicationError> {
        let record = self
            .story_repo
            .find_by_id(command.story_id)
            .await?
            .ok_or(ApplicationError::not_found("Story", command.story_id))?;

        if command.chapter_index >= record.chapters.len() {
            return Err(ApplicationError::validation(format!(
                "章节索引越界: {} / {}",
                command.chapter_index,
                record.chapters.len()
            )));
        }

        let token = self.session_manager.begin(
            &command.surface,
            command.kind,
            command.story_id,
            command.chapter_index,
        );

        tracing::info!(
            token = %token,
            kind = command.kind.as_str(),
            story_id = %command.story_id,
            chapter_index = command.chapter_index,
            "Generation session started"
        );

        let handler = self.clone();
        let response = StartGenerationResponse {
            token: token.clone(),
            story_id: command.story_id,
            chapter_index: command.chapter_index,
        };

        tokio::spawn(async move {
            handler.run_session(token, command, record).await;
        });

        Ok(response)
    }

    /// 驱动一个完整的生成会话（detached task 主体）
    async fn run_session(
        &self,
        token: SessionToken,
        command: StartGenerationCommand,
        record: StoryRecord,
    ) {
        let chapter_index = command.chapter_index;
        let existing = record.chapters[chapter_index].content.clone();

        let request = self.build_request(&command, &record, &existing);
        let stream = match self.generator.stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                self.fail_session(&token, command.kind, command.story_id, chapter_index, &e);
                return;
            }
        };

        let publisher = self.publisher.clone();
        let story_id = command.story_id;
        let on_delta = |delta: &str| {
            publisher.publish_progress(
                &token.surface,
                token.epoch,
                story_id,
                chapter_index,
                delta,
            );
        };

        let outcome = drive_stream(
            stream,
            &token,
            self.session_manager.as_ref(),
            self.settings.reveal_words_per_sec,
            on_delta,
        )
        .await;

        match outcome {
            Ok(Some(buffer)) => {
                self.complete_session(&token, story_id, chapter_index, record, buffer);
            }
            Ok(None) => {
                // 被取代: 输出已在恢复点丢弃，不触碰任何状态
                tracing::debug!(token = %token, "Superseded session discarded");
            }
            Err(e) => {
                self.fail_session(&token, command.kind, story_id, chapter_index, &e);
            }
        }
    }

    fn build_request(
        &self,
        command: &StartGenerationCommand,
        record: &StoryRecord,
        existing: &str,
    ) -> GenerationRequest {
        let prior: Vec<(String, String)> = record.chapters[..command.chapter_index]
            .iter()
            .map(|c| (c.title.clone(), c.content.clone()))
            .collect();

        // 未来节拍 = 当前章之后尚未写作的章节的节拍
        let future_beats: Vec<&str> = record.chapters[command.chapter_index + 1..]
            .iter()
            .filter(|c| c.content.trim().is_empty())
            .map(|c| c.beat.as_str())
            .collect();

        let ctx = SceneContext {
            premise: &record.premise,
            characters: &record.characters,
            prior_chapters: &prior,
            future_beats,
            beat: &record.chapters[command.chapter_index].beat,
            chapter_number: command.chapter_index + 1,
            total_chapters: record.chapters.len(),
        };

        let messages = scene_messages(
            &ctx,
            command.kind,
            existing,
            command.instructions.as_deref(),
            self.settings.context_char_budget,
        );

        GenerationRequest::new(&self.settings.model, messages)
            .with_temperature(self.settings.temperature)
    }

    /// 会话自然结束: 持久化终局缓冲（恰好一次）并通知
    fn complete_session(
        &self,
        token: &SessionToken,
        story_id: Uuid,
        chapter_index: usize,
        record: StoryRecord,
        buffer: String,
    ) {
        // 完成判定走 Chapter 实体，阈值语义只在领域层一处
        let mut chapters: Vec<ChapterState> = record.chapters;
        let mut chapter = chapters[chapter_index].clone().into_chapter();
        chapter.set_content(buffer, self.settings.word_threshold);
        let word_count = chapter.word_count();
        let completed = chapter.completed();
        chapters[chapter_index] = ChapterState::from(&chapter);

        self.autosave.record_edit(story_id, chapters);
        self.publisher.publish_generation_completed(
            &token.surface,
            token.epoch,
            story_id,
            chapter_index,
            word_count,
            completed,
        );
        self.session_manager.finish(token);

        tracing::info!(
            token = %token,
            story_id = %story_id,
            chapter_index,
            word_count,
            "Generation session completed"
        );
    }

    /// 流建立或消费失败（token 仍有效时）
    ///
    /// 章节内容从未被部分写入，失败只需通知编辑面；
    /// restored 告知修订类会话的 UI 回退到会话前文本。
    fn fail_session(
        &self,
        token: &SessionToken,
        kind: SessionKind,
        story_id: Uuid,
        chapter_index: usize,
        error: &GenerationError,
    ) {
        if !self.session_manager.is_current(token) {
            tracing::debug!(token = %token, "Superseded session failure ignored");
            return;
        }

        let restored = kind.restores_on_failure();
        self.publisher.publish_generation_failed(
            &token.surface,
            token.epoch,
            story_id,
            chapter_index,
            &error.to_string(),
            restored,
        );
        self.session_manager.finish(token);

        tracing::warn!(
            token = %token,
            story_id = %story_id,
            chapter_index,
            error = %error,
            restored,
            "Generation session failed"
        );
    }
}

/// 取消生成处理器
///
/// 协作式取消: 仅递增 epoch 使现有 token 失效，编辑面立即脱离；
/// 底层请求留给驱动任务在下一个恢复点自行退出。
pub struct CancelGenerationHandler {
    session_manager: Arc<dyn SessionManagerPort>,
}

impl CancelGenerationHandler {
    pub fn new(session_manager: Arc<dyn SessionManagerPort>) -> Self {
        Self { session_manager }
    }

    pub fn handle(&self, command: CancelGenerationCommand) -> CancelGenerationResponse {
        let cancelled = self.session_manager.cancel(&command.surface);
        if cancelled {
            tracing::info!(surface = %command.surface, "Generation session cancelled");
        }
        CancelGenerationResponse { cancelled }
    }
}

/// 消费增量流并按墙钟节奏揭示
///
/// 返回值:
/// - `Ok(Some(buffer))` 流自然结束且 token 全程有效，buffer 为终局文本
/// - `Ok(None)` 会话在某个恢复点被判定为已取代，输出丢弃
/// - `Err(e)` 流在 token 仍有效时出错
///
/// `on_delta` 收到的是缓冲的连续切片，拼接后恒等于缓冲前缀。
async fn drive_stream(
    mut stream: DeltaStream,
    token: &SessionToken,
    sessions: &dyn SessionManagerPort,
    words_per_sec: f64,
    mut on_delta: impl FnMut(&str),
) -> Result<Option<String>, GenerationError> {
    let mut buffer = String::new();
    let mut pacer = RevealPacer::new(words_per_sec);
    let mut sent_bytes = 0usize;

    while let Some(item) = stream.next().await {
        // 恢复点: 每个增量前判定 token
        if !sessions.is_current(token) {
            return Ok(None);
        }

        let delta = item?;
        buffer.push_str(&delta);
        reveal_due(&buffer, &mut pacer, &mut sent_bytes, &mut on_delta);
    }

    // 流已结束但揭示节奏可能落后于缓冲，按墙钟补齐
    while sent_bytes < buffer.len() {
        if !sessions.is_current(token) {
            return Ok(None);
        }
        reveal_due(&buffer, &mut pacer, &mut sent_bytes, &mut on_delta);
        if sent_bytes < buffer.len() {
            tokio::time::sleep(REVEAL_DRAIN_INTERVAL).await;
        }
    }

    if !sessions.is_current(token) {
        return Ok(None);
    }
    Ok(Some(buffer))
}

/// 把墙钟已到期的词揭示出去
fn reveal_due(
    buffer: &str,
    pacer: &mut RevealPacer,
    sent_bytes: &mut usize,
    on_delta: &mut impl FnMut(&str),
) {
    let total_words = buffer.split_whitespace().count();
    let newly = pacer.take_newly_due(total_words);
    if newly == 0 && pacer.revealed() < total_words {
        return;
    }

    // 全部词已到期时连同结尾空白一起揭示
    let target = if pacer.revealed() >= total_words {
        buffer.len()
    } else {
        word_end_offset(buffer, pacer.revealed())
    };
    if target > *sent_bytes {
        on_delta(&buffer[*sent_bytes..target]);
        *sent_bytes = target;
    }
}

/// 第 n 个词结束处的字节偏移（n 超过词数时返回文本长度）
fn word_end_offset(text: &str, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut count = 0usize;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                count += 1;
                if count == n {
                    return i;
                }
                in_word = false;
            }
        } else {
            in_word = true;
        }
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ActiveSession;
    use futures_util::stream;
    use std::sync::Mutex;

    /// 单编辑面的内存会话管理（测试用）
    #[derive(Default)]
    struct SingleSurfaceSessions {
        epoch: Mutex<u64>,
    }

    impl SingleSurfaceSessions {
        fn bump(&self) {
            *self.epoch.lock().unwrap() += 1;
        }
    }

    impl SessionManagerPort for SingleSurfaceSessions {
        fn begin(
            &self,
            surface: &str,
            _kind: SessionKind,
            _story_id: Uuid,
            _chapter_index: usize,
        ) -> SessionToken {
            let mut epoch = self.epoch.lock().unwrap();
            *epoch += 1;
            SessionToken {
                surface: surface.to_string(),
                epoch: *epoch,
            }
        }

        fn is_current(&self, token: &SessionToken) -> bool {
            *self.epoch.lock().unwrap() == token.epoch
        }

        fn current(&self, _surface: &str) -> Option<ActiveSession> {
            None
        }

        fn cancel(&self, _surface: &str) -> bool {
            self.bump();
            true
        }

        fn finish(&self, _token: &SessionToken) {}
    }

    fn chunk_stream(chunks: Vec<Result<String, GenerationError>>) -> DeltaStream {
        Box::pin(stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_stream_accumulates_in_arrival_order() {
        let sessions = SingleSurfaceSessions::default();
        let token = sessions.begin("editor", SessionKind::Write, Uuid::new_v4(), 0);

        let stream = chunk_stream(vec![
            Ok("Once".to_string()),
            Ok(" upon".to_string()),
            Ok(" a time".to_string()),
        ]);

        let deltas = Mutex::new(String::new());
        let result = drive_stream(stream, &token, &sessions, 0.0, |d| {
            deltas.lock().unwrap().push_str(d);
        })
        .await
        .unwrap();

        assert_eq!(result.as_deref(), Some("Once upon a time"));
        // 揭示切片拼接恒等于终局缓冲
        assert_eq!(deltas.lock().unwrap().as_str(), "Once upon a time");
    }

    #[tokio::test]
    async fn test_superseded_session_discards_silently() {
        let sessions = Arc::new(SingleSurfaceSessions::default());
        let token = sessions.begin("editor", SessionKind::Write, Uuid::new_v4(), 0);

        // 第一个增量后另一个会话开始
        let bump = sessions.clone();
        let stream: DeltaStream = Box::pin(async_stream::stream! {
            yield Ok("Once".to_string());
            bump.bump();
            yield Ok(" upon a time".to_string());
        });

        let deltas = Mutex::new(String::new());
        let result = drive_stream(stream, &token, sessions.as_ref(), 0.0, |d| {
            deltas.lock().unwrap().push_str(d);
        })
        .await
        .unwrap();

        // 被取代: 无终局缓冲，后续增量不再外泄
        assert_eq!(result, None);
        assert_eq!(deltas.lock().unwrap().as_str(), "Once");
    }

    #[tokio::test]
    async fn test_stream_error_surfaces_while_current() {
        let sessions = SingleSurfaceSessions::default();
        let token = sessions.begin("editor", SessionKind::Write, Uuid::new_v4(), 0);

        let stream = chunk_stream(vec![
            Ok("partial".to_string()),
            Err(GenerationError::Stream("connection reset".to_string())),
        ]);

        let result = drive_stream(stream, &token, &sessions, 0.0, |_| {}).await;
        assert!(matches!(result, Err(GenerationError::Stream(_))));
    }

    #[tokio::test]
    async fn test_cancelled_mid_drain_stops_revealing() {
        let sessions = Arc::new(SingleSurfaceSessions::default());
        let token = sessions.begin("editor", SessionKind::Write, Uuid::new_v4(), 0);

        let stream = chunk_stream(vec![Ok("one two three four five six".to_string())]);

        // 极慢的揭示速率，流结束后仍在 drain
        let sessions_bg = sessions.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            sessions_bg.cancel("editor");
        });

        let result = drive_stream(stream, &token, sessions.as_ref(), 1.0, |_| {})
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_word_end_offset() {
        let text = "one two  three";
        assert_eq!(word_end_offset(text, 0), 0);
        assert_eq!(word_end_offset(text, 1), 3);
        assert_eq!(word_end_offset(text, 2), 7);
        // 超过词数 => 全文
        assert_eq!(word_end_offset(text, 3), text.len());
        assert_eq!(word_end_offset(text, 9), text.len());
    }

    #[test]
    fn test_word_end_offset_multibyte() {
        let text = "héllo wörld";
        let first = word_end_offset(text, 1);
        assert_eq!(&text[..first], "héllo");
    }
}
