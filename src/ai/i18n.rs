//! User-facing messages for the assistant and its executors.
//!
//! English plus Simplified and Traditional Chinese; any other language code
//! falls back to English.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-CN")]
    ZhHans,
    #[serde(rename = "zh-TW")]
    ZhHant,
}

impl Language {
    /// Map a BCP-47-ish code (`zh-TW`, `zh_hk`, `en-US`, ...) to a language.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_ascii_lowercase().replace('_', "-");
        match code.as_str() {
            "zh-tw" | "zh-hk" | "zh-mo" | "zh-hant" => Language::ZhHant,
            c if c.starts_with("zh") => Language::ZhHans,
            _ => Language::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::ZhHans => "zh-CN",
            Language::ZhHant => "zh-TW",
        }
    }
}

/// A message with its parameters; rendered per language by [`Msg::text`].
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    // Safe operations.
    SearchNoResults { keyword: String },
    SearchFound { count: usize, keyword: String },
    MissingKeyword,
    StatsDone,
    TagsEmpty,
    TagsFound { count: usize },
    NotesForArchiveEmpty { archive_id: i64 },
    NotesForArchive { archive_id: i64, count: usize },
    NotesSearchEmpty { query: String },
    NotesSearchFound { query: String, count: usize },
    NotesEmpty,
    NotesFound { count: usize },
    NoArchives,
    ReviewRandom { count: usize },
    ReviewSummary { period: String },
    InvalidReviewType { review_type: String },
    UnknownOperation { operation: String },
    ExecutionError { error: String },

    // Confirmed actions.
    MissingParameter { name: String },
    UnknownAction { action: String },
    ArchiveTrashed { archive_id: i64 },
    DeleteFailed { archive_id: i64 },
    TrashEmptied { count: usize },
    NoteCreated { note_id: i64 },
    TagAdded { archive_id: i64, tag: String },
    TagAlreadyPresent { archive_id: i64, tag: String },
    TagRemoved { archive_id: i64, tag: String },
    TagNotPresent { archive_id: i64, tag: String },
    FavoriteOn { archive_id: i64 },
    FavoriteOff { archive_id: i64 },
    ArchiveNotFound { archive_id: i64 },

    // Confirmation flow.
    ConfirmPrompt { description: String, confirmation_id: String },
    ActionCancelled,
    NoPendingAction,
    ForbiddenCommand { command: String },

    // Chat.
    ChatError,
    ChatGoodbye,
    ChatHelp,
    ArchivesHeader { count: usize },
    NotesHeader { count: usize },
    TagsHeader { count: usize },
    NotesLabel,

    // Telegram front end.
    StatsReport {
        archives: u64,
        tags: u64,
        recent_week: u64,
        storage: String,
        trash: u64,
        last_archive: Option<String>,
    },
    StatsFailed,
    NotOwner,
    TrashEmpty,
    TrashCount { count: u64 },
    ArchiveRestored { archive_id: i64 },
    RestoreFailed { archive_id: i64 },
    ArchivePurged { archive_id: i64 },
    PurgeFailed { archive_id: i64 },
}

impl Msg {
    pub fn text(&self, lang: Language) -> String {
        match lang {
            Language::En => self.en(),
            Language::ZhHans => self.zh_hans(),
            Language::ZhHant => self.zh_hant(),
        }
    }

    fn en(&self) -> String {
        use Msg::*;
        match self {
            SearchNoResults { keyword } => format!("No results found for \"{}\"", keyword),
            SearchFound { count, keyword } => format!("Found {} results for \"{}\"", count, keyword),
            MissingKeyword => "Please provide a search keyword".to_string(),
            StatsDone => "Statistics retrieved".to_string(),
            TagsEmpty => "No tags yet".to_string(),
            TagsFound { count } => format!("{} tags in total", count),
            NotesForArchiveEmpty { archive_id } => format!("Archive #{} has no notes", archive_id),
            NotesForArchive { archive_id, count } => {
                format!("Archive #{} has {} notes", archive_id, count)
            }
            NotesSearchEmpty { query } => format!("No notes matching \"{}\"", query),
            NotesSearchFound { query, count } => format!("Found {} notes matching \"{}\"", count, query),
            NotesEmpty => "No notes yet".to_string(),
            NotesFound { count } => format!("{} notes in total", count),
            NoArchives => "No archives to review".to_string(),
            ReviewRandom { count } => format!("Picked {} random archives", count),
            ReviewSummary { period } => format!("Activity summary ({})", period),
            InvalidReviewType { review_type } => format!("Unknown review type: {}", review_type),
            UnknownOperation { operation } => format!("Unknown operation: {}", operation),
            ExecutionError { error } => format!("Operation failed: {}", error),
            MissingParameter { name } => format!("Missing required parameter: {}", name),
            UnknownAction { action } => format!("Unknown action: {}", action),
            ArchiveTrashed { archive_id } => format!("Archive #{} moved to trash", archive_id),
            DeleteFailed { archive_id } => {
                format!("Could not delete archive #{} (missing or already in trash)", archive_id)
            }
            TrashEmptied { count } => format!("Trash emptied, {} archives removed", count),
            NoteCreated { note_id } => format!("Note #{} created", note_id),
            TagAdded { archive_id, tag } => format!("Tag #{} added to archive #{}", tag, archive_id),
            TagAlreadyPresent { archive_id, tag } => {
                format!("Archive #{} already has tag #{}", archive_id, tag)
            }
            TagRemoved { archive_id, tag } => {
                format!("Tag #{} removed from archive #{}", tag, archive_id)
            }
            TagNotPresent { archive_id, tag } => format!("Archive #{} has no tag #{}", archive_id, tag),
            FavoriteOn { archive_id } => format!("Archive #{} added to favorites", archive_id),
            FavoriteOff { archive_id } => format!("Archive #{} removed from favorites", archive_id),
            ArchiveNotFound { archive_id } => format!("Archive #{} not found", archive_id),
            ConfirmPrompt {
                description,
                confirmation_id,
            } => format!(
                "Confirm this action?\n{}\n\n/confirm {}\n/cancel {}",
                description, confirmation_id, confirmation_id
            ),
            ActionCancelled => "Action cancelled".to_string(),
            NoPendingAction => "No pending action (it may have expired)".to_string(),
            ForbiddenCommand { command } => format!(
                "\"{}\" changes data and needs confirmation; use request_action",
                command
            ),
            ChatError => "Sorry, something went wrong. Please try again later.".to_string(),
            ChatGoodbye => "Bye! Send me a message any time.".to_string(),
            ChatHelp => "I can search your archives, show statistics, tags and notes, \
                         or pick something to review. Just ask in plain words."
                .to_string(),
            ArchivesHeader { count } => format!("Found {} archives:", count),
            NotesHeader { count } => format!("Found {} notes:", count),
            TagsHeader { count } => format!("{} tags:", count),
            NotesLabel => "Notes".to_string(),
            StatsReport {
                archives,
                tags,
                recent_week,
                storage,
                trash,
                last_archive,
            } => format!(
                "📊 Archives: {}\n🏷 Tags: {}\n📅 This week: {}\n💾 Storage: {}\n🗑 In trash: {}\n🕒 Last archive: {}",
                archives,
                tags,
                recent_week,
                storage,
                trash,
                last_archive.as_deref().unwrap_or("N/A")
            ),
            StatsFailed => "Failed to read statistics".to_string(),
            NotOwner => "This is a private archive bot.".to_string(),
            TrashEmpty => "🗑 Trash is empty.".to_string(),
            TrashCount { count } => format!(
                "🗑 {} archives in trash. /restore <id> brings one back, /purge <id> deletes one, /emptytrash removes them all permanently.",
                count
            ),
            ArchiveRestored { archive_id } => format!("Archive #{} restored from trash", archive_id),
            RestoreFailed { archive_id } => format!("Archive #{} is not in the trash", archive_id),
            ArchivePurged { archive_id } => format!("Archive #{} deleted permanently", archive_id),
            PurgeFailed { archive_id } => {
                format!("Archive #{} is not in the trash; /delete it first", archive_id)
            }
        }
    }

    fn zh_hans(&self) -> String {
        use Msg::*;
        match self {
            SearchNoResults { keyword } => format!("未找到与「{}」相关的内容", keyword),
            SearchFound { count, keyword } => format!("找到 {} 条与「{}」相关的结果", count, keyword),
            MissingKeyword => "请提供搜索关键词".to_string(),
            StatsDone => "统计信息已获取".to_string(),
            TagsEmpty => "还没有标签".to_string(),
            TagsFound { count } => format!("共 {} 个标签", count),
            NotesForArchiveEmpty { archive_id } => format!("归档 #{} 没有笔记", archive_id),
            NotesForArchive { archive_id, count } => {
                format!("归档 #{} 有 {} 条笔记", archive_id, count)
            }
            NotesSearchEmpty { query } => format!("没有匹配「{}」的笔记", query),
            NotesSearchFound { query, count } => format!("找到 {} 条匹配「{}」的笔记", count, query),
            NotesEmpty => "还没有笔记".to_string(),
            NotesFound { count } => format!("共 {} 条笔记", count),
            NoArchives => "没有可回顾的归档".to_string(),
            ReviewRandom { count } => format!("随机选取了 {} 条归档", count),
            ReviewSummary { period } => format!("{} 活动总结", period),
            InvalidReviewType { review_type } => format!("未知的回顾类型：{}", review_type),
            UnknownOperation { operation } => format!("未知操作：{}", operation),
            ExecutionError { error } => format!("操作失败：{}", error),
            MissingParameter { name } => format!("缺少必要参数：{}", name),
            UnknownAction { action } => format!("未知动作：{}", action),
            ArchiveTrashed { archive_id } => format!("归档 #{} 已移至回收站", archive_id),
            DeleteFailed { archive_id } => format!("无法删除归档 #{}（不存在或已在回收站）", archive_id),
            TrashEmptied { count } => format!("回收站已清空，删除了 {} 条归档", count),
            NoteCreated { note_id } => format!("笔记 #{} 已创建", note_id),
            TagAdded { archive_id, tag } => format!("已为归档 #{} 添加标签 #{}", archive_id, tag),
            TagAlreadyPresent { archive_id, tag } => {
                format!("归档 #{} 已有标签 #{}", archive_id, tag)
            }
            TagRemoved { archive_id, tag } => format!("已从归档 #{} 移除标签 #{}", archive_id, tag),
            TagNotPresent { archive_id, tag } => format!("归档 #{} 没有标签 #{}", archive_id, tag),
            FavoriteOn { archive_id } => format!("归档 #{} 已加入收藏", archive_id),
            FavoriteOff { archive_id } => format!("归档 #{} 已取消收藏", archive_id),
            ArchiveNotFound { archive_id } => format!("未找到归档 #{}", archive_id),
            ConfirmPrompt {
                description,
                confirmation_id,
            } => format!(
                "确认执行此操作吗？\n{}\n\n/confirm {}\n/cancel {}",
                description, confirmation_id, confirmation_id
            ),
            ActionCancelled => "操作已取消".to_string(),
            NoPendingAction => "没有待确认的操作（可能已过期）".to_string(),
            ForbiddenCommand { command } => {
                format!("「{}」会修改数据，需要确认，请使用 request_action", command)
            }
            ChatError => "抱歉，出了点问题，请稍后再试。".to_string(),
            ChatGoodbye => "再见！随时给我发消息。".to_string(),
            ChatHelp => "我可以搜索你的归档、查看统计、标签和笔记，或者挑些内容给你回顾。直接用自然语言问我就行。"
                .to_string(),
            ArchivesHeader { count } => format!("找到 {} 条归档：", count),
            NotesHeader { count } => format!("找到 {} 条笔记：", count),
            TagsHeader { count } => format!("共 {} 个标签：", count),
            NotesLabel => "笔记".to_string(),
            StatsReport {
                archives,
                tags,
                recent_week,
                storage,
                trash,
                last_archive,
            } => format!(
                "📊 归档：{}\n🏷 标签：{}\n📅 本周：{}\n💾 存储：{}\n🗑 回收站：{}\n🕒 最近归档：{}",
                archives,
                tags,
                recent_week,
                storage,
                trash,
                last_archive.as_deref().unwrap_or("无")
            ),
            StatsFailed => "读取统计信息失败".to_string(),
            NotOwner => "这是一个私人归档机器人。".to_string(),
            TrashEmpty => "🗑 回收站是空的。".to_string(),
            TrashCount { count } => format!(
                "🗑 回收站中有 {} 条归档。/restore <id> 恢复，/purge <id> 彻底删除，/emptytrash 全部清空。",
                count
            ),
            ArchiveRestored { archive_id } => format!("归档 #{} 已从回收站恢复", archive_id),
            RestoreFailed { archive_id } => format!("归档 #{} 不在回收站中", archive_id),
            ArchivePurged { archive_id } => format!("归档 #{} 已彻底删除", archive_id),
            PurgeFailed { archive_id } => {
                format!("归档 #{} 不在回收站中，请先 /delete", archive_id)
            }
        }
    }

    fn zh_hant(&self) -> String {
        use Msg::*;
        match self {
            SearchNoResults { keyword } => format!("找不到與「{}」相關的內容", keyword),
            SearchFound { count, keyword } => format!("找到 {} 筆與「{}」相關的結果", count, keyword),
            MissingKeyword => "請提供搜尋關鍵字".to_string(),
            StatsDone => "統計資訊已取得".to_string(),
            TagsEmpty => "還沒有標籤".to_string(),
            TagsFound { count } => format!("共 {} 個標籤", count),
            NotesForArchiveEmpty { archive_id } => format!("歸檔 #{} 沒有筆記", archive_id),
            NotesForArchive { archive_id, count } => {
                format!("歸檔 #{} 有 {} 則筆記", archive_id, count)
            }
            NotesSearchEmpty { query } => format!("沒有符合「{}」的筆記", query),
            NotesSearchFound { query, count } => format!("找到 {} 則符合「{}」的筆記", count, query),
            NotesEmpty => "還沒有筆記".to_string(),
            NotesFound { count } => format!("共 {} 則筆記", count),
            NoArchives => "沒有可回顧的歸檔".to_string(),
            ReviewRandom { count } => format!("隨機選取了 {} 筆歸檔", count),
            ReviewSummary { period } => format!("{} 活動總結", period),
            InvalidReviewType { review_type } => format!("未知的回顧類型：{}", review_type),
            UnknownOperation { operation } => format!("未知操作：{}", operation),
            ExecutionError { error } => format!("操作失敗：{}", error),
            MissingParameter { name } => format!("缺少必要參數：{}", name),
            UnknownAction { action } => format!("未知動作：{}", action),
            ArchiveTrashed { archive_id } => format!("歸檔 #{} 已移至資源回收筒", archive_id),
            DeleteFailed { archive_id } => {
                format!("無法刪除歸檔 #{}（不存在或已在資源回收筒）", archive_id)
            }
            TrashEmptied { count } => format!("資源回收筒已清空，刪除了 {} 筆歸檔", count),
            NoteCreated { note_id } => format!("筆記 #{} 已建立", note_id),
            TagAdded { archive_id, tag } => format!("已為歸檔 #{} 新增標籤 #{}", archive_id, tag),
            TagAlreadyPresent { archive_id, tag } => {
                format!("歸檔 #{} 已有標籤 #{}", archive_id, tag)
            }
            TagRemoved { archive_id, tag } => format!("已從歸檔 #{} 移除標籤 #{}", archive_id, tag),
            TagNotPresent { archive_id, tag } => format!("歸檔 #{} 沒有標籤 #{}", archive_id, tag),
            FavoriteOn { archive_id } => format!("歸檔 #{} 已加入收藏", archive_id),
            FavoriteOff { archive_id } => format!("歸檔 #{} 已取消收藏", archive_id),
            ArchiveNotFound { archive_id } => format!("找不到歸檔 #{}", archive_id),
            ConfirmPrompt {
                description,
                confirmation_id,
            } => format!(
                "確認執行此操作嗎？\n{}\n\n/confirm {}\n/cancel {}",
                description, confirmation_id, confirmation_id
            ),
            ActionCancelled => "操作已取消".to_string(),
            NoPendingAction => "沒有待確認的操作（可能已過期）".to_string(),
            ForbiddenCommand { command } => {
                format!("「{}」會修改資料，需要確認，請使用 request_action", command)
            }
            ChatError => "抱歉，發生了一點問題，請稍後再試。".to_string(),
            ChatGoodbye => "再見！隨時傳訊息給我。".to_string(),
            ChatHelp => "我可以搜尋你的歸檔、查看統計、標籤和筆記，或挑些內容給你回顧。直接用自然語言問我就好。"
                .to_string(),
            ArchivesHeader { count } => format!("找到 {} 筆歸檔：", count),
            NotesHeader { count } => format!("找到 {} 則筆記：", count),
            TagsHeader { count } => format!("共 {} 個標籤：", count),
            NotesLabel => "筆記".to_string(),
            StatsReport {
                archives,
                tags,
                recent_week,
                storage,
                trash,
                last_archive,
            } => format!(
                "📊 歸檔：{}\n🏷 標籤：{}\n📅 本週：{}\n💾 儲存：{}\n🗑 資源回收筒：{}\n🕒 最近歸檔：{}",
                archives,
                tags,
                recent_week,
                storage,
                trash,
                last_archive.as_deref().unwrap_or("無")
            ),
            StatsFailed => "讀取統計資訊失敗".to_string(),
            NotOwner => "這是一個私人歸檔機器人。".to_string(),
            TrashEmpty => "🗑 資源回收筒是空的。".to_string(),
            TrashCount { count } => format!(
                "🗑 資源回收筒中有 {} 筆歸檔。/restore <id> 還原，/purge <id> 永久刪除，/emptytrash 全部清空。",
                count
            ),
            ArchiveRestored { archive_id } => format!("歸檔 #{} 已從資源回收筒還原", archive_id),
            RestoreFailed { archive_id } => format!("歸檔 #{} 不在資源回收筒中", archive_id),
            ArchivePurged { archive_id } => format!("歸檔 #{} 已永久刪除", archive_id),
            PurgeFailed { archive_id } => {
                format!("歸檔 #{} 不在資源回收筒中，請先 /delete", archive_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("zh-TW"), Language::ZhHant);
        assert_eq!(Language::from_code("zh_hk"), Language::ZhHant);
        assert_eq!(Language::from_code("zh-CN"), Language::ZhHans);
        assert_eq!(Language::from_code("zh"), Language::ZhHans);
        assert_eq!(Language::from_code("ja"), Language::En);
        assert_eq!(Language::from_code("en-US"), Language::En);
    }

    #[test]
    fn test_front_end_messages_follow_language() {
        assert_eq!(Msg::NotOwner.text(Language::En), "This is a private archive bot.");
        assert_eq!(Msg::NotOwner.text(Language::ZhHans), "这是一个私人归档机器人。");
        assert_eq!(Msg::NotOwner.text(Language::ZhHant), "這是一個私人歸檔機器人。");

        let report = Msg::StatsReport {
            archives: 3,
            tags: 2,
            recent_week: 1,
            storage: "1.0 KB".to_string(),
            trash: 0,
            last_archive: None,
        };
        assert!(report.text(Language::En).ends_with("Last archive: N/A"));
        assert!(report.text(Language::ZhHans).starts_with("📊 归档：3"));
    }

    #[test]
    fn test_messages_carry_ids() {
        let msg = Msg::ArchiveTrashed { archive_id: 42 };
        assert_eq!(msg.text(Language::En), "Archive #42 moved to trash");
        assert!(msg.text(Language::ZhHans).contains("#42"));
        assert!(msg.text(Language::ZhHant).contains("#42"));
    }
}
