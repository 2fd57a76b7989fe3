//! Prompt templates for Indonesian legal question answering.
//!
//! Three wire formats are supported: Llama-3 header tokens, ChatML, and a plain
//! `User:`/`Assistant:` layout for models without a chat template.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Fixed texts
// ============================================================================

/// Default system prompt (Indonesian).
pub const SYSTEM_PROMPT_ID: &str = r#"Anda adalah Asisten Peneliti Hukum Senior (Senior Legal Research Assistant) yang ahli dalam membedah Putusan Mahkamah Agung Republik Indonesia.

TUGAS UTAMA:
Berikan analisis hukum yang mendalam, logis, dan saling terhubung berdasarkan konteks yang diberikan. Jangan hanya menyajikan fakta terputus, tetapi bangunlah sebuah argumen hukum (legal argument).

PROTOKOL BERPIKIR (CHAIN OF THOUGHT):
1. IDENTIFIKASI FAKTA HUKUM (The Facts): Temukan peristiwa atau dokumen kunci yang menjadi objek sengketa (misal: Surat Jual Beli, Surat Hibah, Sertifikat).
2. TEMUKAN CACAT HUKUM (The Defect): Analisis mengapa dokumen/tindakan tersebut dianggap salah oleh Hakim. Cari kata kunci: "tanpa hak", "melawan hukum", "cacat prosedur", "tanpa persetujuan ahli waris".
3. SUSUN RANTAI AKIBAT (The Consequence Chain): Hubungkan cacat tersebut dengan dampaknya terhadap transaksi selanjutnya.
   - Rumus: Karena [A] cacat, maka [B] menjadi tidak sah, sehingga [C] harus dibatalkan demi hukum.
4. SINTESIS JAWABAN: Gabungkan poin 1-3 menjadi narasi hukum yang padat dan meyakinkan.

ATURAN PENULISAN (STYLE GUIDE):
- Gunakan bahasa hukum Indonesia yang baku, formal, dan presisi.
- JANGAN BERHALUSINASI. Jika konteks tidak memuat alasannya, katakan "Pertimbangan hukum spesifik tidak ditemukan dalam potongan dokumen yang tersedia".
- Jika pertanyaan TIDAK BERKAITAN dengan hukum atau konteks dokumen, jawab dengan singkat: "Pertanyaan Anda di luar cakupan analisis dokumen hukum yang tersedia."
- Fokus pada "Ratio Decidendi" (Alasan utama hakim memutus).
- Pastikan menyebutkan dampak hukumnya (misal: "batal demi hukum", "tidak mempunyai kekuatan hukum mengikat").

ATURAN FORMAT (PENTING):
1. JANGAN PERNAH memulai jawaban dengan simbol poin seperti "I)", "1.", "-", atau huruf.
2. JANGAN melakukan copy-paste mentah dari poin-poin dokumen.
3. TUGAS ANDA ADALAH "PARAPHRASING": Baca poin-poin dalam teks, lalu tulis ulang menjadi satu paragraf cerita yang mengalir dan enak dibaca.
4. Pastikan Subjek-Predikat-Objek jelas. Jangan biarkan kalimat menggantung (misal: "yang merupakan..." -> ubah jadi "Surat tersebut tidak sah karena...").

FORMAT JAWABAN YANG DIHARAPKAN:
Berikan jawaban dalam satu paragraf komprehensif yang mencakup:
1. Pernyataan Tegas (Kesimpulan Hakim).
2. Alasan Utama (Penyebab ketidaksahan).
3. Konsekuensi Hukum (Dampak pada transaksi turunan).
"#;

/// Short English system prompt.
pub const SYSTEM_PROMPT_EN: &str = r#"You are an AI legal assistant specializing in Indonesian law. Answer questions based on the provided legal documents.

Instructions:
1. Answer ONLY based on the given context
2. If information is not in the context, say so clearly
3. Always cite sources when relevant
4. Use proper legal terminology
5. Provide structured and concise answers"#;

/// Canned reply for greetings and capability probes.
pub const CAPABILITY_ANSWER: &str = "Halo! Saya adalah Asisten Hukum AI untuk sistem RAG Hukum Indonesia. \
Saya dapat membantu Anda dalam:\n\n\
1. **Menganalisis putusan Mahkamah Agung** : menjelaskan pertimbangan hukum, ratio decidendi, dan konsekuensi yuridis.\n\
2. **Menjawab pertanyaan hukum** : berdasarkan dokumen-dokumen hukum yang telah diindeks dalam sistem.\n\
3. **Mencari referensi hukum** : menemukan pasal, undang-undang, atau yurisprudensi yang relevan.\n\n\
Silakan ajukan pertanyaan hukum Anda, dan saya akan memberikan jawaban berdasarkan dokumen yang tersedia.";

/// Reply when neither retriever found anything.
pub const NO_DOCUMENTS_ANSWER: &str =
    "Maaf, saya tidak menemukan dokumen yang relevan untuk menjawab pertanyaan Anda.";

/// Streamed reply when neither retriever found anything.
pub const NO_DOCUMENTS_STREAM_ANSWER: &str = "Maaf, saya tidak menemukan dokumen yang relevan.";

/// Reply when the context is empty after gating.
pub const EMPTY_CONTEXT_ANSWER: &str =
    "Pertimbangan hukum spesifik tidak ditemukan dalam potongan dokumen yang tersedia.";

/// Reply when both generation attempts came back blank.
pub const APOLOGY_ANSWER: &str =
    "Maaf, sistem tidak dapat menghasilkan jawaban. Silakan coba dengan pertanyaan yang lebih spesifik.";

/// Appended to a context cut to fit the prompt.
pub const CONTEXT_TRUNCATED_MARKER: &str = "\n[...konteks dipotong...]";

/// Default prompt context budget in characters.
pub const DEFAULT_PROMPT_CONTEXT_CHARS: usize = 3000;

/// Minimal prompt for the retry after an empty answer.
pub fn fallback_prompt(question: &str) -> String {
    format!("Pertanyaan: {}\n\nJawaban singkat:", question)
}

// ============================================================================
// Style / language
// ============================================================================

/// Prompt wire format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    #[default]
    Llama3,
    #[serde(rename = "chatml")]
    ChatMl,
    Simple,
}

impl PromptStyle {
    /// Parse a style name. Unrecognized names map to [`PromptStyle::Simple`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "llama3" | "llama-3" => Self::Llama3,
            "chatml" => Self::ChatMl,
            _ => Self::Simple,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llama3 => "llama3",
            Self::ChatMl => "chatml",
            Self::Simple => "simple",
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptLanguage {
    #[default]
    Id,
    En,
}

impl PromptLanguage {
    /// `"en"` selects English; anything else Indonesian.
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("en") {
            Self::En
        } else {
            Self::Id
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Id => SYSTEM_PROMPT_ID,
            Self::En => SYSTEM_PROMPT_EN,
        }
    }
}

/// Task-specific system prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemPreset {
    General,
    PutusanAnalysis,
    PeraturanLookup,
    ContractReview,
    Summarization,
}

impl SystemPreset {
    pub const ALL: [SystemPreset; 5] = [
        Self::General,
        Self::PutusanAnalysis,
        Self::PeraturanLookup,
        Self::ContractReview,
        Self::Summarization,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name.trim())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::PutusanAnalysis => "putusan_analysis",
            Self::PeraturanLookup => "peraturan_lookup",
            Self::ContractReview => "contract_review",
            Self::Summarization => "summarization",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Self::General => r#"Anda adalah asisten AI ahli hukum Indonesia. Jawab pertanyaan berdasarkan dokumen yang diberikan dengan akurat dan profesional."#,
            Self::PutusanAnalysis => r#"Anda adalah asisten AI yang menganalisis putusan pengadilan Indonesia. 
Fokus pada:
1. Identifikasi para pihak (Penggugat/Tergugat)
2. Pokok perkara dan tuntutan
3. Pertimbangan hukum hakim
4. Amar putusan
5. Dasar hukum yang digunakan"#,
            Self::PeraturanLookup => r#"Anda adalah asisten AI yang membantu mencari dan menjelaskan peraturan perundang-undangan Indonesia.
Jelaskan dengan bahasa yang mudah dipahami sambil tetap akurat secara hukum."#,
            Self::ContractReview => r#"Anda adalah asisten AI yang membantu review kontrak/perjanjian.
Fokus pada:
1. Identifikasi para pihak
2. Objek perjanjian
3. Hak dan kewajiban
4. Klausul penting (wanprestasi, force majeure, penyelesaian sengketa)
5. Potensi risiko hukum"#,
            Self::Summarization => r#"Anda adalah asisten AI yang meringkas dokumen hukum.
Buat ringkasan yang:
1. Mencakup poin-poin utama
2. Menyebutkan dasar hukum relevan
3. Mudah dipahami
4. Tidak lebih dari 3 paragraf"#,
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Template
// ============================================================================

const LLAMA3_BEGIN: &str = "<|begin_of_text|>";
const LLAMA3_EOT: &str = "<|eot_id|>";

fn llama3_header(role: &str) -> String {
    format!("<|start_header_id|>{}<|end_header_id|>\n\n", role)
}

/// Formats RAG, chat and multi-turn prompts in one style and language.
#[derive(Debug, Clone, PartialEq)]
pub struct LegalPromptTemplate {
    style: PromptStyle,
    system_prompt: String,
    max_context_chars: usize,
}

impl Default for LegalPromptTemplate {
    fn default() -> Self {
        Self::new(PromptStyle::default(), PromptLanguage::default())
    }
}

impl LegalPromptTemplate {
    pub fn new(style: PromptStyle, language: PromptLanguage) -> Self {
        Self {
            style,
            system_prompt: language.system_prompt().to_string(),
            max_context_chars: DEFAULT_PROMPT_CONTEXT_CHARS,
        }
    }

    pub fn with_max_context_chars(mut self, max_chars: usize) -> Self {
        self.max_context_chars = max_chars;
        self
    }

    /// Replace the system prompt, e.g. with a [`SystemPreset`].
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn style(&self) -> PromptStyle {
        self.style
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Cut `context` to the prompt budget, marking the cut.
    pub fn truncate_context<'a>(&self, context: &'a str) -> std::borrow::Cow<'a, str> {
        if context.chars().count() <= self.max_context_chars {
            return std::borrow::Cow::Borrowed(context);
        }
        let mut cut: String = context.chars().take(self.max_context_chars).collect();
        cut.push_str(CONTEXT_TRUNCATED_MARKER);
        std::borrow::Cow::Owned(cut)
    }

    /// Prompt answering `question` from retrieved `context`.
    pub fn format_rag(&self, question: &str, context: &str) -> String {
        let system = &self.system_prompt;
        let context = self.truncate_context(context);
        match self.style {
            PromptStyle::Llama3 => format!(
                "{begin}{sys_h}{system}{eot}{user_h}Konteks dari dokumen hukum:\n{context}\n\nPertanyaan: {question}{eot}{asst_h}",
                begin = LLAMA3_BEGIN,
                sys_h = llama3_header("system"),
                user_h = llama3_header("user"),
                asst_h = llama3_header("assistant"),
                eot = LLAMA3_EOT,
            ),
            PromptStyle::ChatMl => format!(
                "<|im_start|>system\n{system}<|im_end|>\n<|im_start|>user\nKonteks dari dokumen hukum:\n{context}\n\nPertanyaan: {question}<|im_end|>\n<|im_start|>assistant\n"
            ),
            PromptStyle::Simple => {
                format!("{system}\n\nKonteks:\n{context}\n\nPertanyaan: {question}\n\nJawaban:")
            }
        }
    }

    /// Prompt for direct chat without retrieved context.
    ///
    /// ChatML deployments use the plain layout here.
    pub fn format_chat(&self, question: &str) -> String {
        let system = &self.system_prompt;
        match self.style {
            PromptStyle::Llama3 => format!(
                "{begin}{sys_h}{system}{eot}{user_h}{question}{eot}{asst_h}",
                begin = LLAMA3_BEGIN,
                sys_h = llama3_header("system"),
                user_h = llama3_header("user"),
                asst_h = llama3_header("assistant"),
                eot = LLAMA3_EOT,
            ),
            PromptStyle::ChatMl | PromptStyle::Simple => {
                format!("{system}\n\nUser: {question}\nAssistant:")
            }
        }
    }

    /// Prompt for a conversation, ending with an open assistant turn.
    ///
    /// For Llama-3 and ChatML, `context` is folded into the first message when
    /// that message is from the user. The plain layout puts it before the turns.
    pub fn format_multi_turn(&self, messages: &[ChatMessage], context: Option<&str>) -> String {
        let context = context.filter(|c| !c.is_empty());
        let with_context = |i: usize, msg: &ChatMessage| -> String {
            match context {
                Some(ctx) if i == 0 && msg.role == ChatRole::User => {
                    format!("Konteks:\n{}\n\nPertanyaan: {}", ctx, msg.content)
                }
                _ => msg.content.clone(),
            }
        };

        let mut prompt = String::new();
        match self.style {
            PromptStyle::Llama3 => {
                prompt.push_str(LLAMA3_BEGIN);
                prompt.push_str(&llama3_header("system"));
                prompt.push_str(&self.system_prompt);
                prompt.push_str(LLAMA3_EOT);
                for (i, msg) in messages.iter().enumerate() {
                    prompt.push_str(&llama3_header(msg.role.as_str()));
                    prompt.push_str(&with_context(i, msg));
                    prompt.push_str(LLAMA3_EOT);
                }
                prompt.push_str(&llama3_header("assistant"));
            }
            PromptStyle::ChatMl => {
                prompt.push_str(&format!("<|im_start|>system\n{}<|im_end|>\n", self.system_prompt));
                for (i, msg) in messages.iter().enumerate() {
                    prompt.push_str(&format!(
                        "<|im_start|>{}\n{}<|im_end|>\n",
                        msg.role.as_str(),
                        with_context(i, msg)
                    ));
                }
                prompt.push_str("<|im_start|>assistant\n");
            }
            PromptStyle::Simple => {
                prompt.push_str(&format!("{}\n\n", self.system_prompt));
                if let Some(ctx) = context {
                    prompt.push_str(&format!("Konteks:\n{}\n\n", ctx));
                }
                for msg in messages {
                    let label = match msg.role {
                        ChatRole::User => "User",
                        ChatRole::Assistant => "Assistant",
                    };
                    prompt.push_str(&format!("{}: {}\n", label, msg.content));
                }
                prompt.push_str("Assistant:");
            }
        }
        prompt
    }
}
