//! crates/enablement_core/src/plan.rs
//!
//! Turning text into a [`LessonPlan`]: lenient parsing of raw model output,
//! the deterministic fallback plan derived from the input text, and the
//! prompt/narration builders used by media generation.

use crate::domain::{Difficulty, Lesson, LessonPlan, LessonType};
use serde::Deserialize;
use serde_json::Value;

/// Narration speed assumed when a speech provider does not report duration.
pub const WORDS_PER_MINUTE: f64 = 150.0;

/// Speech providers reject very long inputs; narration is cut at a word boundary.
const MAX_NARRATION_CHARS: usize = 4000;
const DEFAULT_MAX_LESSONS: usize = 5;
const WORDS_PER_FALLBACK_LESSON: usize = 120;
const DEFAULT_IMAGE_STYLE: &str = "clean, professional, modern flat illustration";

pub fn estimate_narration_seconds(words: usize) -> f64 {
    words as f64 / WORDS_PER_MINUTE * 60.0
}

//=========================================================================================
// Parsing Model Output
//=========================================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanParseError {
    #[error("model output contains no complete JSON object")]
    NoJsonObject,
    #[error("model output is not a valid lesson plan: {0}")]
    InvalidJson(String),
    #[error("lesson plan contains no usable lessons")]
    NoLessons,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    lessons: Vec<RawLesson>,
    #[serde(default)]
    objectives: Vec<String>,
    #[serde(default, alias = "key_takeaways", alias = "takeaways")]
    key_takeaways: Vec<String>,
    difficulty: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLesson {
    title: Option<String>,
    content: Option<String>,
    #[serde(rename = "type", alias = "lessonType")]
    lesson_type: Option<String>,
    #[serde(alias = "duration", alias = "duration_hint")]
    duration_hint: Option<Value>,
}

/// Parses the text-generation collaborator's raw output.
///
/// Tolerates markdown fences and prose around the JSON object, unknown lesson
/// types and missing optional fields. Truncated output is an error.
pub fn parse_lesson_plan(raw: &str) -> Result<LessonPlan, PlanParseError> {
    let json = extract_json_object(raw).ok_or(PlanParseError::NoJsonObject)?;
    let parsed: RawPlan =
        serde_json::from_str(json).map_err(|e| PlanParseError::InvalidJson(e.to_string()))?;

    let lessons: Vec<Lesson> = parsed
        .lessons
        .into_iter()
        .filter_map(|raw| {
            let content = raw.content.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())?;
            Some((raw.title, content, raw.lesson_type, raw.duration_hint))
        })
        .enumerate()
        .map(|(i, (title, content, lesson_type, duration))| Lesson {
            title: title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Lesson {}", i + 1)),
            content,
            lesson_type: lesson_type
                .and_then(|t| t.parse().ok())
                .unwrap_or_default(),
            duration_hint: duration.and_then(duration_hint_text),
        })
        .collect();

    if lessons.is_empty() {
        return Err(PlanParseError::NoLessons);
    }

    let title = parsed
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| lessons[0].title.clone());

    Ok(LessonPlan {
        title,
        description: parsed.description.unwrap_or_default().trim().to_string(),
        lessons,
        objectives: clean_list(parsed.objectives),
        key_takeaways: clean_list(parsed.key_takeaways),
        difficulty: parsed
            .difficulty
            .and_then(|d| d.parse().ok())
            .unwrap_or_default(),
    })
}

/// Returns the first balanced `{...}` object in `raw`, ignoring braces inside strings.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn duration_hint_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(format!("{} min", n)),
        _ => None,
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

//=========================================================================================
// Deterministic Fallback Plan
//=========================================================================================

/// Derives a minimal lesson plan directly from the input text.
///
/// Same input, same plan. Returns `None` only when the text holds no words.
pub fn fallback_plan(domain_text: &str, max_lessons: Option<usize>) -> Option<LessonPlan> {
    let sentences = split_sentences(domain_text);
    if sentences.is_empty() {
        return None;
    }

    let total_words: usize = sentences.iter().map(|s| word_count(s)).sum();
    let cap = max_lessons.unwrap_or(DEFAULT_MAX_LESSONS).max(1);
    let lesson_count = total_words
        .div_ceil(WORDS_PER_FALLBACK_LESSON)
        .clamp(1, cap)
        .min(sentences.len());

    let chunks = distribute(&sentences, lesson_count);
    let lessons: Vec<Lesson> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let content = chunk.join(" ");
            let minutes = word_count(&content).div_ceil(WORDS_PER_MINUTE as usize).max(1);
            Lesson {
                title: format!("Part {}: {}", i + 1, headline(&chunk[0], 6)),
                content,
                lesson_type: fallback_lesson_type(i, lesson_count),
                duration_hint: Some(format!("{} min", minutes)),
            }
        })
        .collect();

    let objectives = lessons
        .iter()
        .map(|l| format!("Understand {}", l.title.split_once(": ").map_or(l.title.as_str(), |(_, t)| t)))
        .collect();
    let key_takeaways = chunks.iter().take(5).map(|c| c[0].clone()).collect();

    let difficulty = match total_words {
        0..=400 => Difficulty::Beginner,
        401..=1500 => Difficulty::Intermediate,
        _ => Difficulty::Advanced,
    };

    let description: String = sentences.iter().take(2).cloned().collect::<Vec<_>>().join(" ");

    Some(LessonPlan {
        title: headline(&sentences[0], 8),
        description: truncate_at_word(&description, 300),
        lessons,
        objectives,
        key_takeaways,
        difficulty,
    })
}

fn fallback_lesson_type(index: usize, count: usize) -> LessonType {
    if count >= 3 && index == count - 1 {
        LessonType::Assessment
    } else if index % 2 == 1 {
        LessonType::Practical
    } else {
        LessonType::Theory
    }
}

/// Splits text into sentences, keeping their terminal punctuation.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '?' | '!') {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().any(|c| c.is_alphanumeric()) {
        sentences.push(normalized);
    }
}

/// Splits `items` into `parts` contiguous, nearly equal groups in order.
fn distribute(items: &[String], parts: usize) -> Vec<Vec<String>> {
    let base = items.len() / parts;
    let extra = items.len() % parts;
    let mut groups = Vec::with_capacity(parts);
    let mut cursor = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        groups.push(items[cursor..cursor + len].to_vec());
        cursor += len;
    }
    groups
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// The first `words` words of a sentence, without trailing punctuation.
fn headline(sentence: &str, words: usize) -> String {
    sentence
        .split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out = String::new();
    for word in text.split_whitespace() {
        if out.chars().count() + word.chars().count() + 1 > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

//=========================================================================================
// Prompt & Narration Builders
//=========================================================================================

pub fn lesson_narration(lesson: &Lesson) -> String {
    truncate_at_word(&format!("{}. {}", lesson.title, lesson.content), MAX_NARRATION_CHARS)
}

pub fn intro_narration(plan: &LessonPlan) -> String {
    let mut text = format!("Welcome to {}.", plan.title);
    if !plan.description.is_empty() {
        text.push(' ');
        text.push_str(&plan.description);
    }
    if !plan.objectives.is_empty() {
        text.push_str(" In this module you will: ");
        text.push_str(&plan.objectives.join("; "));
        text.push('.');
    }
    truncate_at_word(&text, MAX_NARRATION_CHARS)
}

pub fn conclusion_narration(plan: &LessonPlan) -> String {
    let mut text = format!("That concludes {}.", plan.title);
    if !plan.key_takeaways.is_empty() {
        text.push_str(" Remember these key takeaways: ");
        text.push_str(&plan.key_takeaways.join("; "));
        text.push('.');
    }
    text.push_str(" Thank you for listening.");
    truncate_at_word(&text, MAX_NARRATION_CHARS)
}

pub fn image_prompt(lesson: &Lesson, style: Option<&str>) -> String {
    format!(
        "Educational illustration for a sales training lesson titled '{}'. {} Style: {}. No text or lettering.",
        lesson.title,
        first_sentence(&lesson.content),
        style.unwrap_or(DEFAULT_IMAGE_STYLE)
    )
}

pub fn video_prompt(lesson: &Lesson) -> String {
    format!(
        "Short, professional training clip about {}. {}",
        lesson.title,
        first_sentence(&lesson.content)
    )
}

fn first_sentence(text: &str) -> String {
    split_sentences(text)
        .into_iter()
        .next()
        .map(|s| truncate_at_word(&s, 300))
        .unwrap_or_default()
}
