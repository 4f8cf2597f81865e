
use anyhow::{Context, Result};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

/// A single story extracted from a book
#[derive(Debug, Clone, PartialEq)]
pub struct StoryUnit {
    /// The story text
    pub text: String,
    /// Title of the book this story came from
    pub source: String,
    /// Ordinal position of this story within the book
    pub index: u32,
    /// Which boundary heuristic produced this unit
    pub kind: UnitKind,
}

/// The boundary heuristic that produced a story unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Chapter,
    Story,
    Section,
    Chunk,
    Complete,
}

/// Configuration for story segmentation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Minimum story length in characters (shorter candidates are dropped)
    pub min_story_chars: usize,
    /// Maximum story length in characters before forced splitting
    pub max_story_chars: usize,
    /// Chunk size in characters for the fixed-size fallback
    pub chunk_size: usize,
}

impl Default for SegmenterConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_story_chars: 300,
            max_story_chars: 8000,
            chunk_size: 1200,
        }
    }
}

const TITLE_MAX_CHARS: usize = 80;

/// Paragraphs shorter than this are treated as noise when grouping
const MIN_PARAGRAPH_CHARS: usize = 50;

/// Sentence endings used to snap chunk cuts, in priority order
const SENTENCE_ENDINGS: [&str; 6] = [". ", ".\n", "! ", "!\n", "? ", "?\n"];

static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^chapter\s+[ivxlcdm0-9]+[.:]?\s*$").expect("valid regex")
});

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\d+[.)]\s+[A-Z]").expect("valid regex"));

static CAPS_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[A-Z][A-Z0-9 .,'&:;!?-]{2,59}$").expect("valid regex"));

type Heuristic = fn(&str, &SegmenterConfig) -> Result<Vec<String>>;

/// Boundary heuristics in cascade order; the first one yielding more
/// than one usable candidate wins.
const HEURISTICS: [(UnitKind, Heuristic); 5] = [
    (UnitKind::Chapter, chapter_segments),
    (UnitKind::Story, numbered_segments),
    (UnitKind::Section, caps_title_segments),
    (UnitKind::Story, paragraph_segments),
    (UnitKind::Chunk, chunk_segments),
];

/// Split a book into individual story units
#[inline]
pub fn segment_book(
    source: &str,
    content: &str,
    config: &SegmenterConfig,
) -> Result<Vec<StoryUnit>> {
    let normalized = content.replace("\r\n", "\n");
    let body = strip_boilerplate(&normalized);

    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    for (kind, heuristic) in HEURISTICS {
        let candidates = usable_candidates(
            heuristic(body, config).with_context(|| format!("Segmenting '{}' failed", source))?,
            config,
        );
        if candidates.len() > 1 {
            let units = attach_units(enforce_max(candidates, config), source, kind);
            debug!(
                "Segmented '{}' into {} units via {} boundaries",
                source,
                units.len(),
                kind
            );
            return Ok(units);
        }
    }

    // No boundary heuristic matched; treat the whole body as one story
    // as long as it is long enough to be one.
    let trimmed = body.trim();
    if trimmed.len() >= config.min_story_chars {
        let pieces = enforce_max(vec![trimmed.to_string()], config);
        let kind = if pieces.len() > 1 {
            UnitKind::Chunk
        } else {
            UnitKind::Complete
        };
        debug!("Segmented '{}' as a whole-text unit", source);
        return Ok(attach_units(pieces, source, kind));
    }

    debug!("No usable story units in '{}'", source);
    Ok(Vec::new())
}

/// Strip the archive's license header and footer.
///
/// Content between a `*** START OF ... ***` marker and a
/// `*** END OF ... ***` marker is the body; everything outside is
/// dropped. Texts without markers are returned unchanged.
#[inline]
pub fn strip_boilerplate(content: &str) -> &str {
    let body_start = ["*** START", "***START"]
        .iter()
        .filter_map(|marker| content.find(marker))
        .min()
        .and_then(|pos| {
            content
                .get(pos..)
                .and_then(|rest| rest.find('\n').map(|newline| pos + newline + 1))
        })
        .unwrap_or(0);

    let tail = content.get(body_start..).unwrap_or(content);
    let body_end = ["*** END", "***END"]
        .iter()
        .filter_map(|marker| tail.find(marker))
        .min()
        .unwrap_or(tail.len());

    tail.get(..body_end).unwrap_or(tail)
}

impl StoryUnit {
    /// Short display title derived from the first non-empty line
    #[inline]
    pub fn display_title(&self) -> String {
        let line = self
            .text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("Untitled");
        line.chars().take(TITLE_MAX_CHARS).collect()
    }
}

impl UnitKind {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chapter => "chapter",
            Self::Story => "story",
            Self::Section => "section",
            Self::Chunk => "chunk",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for UnitKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UnitKind {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chapter" => Ok(Self::Chapter),
            "story" => Ok(Self::Story),
            "section" => Ok(Self::Section),
            "chunk" => Ok(Self::Chunk),
            "complete" => Ok(Self::Complete),
            other => Err(anyhow::anyhow!("unknown unit kind: {other}")),
        }
    }
}

fn chapter_segments(body: &str, _config: &SegmenterConfig) -> Result<Vec<String>> {
    let starts = match_starts(&CHAPTER_RE, body)?
        .into_iter()
        .map(|(start, _)| start)
        .collect::<Vec<_>>();
    Ok(slice_between(body, &starts))
}

fn numbered_segments(body: &str, _config: &SegmenterConfig) -> Result<Vec<String>> {
    let starts = match_starts(&NUMBERED_RE, body)?
        .into_iter()
        .map(|(start, _)| start)
        .collect::<Vec<_>>();
    Ok(slice_between(body, &starts))
}

/// Short all-caps lines surrounded by blank lines are treated as story
/// titles. The blank-line requirement keeps tables of contents, where
/// caps lines sit directly on top of each other, from matching.
fn caps_title_segments(body: &str, _config: &SegmenterConfig) -> Result<Vec<String>> {
    let starts = match_starts(&CAPS_TITLE_RE, body)?
        .into_iter()
        .filter(|&(start, end)| {
            preceded_by_blank_line(body, start) && followed_by_blank_line(body, end)
        })
        .map(|(start, _)| start)
        .collect::<Vec<_>>();
    Ok(slice_between(body, &starts))
}

/// Group paragraphs into stories: paragraphs accumulate until the group
/// has at least two of them and meets the minimum story length.
fn paragraph_segments(body: &str, config: &SegmenterConfig) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut group: Vec<&str> = Vec::new();
    let mut group_len = 0usize;

    for paragraph in body.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.len() <= MIN_PARAGRAPH_CHARS {
            continue;
        }

        // group_len is the length after joining with "\n\n"
        let mut cost = paragraph.len();
        if !group.is_empty() {
            cost += 2;
        }
        if group_len + cost > config.max_story_chars && !group.is_empty() {
            segments.push(group.join("\n\n"));
            group.clear();
            group_len = 0;
            cost = paragraph.len();
        }

        group.push(paragraph);
        group_len += cost;

        if group.len() >= 2 && group_len >= config.min_story_chars {
            segments.push(group.join("\n\n"));
            group.clear();
            group_len = 0;
        }
    }

    if !group.is_empty() {
        let text = group.join("\n\n");
        if text.len() >= config.min_story_chars {
            segments.push(text);
        }
    }

    Ok(segments)
}

fn chunk_segments(body: &str, config: &SegmenterConfig) -> Result<Vec<String>> {
    Ok(split_into_chunks(body, config.chunk_size))
}

/// Cut text into fixed-size chunks, snapping each cut to a sentence
/// boundary when one occurs in the final 30% of the chunk.
fn split_into_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let mut end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        if end <= start {
            break;
        }
        let Some(mut piece) = text.get(start..end) else {
            break;
        };

        if end < text.len() {
            if let Some(cut) = sentence_cut(piece) {
                piece = piece.get(..cut).unwrap_or(piece);
                end = start + cut;
            }
        }

        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        start = end;
        while start < text.len()
            && text
                .as_bytes()
                .get(start)
                .is_some_and(|byte| byte.is_ascii_whitespace())
        {
            start += 1;
        }
    }

    chunks
}

fn sentence_cut(chunk: &str) -> Option<usize> {
    let search_start = (chunk.len() * 7) / 10;
    for marker in SENTENCE_ENDINGS {
        if let Some(pos) = chunk.rfind(marker) {
            if pos > search_start {
                return Some(pos + marker.len());
            }
        }
    }
    None
}

fn match_starts(re: &Regex, body: &str) -> Result<Vec<(usize, usize)>> {
    let mut spans = Vec::new();
    for found in re.find_iter(body) {
        let found = found.context("boundary regex search failed")?;
        spans.push((found.start(), found.end()));
    }
    Ok(spans)
}

/// Slice the body into segments running from each boundary start to the
/// next. Text before the first boundary (front matter) is dropped.
fn slice_between(body: &str, starts: &[usize]) -> Vec<String> {
    let mut segments = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(body.len());
        if let Some(segment) = body.get(start..end) {
            segments.push(segment.to_string());
        }
    }
    segments
}

fn preceded_by_blank_line(body: &str, start: usize) -> bool {
    let Some(prefix) = body.get(..start) else {
        return false;
    };
    prefix
        .lines()
        .next_back()
        .is_none_or(|line| line.trim().is_empty())
}

fn followed_by_blank_line(body: &str, end: usize) -> bool {
    let Some(rest) = body.get(end..) else {
        return false;
    };
    let Some(after_newline) = rest.strip_prefix('\n') else {
        return rest.is_empty();
    };
    after_newline
        .lines()
        .next()
        .is_none_or(|line| line.trim().is_empty())
}

fn usable_candidates(raw: Vec<String>, config: &SegmenterConfig) -> Vec<String> {
    raw.into_iter()
        .map(|candidate| candidate.trim().to_string())
        .filter(|candidate| candidate.len() >= config.min_story_chars)
        .collect()
}

/// Split any candidate above the maximum story length, re-applying the
/// minimum to the resulting pieces.
fn enforce_max(candidates: Vec<String>, config: &SegmenterConfig) -> Vec<String> {
    let mut units = Vec::new();
    for candidate in candidates {
        if candidate.len() <= config.max_story_chars {
            units.push(candidate);
            continue;
        }
        for piece in split_overlong(&candidate, config) {
            if piece.len() >= config.min_story_chars {
                units.push(piece);
            }
        }
    }
    units
}

/// Pack paragraphs up to the maximum story length; paragraphs that are
/// themselves overlong fall back to fixed-size chunks.
fn split_overlong(text: &str, config: &SegmenterConfig) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut group: Vec<&str> = Vec::new();
    let mut group_len = 0usize;

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if paragraph.len() > config.max_story_chars {
            if !group.is_empty() {
                pieces.push(group.join("\n\n"));
                group.clear();
                group_len = 0;
            }
            pieces.extend(split_into_chunks(paragraph, config.chunk_size));
            continue;
        }

        let mut cost = paragraph.len();
        if !group.is_empty() {
            cost += 2;
        }
        if group_len + cost > config.max_story_chars && !group.is_empty() {
            pieces.push(group.join("\n\n"));
            group.clear();
            group_len = 0;
            cost = paragraph.len();
        }

        group.push(paragraph);
        group_len += cost;
    }

    if !group.is_empty() {
        pieces.push(group.join("\n\n"));
    }

    pieces
}

fn attach_units(texts: Vec<String>, source: &str, kind: UnitKind) -> Vec<StoryUnit> {
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| StoryUnit {
            text,
            source: source.to_string(),
            index: index as u32,
            kind,
        })
        .collect()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
