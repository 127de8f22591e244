//! Text Cleaning
//!
//! 추출된 원문을 임베딩에 적합하게 정제합니다.
//! 정제는 항상 성공하며, 이상 징후는 경고로만 남깁니다.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// 페이지 구분 문자 (추출기가 페이지 사이에 삽입)
pub const PAGE_BREAK: char = '\x0c';

/// 정제 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedText {
    /// 정제된 텍스트 (공백 정규화 완료)
    pub text: String,
    /// 치명적이지 않은 경고 목록
    pub warnings: Vec<String>,
}

/// 머리글/바닥글 후보로 보는 페이지 앞뒤 줄 수
const EDGE_LINES: usize = 2;

/// 반복 줄을 머리글/바닥글로 판단하는 최소 페이지 수
const MIN_REPEAT_PAGES: usize = 3;

/// "12", "Page 3", "Page 3 of 5", "3 / 5" 형태의 페이지 번호 줄
fn page_number_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:page\s+)?(\d{1,4})(?:\s*(?:of|/)\s*\d{1,4})?\s*$")
            .expect("page number regex is valid")
    })
}

/// 줄이 해당 페이지의 번호인지 (1부터)
fn is_page_number(line: &str, page_no: usize) -> bool {
    page_number_line()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .map_or(false, |n| n == page_no)
}

/// 텍스트 정제
///
/// 1. (선택) 여러 페이지 원문에서 페이지 번호 줄과 반복되는 머리글/바닥글 제거
/// 2. 제어 문자 제거
/// 3. 연속 공백을 단일 공백으로 정규화
pub fn clean_text(raw: &str, remove_boilerplate: bool) -> CleanedText {
    let mut warnings = Vec::new();

    let body = if remove_boilerplate {
        strip_boilerplate(raw, &mut warnings)
    } else {
        raw.to_string()
    };

    let mut control_count = 0usize;
    let mut replacement_count = 0usize;
    let mut text = String::with_capacity(body.len());
    let mut pending_space = false;

    for c in body.chars() {
        if c == '\u{FFFD}' {
            replacement_count += 1;
        }

        if c.is_whitespace() || c == PAGE_BREAK {
            pending_space = true;
            continue;
        }

        if c.is_control() {
            control_count += 1;
            continue;
        }

        if pending_space && !text.is_empty() {
            text.push(' ');
        }
        pending_space = false;
        text.push(c);
    }

    if control_count > 0 {
        warnings.push(format!("stripped {} control character(s)", control_count));
    }
    if replacement_count > 0 {
        warnings.push(format!(
            "text contains {} undecodable character(s)",
            replacement_count
        ));
    }
    if text.is_empty() && !raw.trim().is_empty() {
        warnings.push("nothing left after cleaning".to_string());
    }

    for warning in &warnings {
        tracing::debug!("Cleaning anomaly: {}", warning);
    }

    CleanedText { text, warnings }
}

/// 머리글/바닥글 제거
///
/// 페이지 구분 문자로 나뉜 두 페이지 이상의 원문에만 적용합니다.
/// 각 페이지의 앞뒤 `EDGE_LINES`줄만 후보이며, 그중 자기 페이지 번호인 줄과
/// `MIN_REPEAT_PAGES` 이상이면서 절반 이상의 페이지에 반복되는 짧은 줄을
/// 제거합니다. 제거한 줄 수는 항상 경고로 남깁니다.
fn strip_boilerplate(raw: &str, warnings: &mut Vec<String>) -> String {
    let pages: Vec<Vec<&str>> = raw
        .split(PAGE_BREAK)
        .map(|page| page.lines().collect())
        .collect();
    if pages.len() < 2 {
        return raw.to_string();
    }

    let mut repeated: HashMap<&str, usize> = HashMap::new();
    for lines in &pages {
        let mut seen: Vec<&str> = Vec::new();
        for (_, line) in edge_lines(lines) {
            if line.len() >= 3 && line.len() <= 80 && !seen.contains(&line) {
                seen.push(line);
                *repeated.entry(line).or_insert(0) += 1;
            }
        }
    }
    let threshold = pages.len().div_ceil(2).max(MIN_REPEAT_PAGES);
    repeated.retain(|_, count| *count >= threshold);

    let mut removed = 0usize;
    let cleaned_pages: Vec<String> = pages
        .iter()
        .enumerate()
        .map(|(i, lines)| {
            let drop: Vec<usize> = edge_lines(lines)
                .filter(|(_, line)| is_page_number(line, i + 1) || repeated.contains_key(line))
                .map(|(idx, _)| idx)
                .collect();
            removed += drop.len();

            lines
                .iter()
                .enumerate()
                .filter(|(idx, _)| !drop.contains(idx))
                .map(|(_, line)| *line)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();

    if removed > 0 {
        warnings.push(format!(
            "removed {} header/footer line(s) across {} pages",
            removed,
            pages.len()
        ));
    }

    cleaned_pages.join(&PAGE_BREAK.to_string())
}

/// 페이지 앞뒤의 비어 있지 않은 줄 (원래 줄 번호, 다듬은 줄)
fn edge_lines<'a>(lines: &'a [&'a str]) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    let content: Vec<(usize, &str)> = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| (idx, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    let n = content.len();
    content
        .into_iter()
        .enumerate()
        .filter(move |(pos, _)| *pos < EDGE_LINES || *pos + EDGE_LINES >= n)
        .map(|(_, entry)| entry)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_whitespace() {
        let cleaned = clean_text("  Senior   engineer\n\n\tat  Acme  ", false);
        assert_eq!(cleaned.text, "Senior engineer at Acme");
        assert!(cleaned.warnings.is_empty());
    }

    #[test]
    fn test_strips_control_characters() {
        let cleaned = clean_text("Rust\u{0007} and\u{0000} Go", false);
        assert_eq!(cleaned.text, "Rust and Go");
        assert_eq!(cleaned.warnings.len(), 1);
        assert!(cleaned.warnings[0].contains("2 control"));
    }

    #[test]
    fn test_keeps_punctuation() {
        let cleaned = clean_text("C++, C# and e-mail: alec@example.com", false);
        assert_eq!(cleaned.text, "C++, C# and e-mail: alec@example.com");
    }

    #[test]
    fn test_removes_page_numbers_and_repeated_footers() {
        let raw = "Alec Hantson - Resume\nExperience at Acme\nPage 1 of 3\x0c\
                   Alec Hantson - Resume\nEducation at MIT\n2\x0c\
                   Alec Hantson - Resume\nHobbies: chess\n3";
        let cleaned = clean_text(raw, true);
        assert_eq!(cleaned.text, "Experience at Acme Education at MIT Hobbies: chess");
        assert_eq!(cleaned.warnings.len(), 1);
        assert!(cleaned.warnings[0].contains("removed 6 header/footer"));
    }

    #[test]
    fn test_single_page_keeps_years_and_repeated_lines() {
        let raw = "Experience\n2019\nData engineer at Acme\n2021\nPython\nPython";
        let cleaned = clean_text(raw, true);
        assert_eq!(
            cleaned.text,
            "Experience 2019 Data engineer at Acme 2021 Python Python"
        );
        assert!(cleaned.warnings.is_empty());
    }

    #[test]
    fn test_two_pages_keep_repeated_titles_and_years() {
        let raw = "Software Engineer\nAcme 2018-2020\n2019\x0c\
                   Software Engineer\nBeta 2020-2023\n2";
        let cleaned = clean_text(raw, true);
        assert_eq!(
            cleaned.text,
            "Software Engineer Acme 2018-2020 2019 Software Engineer Beta 2020-2023"
        );
        assert_eq!(cleaned.warnings, vec!["removed 1 header/footer line(s) across 2 pages"]);
    }

    #[test]
    fn test_repeated_line_in_page_body_is_kept() {
        let raw = "Header\nA\nB\nSkills: Rust\nC\nD\x0c\
                   Header\nE\nF\nSkills: Rust\nG\nH\x0c\
                   Header\nI\nJ\nSkills: Rust\nK\nL";
        let cleaned = clean_text(raw, true);
        assert_eq!(cleaned.text.matches("Skills: Rust").count(), 3);
        assert!(!cleaned.text.contains("Header"));
    }

    #[test]
    fn test_warns_on_replacement_characters() {
        let cleaned = clean_text("caf\u{FFFD} latte", false);
        assert_eq!(cleaned.text, "caf\u{FFFD} latte");
        assert_eq!(cleaned.warnings.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let cleaned = clean_text("   \n ", true);
        assert!(cleaned.text.is_empty());
        assert!(cleaned.warnings.is_empty());
    }
}
