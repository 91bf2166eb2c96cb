//! Question-structure recovery from noisy OCR text.
//!
//! OCR output from a browser screenshot is messy: inconsistent whitespace,
//! stray line breaks, mixed-case option markers. This module cleans the
//! text and tries a fixed order of parsing strategies to recover a
//! numbered question with lettered multiple-choice options, falling back
//! to the raw text when no structure is found.

use regex::Regex;

use crate::log;

/// A question recovered from OCR text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedQuestion {
    /// Leading question number, when the text starts with `<n>.`.
    pub question_number: Option<u32>,
    /// The question body, without the options.
    pub question_text: String,
    /// Options in document order, each reformatted as `"<letter>) <text>"`.
    pub options: Vec<String>,
    /// The full cleaned text.
    pub full_text: String,
    /// False when no question structure was recognized; in that case
    /// `question_text == full_text` and `options` is empty.
    pub has_structure: bool,
}

/// Parsing strategies, tried in order. First match wins.
const STRATEGIES: &[(&str, fn(&str) -> Option<ParsedQuestion>)] = &[
    ("numbered question", parse_numbered),
    ("options only", parse_options_only),
];

/// Parses OCR text into a structured question.
pub fn parse_question(raw_text: &str) -> ParsedQuestion {
    let cleaned = clean_text(raw_text);

    for (name, strategy) in STRATEGIES {
        if let Some(parsed) = strategy(&cleaned) {
            log(&format!(
                "Parser: strategy \"{}\" matched ({} options)",
                name,
                parsed.options.len()
            ));
            return parsed;
        }
    }

    log("Parser: no structure recognized, using full text");
    ParsedQuestion {
        question_number: None,
        question_text: cleaned.clone(),
        options: Vec::new(),
        full_text: cleaned,
        has_structure: false,
    }
}

/// Tier 1: a leading `<n>.` marker. The question body runs up to the first
/// line starting with a lowercase option marker, or the end of the text.
fn parse_numbered(cleaned: &str) -> Option<ParsedQuestion> {
    let number_re = Regex::new(r"^(\d+)\.\s*").expect("static regex");
    let captures = number_re.captures(cleaned)?;
    let question_number: u32 = captures[1].parse().ok()?;
    let body_start = captures.get(0).map(|m| m.end())?;

    let option_line_re = Regex::new(r"\n[a-e]\)").expect("static regex");
    let body = &cleaned[body_start..];
    let question_text = match option_line_re.find(body) {
        Some(m) => body[..m.start()].trim().to_string(),
        None => body.trim().to_string(),
    };

    Some(ParsedQuestion {
        question_number: Some(question_number),
        question_text,
        options: extract_options(cleaned)
            .into_iter()
            .map(|o| o.formatted)
            .collect(),
        full_text: cleaned.to_string(),
        has_structure: true,
    })
}

/// Tier 2: no question number, but lettered options are present. The text
/// before the first option becomes the question body.
fn parse_options_only(cleaned: &str) -> Option<ParsedQuestion> {
    let options = extract_options(cleaned);
    let first = options.first()?;

    let question_text = if first.position > 0 {
        cleaned[..first.position].trim().to_string()
    } else {
        cleaned.to_string()
    };

    Some(ParsedQuestion {
        question_number: None,
        question_text,
        options: options.into_iter().map(|o| o.formatted).collect(),
        full_text: cleaned.to_string(),
        has_structure: true,
    })
}

struct ExtractedOption {
    /// Byte offset of the option marker in the cleaned text.
    position: usize,
    /// `"<letter>) <text>"`, letter normalized to lowercase.
    formatted: String,
}

/// Marker patterns, tried in order: lowercase `)`, lowercase `.`,
/// uppercase `)`, uppercase `.`. The first pattern with any match wins;
/// patterns are never mixed within one extraction.
const OPTION_PATTERNS: &[&str] = &[
    r"(?m)^([a-e])\)[ \t]*",
    r"(?m)^([a-e])\.[ \t]*",
    r"(?m)^([A-E])\)[ \t]*",
    r"(?m)^([A-E])\.[ \t]*",
];

/// Extracts multiple-choice options from the cleaned text.
///
/// Each option's text runs from its marker to the next marker of the same
/// pattern, a blank line, or the end of the text.
fn extract_options(cleaned: &str) -> Vec<ExtractedOption> {
    for pattern in OPTION_PATTERNS {
        let marker_re = Regex::new(pattern).expect("static regex");
        let markers: Vec<(usize, usize, String)> = marker_re
            .captures_iter(cleaned)
            .map(|c| {
                let full = c.get(0).expect("match");
                (full.start(), full.end(), c[1].to_lowercase())
            })
            .collect();

        if markers.is_empty() {
            continue;
        }

        let mut options = Vec::with_capacity(markers.len());
        for (i, (start, text_start, letter)) in markers.iter().enumerate() {
            let text_end = markers
                .get(i + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(cleaned.len());

            let mut text = &cleaned[*text_start..text_end];
            if let Some(blank) = text.find("\n\n") {
                text = &text[..blank];
            }

            options.push(ExtractedOption {
                position: *start,
                formatted: format!("{}) {}", letter, text.trim()),
            });
        }
        return options;
    }

    Vec::new()
}

/// Cleans OCR text: normalizes line endings, collapses excess blank lines,
/// collapses runs of spaces and tabs, and strips indentation after line
/// breaks. Newlines are preserved since the parsing tiers are line-based.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");

    let excess_newlines = Regex::new(r"\n{3,}").expect("static regex");
    let text = excess_newlines.replace_all(&text, "\n\n");

    let space_runs = Regex::new(r"[ \t]+").expect("static regex");
    let text = space_runs.replace_all(&text, " ");

    let indented_lines = Regex::new(r"\n ").expect("static regex");
    let text = indented_lines.replace_all(&text, "\n");

    text.trim().to_string()
}

/// Keywords that mark interrogative or imperative exam phrasing.
const QUESTION_KEYWORDS: &str =
    r"(?i)(qual|quais|como|onde|quando|por que|marque|assinale|indique)";

/// Heuristic check that the captured text is plausibly an exam question.
pub fn is_valid_question(text: &str) -> bool {
    if text.chars().count() < 20 {
        log("Parser: text too short to be a question");
        return false;
    }

    let has_question_number = Regex::new(r"\d+\.\s").expect("static regex").is_match(text);
    let has_options = Regex::new(r"(?i)[a-e]\)\s").expect("static regex").is_match(text);
    let has_question_mark = text.contains('?');
    let has_keywords = Regex::new(QUESTION_KEYWORDS)
        .expect("static regex")
        .is_match(text);

    let valid = has_question_number || has_options || has_question_mark || has_keywords;
    if !valid {
        log("Parser: text does not look like a question");
    }
    valid
}

/// Formats a parsed question for the answer service.
///
/// Structured questions get labeled sections; unstructured text is passed
/// through verbatim.
pub fn format_for_ai(parsed: &ParsedQuestion) -> String {
    if !parsed.has_structure {
        return parsed.full_text.clone();
    }

    let mut formatted = String::new();

    if let Some(number) = parsed.question_number {
        formatted.push_str(&format!("QUESTÃO {}\n\n", number));
    }

    formatted.push_str(&format!("PERGUNTA:\n{}\n\n", parsed.question_text));

    if !parsed.options.is_empty() {
        formatted.push_str("ALTERNATIVAS:\n");
        for option in &parsed.options {
            formatted.push_str(option);
            formatted.push('\n');
        }
    }

    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("a\r\nb"), "a\nb");
        assert_eq!(clean_text("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_text("a   b\tc"), "a b c");
        assert_eq!(clean_text("a\n   b"), "a\nb");
        assert_eq!(clean_text("  padded  "), "padded");
    }

    #[test]
    fn test_parse_numbered_question() {
        let text = "1. Qual a capital da França?\na) Paris\nb) Lyon\nc) Marselha";
        let parsed = parse_question(text);

        assert!(parsed.has_structure);
        assert_eq!(parsed.question_number, Some(1));
        assert_eq!(parsed.question_text, "Qual a capital da França?");
        assert_eq!(
            parsed.options,
            vec!["a) Paris", "b) Lyon", "c) Marselha"]
        );
    }

    #[test]
    fn test_parse_multiline_question_body() {
        let text = "12. Considere o texto abaixo.\nSegundo o autor, o que ocorre?\na) Nada\nb) Tudo";
        let parsed = parse_question(text);

        assert_eq!(parsed.question_number, Some(12));
        assert_eq!(
            parsed.question_text,
            "Considere o texto abaixo.\nSegundo o autor, o que ocorre?"
        );
        assert_eq!(parsed.options.len(), 2);
    }

    #[test]
    fn test_parse_numbered_without_options() {
        let text = "3. Explique o conceito de fotossíntese em poucas palavras.";
        let parsed = parse_question(text);

        assert!(parsed.has_structure);
        assert_eq!(parsed.question_number, Some(3));
        assert!(parsed.options.is_empty());
        assert_eq!(
            parsed.question_text,
            "Explique o conceito de fotossíntese em poucas palavras."
        );
    }

    #[test]
    fn test_parse_options_only() {
        let text = "Assinale a alternativa correta:\na) Primeira\nb) Segunda\nc) Terceira";
        let parsed = parse_question(text);

        assert!(parsed.has_structure);
        assert_eq!(parsed.question_number, None);
        assert_eq!(parsed.question_text, "Assinale a alternativa correta:");
        assert_eq!(parsed.options.len(), 3);
    }

    #[test]
    fn test_parse_options_at_start() {
        let text = "a) Primeira alternativa\nb) Segunda alternativa";
        let parsed = parse_question(text);

        assert!(parsed.has_structure);
        // No text before the first option: the whole text doubles as body
        assert_eq!(parsed.question_text, parsed.full_text);
        assert_eq!(parsed.options.len(), 2);
    }

    #[test]
    fn test_parse_fallback_unstructured() {
        let text = "just some plain sentence without structure but long enough";
        let parsed = parse_question(text);

        assert!(!parsed.has_structure);
        assert_eq!(parsed.question_text, parsed.full_text);
        assert!(parsed.options.is_empty());
    }

    #[test]
    fn test_uppercase_options_normalized() {
        let text = "2. Qual opção?\nA) Alfa\nB) Beta";
        let parsed = parse_question(text);

        assert_eq!(parsed.options, vec!["a) Alfa", "b) Beta"]);
    }

    #[test]
    fn test_dot_delimited_options() {
        let text = "Marque a correta:\na. Primeira\nb. Segunda";
        let parsed = parse_question(text);

        assert_eq!(parsed.options, vec!["a) Primeira", "b) Segunda"]);
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        // Lowercase paren options present: the uppercase line is not an
        // option marker for the winning pattern
        let text = "Pergunta:\na) Um\nb) Dois\nC. Ignorado como marcador";
        let parsed = parse_question(text);

        assert_eq!(parsed.options.len(), 2);
        assert!(parsed.options[1].starts_with("b) Dois"));
    }

    #[test]
    fn test_option_stops_at_blank_line() {
        let text = "1. Pergunta?\na) Primeira\nb) Segunda\n\nRodapé da página ignorado";
        let parsed = parse_question(text);

        assert_eq!(parsed.options, vec!["a) Primeira", "b) Segunda"]);
    }

    #[test]
    fn test_options_preserve_document_order() {
        let text = "1. Ordem?\na) Um\nb) Dois\nc) Três\nd) Quatro\ne) Cinco";
        let parsed = parse_question(text);

        let letters: Vec<char> = parsed
            .options
            .iter()
            .map(|o| o.chars().next().unwrap())
            .collect();
        assert_eq!(letters, vec!['a', 'b', 'c', 'd', 'e']);
    }

    #[test]
    fn test_is_valid_question_too_short() {
        assert!(!is_valid_question(""));
        assert!(!is_valid_question("Qual?"));
    }

    #[test]
    fn test_is_valid_question_keyword() {
        assert!(is_valid_question(
            "Marque a alternativa correta sobre fotossíntese"
        ));
    }

    #[test]
    fn test_is_valid_question_question_mark() {
        assert!(is_valid_question(
            "O texto afirma exatamente o contrario disso?"
        ));
    }

    #[test]
    fn test_is_valid_question_numbering() {
        assert!(is_valid_question(
            "12. Leia o trecho a seguir e responda conforme pedido"
        ));
    }

    #[test]
    fn test_is_valid_question_rejects_plain_text() {
        assert!(!is_valid_question(
            "texto aleatorio sem estrutura nem pontos de interesse"
        ));
    }

    #[test]
    fn test_format_for_ai_round_trip() {
        let text = "1. Qual a capital da França?\na) Paris\nb) Lyon\nc) Marselha";
        let formatted = format_for_ai(&parse_question(text));

        assert!(formatted.contains("QUESTÃO 1"));
        assert!(formatted.contains("PERGUNTA:\nQual a capital da França?"));
        let a = formatted.find("a) Paris").unwrap();
        let b = formatted.find("b) Lyon").unwrap();
        let c = formatted.find("c) Marselha").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_format_for_ai_without_number() {
        let text = "Assinale a correta:\na) Um\nb) Dois";
        let formatted = format_for_ai(&parse_question(text));

        assert!(!formatted.contains("QUESTÃO"));
        assert!(formatted.starts_with("PERGUNTA:\n"));
        assert!(formatted.contains("ALTERNATIVAS:\na) Um\nb) Dois\n"));
    }

    #[test]
    fn test_format_for_ai_unstructured_passthrough() {
        let text = "apenas um paragrafo de texto corrido sem formato de questão";
        let parsed = parse_question(text);
        assert_eq!(format_for_ai(&parsed), parsed.full_text);
    }
}
