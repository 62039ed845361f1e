//! Extraction helpers for free-text model answers.

use crate::models::{UseCase, WebResult};
use serde_json::Value;

/// Parse the outermost `[...]` span of `text` as JSON.
pub fn extract_json_array(text: &str) -> Option<Value> {
    extract_span(text, '[', ']').filter(Value::is_array)
}

/// Parse the outermost `{...}` span of `text` as JSON.
pub fn extract_json_object(text: &str) -> Option<Value> {
    extract_span(text, '{', '}').filter(Value::is_object)
}

fn extract_span(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Strings of a JSON array, skipping non-string items.
pub fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Up to five trend lines from an analysis answer.
///
/// Numbered lines are preferred; bulleted lines are used when there are none.
pub fn extract_trends(content: &str) -> Vec<String> {
    let numbered: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > 10)
        .filter(|line| line.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(|line| match line.split_once(". ") {
            Some((_, rest)) => rest.trim().to_string(),
            None => line.to_string(),
        })
        .collect();

    let trends = if numbered.is_empty() {
        content
            .lines()
            .map(str::trim)
            .filter(|line| line.chars().count() > 10)
            .filter_map(|line| {
                ["- ", "* ", "• "]
                    .iter()
                    .find_map(|bullet| line.strip_prefix(bullet))
            })
            .map(|line| line.trim().to_string())
            .collect()
    } else {
        numbered
    };

    trends.into_iter().take(5).collect()
}

/// Every http(s) URL in `text`, in order of appearance, without duplicates.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut rest = text;

    while let Some(pos) = find_scheme(rest) {
        let candidate = &rest[pos..];
        let end = candidate
            .find(|c: char| c.is_whitespace() || matches!(c, ',' | ')' | ']' | '>' | '"'))
            .unwrap_or(candidate.len());
        let url = candidate[..end].trim_end_matches(['.', ';']);
        if url.len() > "https://".len() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
        rest = &candidate[end..];
    }

    urls
}

fn find_scheme(text: &str) -> Option<usize> {
    match (text.find("https://"), text.find("http://")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Parse `Use Case N: ...` sections.
///
/// Missing fields get placeholder text. When no section is found in a
/// non-empty answer, a single generic use case is returned so later stages
/// still have something to plan for.
pub fn extract_use_cases(content: &str, company: &str) -> Vec<UseCase> {
    let markers = case_markers(content);
    let mut use_cases = Vec::with_capacity(markers.len());

    for (i, &start) in markers.iter().enumerate() {
        let end = markers.get(i + 1).copied().unwrap_or(content.len());
        use_cases.push(parse_case_section(&content[start..end], i + 1));
    }

    if use_cases.is_empty() && !content.trim().is_empty() {
        use_cases.push(UseCase {
            title: "AI-Powered Process Optimization".to_string(),
            objective: format!("Improve operational efficiency for {}", company),
            ai_application: "Machine learning algorithms for process optimization".to_string(),
            cross_functional_benefits: vec![
                "Improved efficiency".to_string(),
                "Cost reduction".to_string(),
            ],
            articles: Vec::new(),
        });
    }

    use_cases
}

/// Byte offsets of every `Use Case <digits>:` marker.
fn case_markers(content: &str) -> Vec<usize> {
    const MARKER: &str = "Use Case ";
    let mut markers = Vec::new();
    let mut offset = 0;

    while let Some(pos) = content[offset..].find(MARKER) {
        let start = offset + pos;
        let after = &content[start + MARKER.len()..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && after[digits..].starts_with(':') {
            markers.push(start);
        }
        offset = start + MARKER.len();
    }

    markers
}

fn parse_case_section(section: &str, number: usize) -> UseCase {
    let title = section
        .split_once(':')
        .map(|(_, rest)| rest.lines().next().unwrap_or(""))
        .map(clean_inline)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Use Case {}", number));

    let objective = field(section, "Objective/Use Case:")
        .unwrap_or_else(|| "Improve business processes".to_string());
    let ai_application = field(section, "AI Application:")
        .unwrap_or_else(|| "Apply machine learning techniques".to_string());

    let mut benefits: Vec<String> = section
        .split_once("Cross-Functional Benefits:")
        .map(|(_, rest)| rest.split("Articles:").next().unwrap_or(""))
        .map(|block| {
            block
                .lines()
                .map(str::trim)
                .filter_map(|line| {
                    line.strip_prefix('-')
                        .or_else(|| line.strip_prefix('*'))
                        .or_else(|| line.strip_prefix('•'))
                })
                .map(clean_inline)
                .filter(|b| !b.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if benefits.is_empty() {
        benefits.push("Improved efficiency".to_string());
    }

    let articles = section
        .split_once("Articles:")
        .map(|(_, rest)| extract_urls(rest.lines().next().unwrap_or("")))
        .unwrap_or_default();

    UseCase {
        title,
        objective,
        ai_application,
        cross_functional_benefits: benefits,
        articles,
    }
}

/// Rest of the line following `label`.
fn field(section: &str, label: &str) -> Option<String> {
    section
        .split_once(label)
        .map(|(_, rest)| clean_inline(rest.lines().next().unwrap_or("")))
        .filter(|v| !v.is_empty())
}

/// Trim whitespace and markdown emphasis.
fn clean_inline(text: &str) -> String {
    text.trim().trim_matches('*').trim().to_string()
}

/// Prompt context block from search hits.
pub fn web_context(results: &[WebResult], with_url: bool, max_chars: Option<usize>) -> String {
    results
        .iter()
        .map(|r| {
            let content = match max_chars {
                Some(max) if r.content.chars().count() > max => {
                    format!("{}...", r.content.chars().take(max).collect::<String>())
                }
                _ => r.content.clone(),
            };
            if with_url {
                format!("Title: {}\nURL: {}\nContent: {}", r.title, r.url, content)
            } else {
                format!("Title: {}\nContent: {}", r.title, content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt context block describing a use case.
pub fn describe_use_case(use_case: &UseCase) -> String {
    format!(
        "Use Case: {}\nObjective: {}\nAI Application: {}\nCross-Functional Benefits: {}",
        use_case.title,
        use_case.objective,
        use_case.ai_application,
        use_case.cross_functional_benefits.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const USE_CASES: &str = "Here are the use cases.

Use Case 1: **Demand Forecasting**
Objective/Use Case: Cut stockouts by 30% across stores.
AI Application: Gradient boosted trees over POS history and weather.
Cross-Functional Benefits:
- Supply Chain: fewer stockouts
- Finance: lower working capital
Articles: https://example.com/a, https://example.com/b

Use Case 2: Visual Shelf Monitoring
Objective/Use Case: Detect empty shelves in real time.
AI Application: On-device object detection.
Articles: none yet
";

    #[test]
    fn test_extract_json_array_from_chatter() {
        let value = extract_json_array("Sure! Here you go:\n[\"Groceries\", \"Pharmacy\"]\nHope it helps.")
            .unwrap();
        assert_eq!(string_list(&value), vec!["Groceries", "Pharmacy"]);
        assert!(extract_json_array("no list here").is_none());
        assert!(extract_json_array("] backwards [").is_none());
    }

    #[test]
    fn test_extract_json_object() {
        let value = extract_json_object("```json\n{\"estimated_timeline\": \"9 months\"}\n```").unwrap();
        assert_eq!(value["estimated_timeline"], "9 months");
        assert!(extract_json_object("{ broken").is_none());
    }

    #[test]
    fn test_extract_trends_numbered() {
        let content = "Analysis:\n1. Rapid growth of self-checkout\n2) Personalized promotions at scale\n3. Short\nOther text";
        let trends = extract_trends(content);
        assert_eq!(
            trends,
            vec![
                "Rapid growth of self-checkout".to_string(),
                "2) Personalized promotions at scale".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_trends_bullets_and_limit() {
        let content = (1..=7)
            .map(|i| format!("- Bulleted market trend number {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let trends = extract_trends(&content);
        assert_eq!(trends.len(), 5);
        assert_eq!(trends[0], "Bulleted market trend number 1");
    }

    #[test]
    fn test_extract_urls() {
        let urls = extract_urls(
            "See https://a.com/x, (http://b.org/y) and https://a.com/x again. Also https://c.io.",
        );
        assert_eq!(urls, vec!["https://a.com/x", "http://b.org/y", "https://c.io"]);
    }

    #[test]
    fn test_extract_use_cases() {
        let cases = extract_use_cases(USE_CASES, "Acme");
        assert_eq!(cases.len(), 2);

        assert_eq!(cases[0].title, "Demand Forecasting");
        assert_eq!(cases[0].objective, "Cut stockouts by 30% across stores.");
        assert_eq!(
            cases[0].cross_functional_benefits,
            vec![
                "Supply Chain: fewer stockouts".to_string(),
                "Finance: lower working capital".to_string()
            ]
        );
        assert_eq!(
            cases[0].articles,
            vec!["https://example.com/a", "https://example.com/b"]
        );

        assert_eq!(cases[1].title, "Visual Shelf Monitoring");
        assert_eq!(cases[1].cross_functional_benefits, vec!["Improved efficiency"]);
        assert!(cases[1].articles.is_empty());
    }

    #[test]
    fn test_unstructured_answer_yields_generic_use_case() {
        let cases = extract_use_cases("I think AI could help a lot.", "Acme");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].title, "AI-Powered Process Optimization");
        assert!(cases[0].objective.contains("Acme"));

        assert!(extract_use_cases("   ", "Acme").is_empty());
    }

    #[test]
    fn test_objective_label_is_not_a_marker() {
        let markers = case_markers("Objective/Use Case: x\nUse Case 12: y");
        assert_eq!(markers.len(), 1);
    }

    #[test]
    fn test_web_context_truncates() {
        let hit = WebResult {
            title: "T".to_string(),
            url: "https://t".to_string(),
            content: "abcdef".to_string(),
            relevance_score: 1.0,
        };
        assert_eq!(
            web_context(&[hit.clone()], true, Some(3)),
            "Title: T\nURL: https://t\nContent: abc..."
        );
        assert_eq!(web_context(&[hit], false, None), "Title: T\nContent: abcdef");
    }
}
