//! Classification prompt construction and response validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::config::DomainConfig;

use super::{Classification, LlmError};

/// Collapse runs of blank lines, trimming each remaining line.
pub fn strip_successive_newlines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the classification prompt: the closed category enumeration with
/// descriptions, the file name as a tiebreaker, and the page texts.
pub fn classification_prompt(domain: &DomainConfig, file_name: &str, pages: &[String]) -> String {
    let mut prompt = String::from(
        "Classify the following text into one of the predefined categories:\n<ClassificationCategories>\n",
    );
    for category in &domain.categories {
        prompt.push_str(&format!(
            "<Category><Identifier>{}</Identifier><Description>{}</Description></Category>\n",
            category.id, category.description
        ));
    }
    prompt.push_str("</ClassificationCategories>\n\n");
    prompt.push_str(
        "The text is divided into pages. The document should be classified in its entirety. \
         In case the document doesn't contain enough information, you should also consult the \
         filename to make a determination.\n",
    );
    prompt.push_str(
        "If the document contains an effective date, it should be included in your response as \
         the effective_date field. If there isn't one, omit that field.\n",
    );
    prompt.push_str(
        "If you can discern a clear title for the document, it should be included in your \
         response as the document_title field. If there isn't one, omit that field.\n",
    );
    prompt.push('\n');
    prompt.push_str("The document is as follows:\n<Document>\n");
    prompt.push_str(&format!("<FileName>{}</FileName>\n", file_name));
    for (i, page) in pages.iter().enumerate() {
        prompt.push_str(&format!(
            "<Page number=\"{}\">\n{}\n</Page>\n",
            i + 1,
            strip_successive_newlines(page)
        ));
    }
    prompt.push_str("</Document>\n");
    prompt
}

/// The service's answer, parsed strictly: unknown fields are a protocol
/// error, not an extension point.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClassification {
    category: String,
    #[serde(default)]
    document_title: Option<String>,
    #[serde(default)]
    effective_date: Option<String>,
}

/// Parse and validate a classification response body.
///
/// The category must be a member of the domain's enumeration as sent in the
/// prompt; anything else is a contract violation from the service, never a
/// new category. The default (unclassified) sentinel is not a valid answer.
pub fn parse_classification(
    body: &str,
    domain: &DomainConfig,
) -> Result<Classification, LlmError> {
    let raw: RawClassification = serde_json::from_str(body)
        .map_err(|e| LlmError::Parse(format!("classification response: {}", e)))?;

    if !domain.categories.iter().any(|c| c.id == raw.category) {
        return Err(LlmError::Contract(format!(
            "category '{}' is not in the enumeration",
            raw.category
        )));
    }

    let effective_date = match raw.effective_date.as_deref() {
        Some(s) => Some(parse_effective_date(s)?),
        None => None,
    };

    let title = raw.document_title.filter(|t| !t.trim().is_empty());

    Ok(Classification {
        category: raw.category,
        title,
        effective_date,
    })
}

/// Parse the effective date in the formats the service emits.
fn parse_effective_date(s: &str) -> Result<DateTime<Utc>, LlmError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(LlmError::Contract(format!(
        "unparseable effective_date '{}'",
        s
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn domain() -> DomainConfig {
        Config::starter_banking().domain
    }

    #[test]
    fn test_strip_successive_newlines() {
        let text = "  line one \n\n\n line two\n\n";
        assert_eq!(strip_successive_newlines(text), "line one\nline two");
    }

    #[test]
    fn test_prompt_contains_enumeration_and_pages() {
        let domain = domain();
        let pages = vec!["ΤΙΜΟΛΟΓΙΟ ΕΡΓΑΣΙΩΝ\n\nσελίδα 1".to_string(), "σελίδα 2".to_string()];
        let prompt = classification_prompt(&domain, "timologio.pdf", &pages);

        assert!(prompt.contains("<Identifier>PriceList</Identifier>"));
        assert!(prompt.contains("<FileName>timologio.pdf</FileName>"));
        assert!(prompt.contains("<Page number=\"1\">"));
        assert!(prompt.contains("<Page number=\"2\">"));
        // Blank runs inside pages are collapsed.
        assert!(prompt.contains("ΤΙΜΟΛΟΓΙΟ ΕΡΓΑΣΙΩΝ\nσελίδα 1"));
        // The sentinel is never offered to the service.
        assert!(!prompt.contains("<Identifier>Uncategorized</Identifier>"));
    }

    #[test]
    fn test_parse_valid_response() {
        let body = r#"{"category": "PriceList", "document_title": "Τιμολόγιο", "effective_date": "2025-06-02"}"#;
        let c = parse_classification(body, &domain()).unwrap();
        assert_eq!(c.category, "PriceList");
        assert_eq!(c.title.as_deref(), Some("Τιμολόγιο"));
        assert_eq!(
            c.effective_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
        );
    }

    #[test]
    fn test_parse_omitted_optional_fields() {
        let c = parse_classification(r#"{"category": "Disclosure"}"#, &domain()).unwrap();
        assert_eq!(c.category, "Disclosure");
        assert!(c.title.is_none());
        assert!(c.effective_date.is_none());
    }

    #[test]
    fn test_out_of_enumeration_category_is_contract_error() {
        let result = parse_classification(r#"{"category": "BrandNewKind"}"#, &domain());
        assert!(matches!(result, Err(LlmError::Contract(_))));
    }

    #[test]
    fn test_sentinel_category_is_not_a_valid_answer() {
        let result = parse_classification(r#"{"category": "Uncategorized"}"#, &domain());
        assert!(matches!(result, Err(LlmError::Contract(_))));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let body = r#"{"category": "PriceList", "confidence": 0.9}"#;
        assert!(matches!(
            parse_classification(body, &domain()),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn test_effective_date_formats() {
        assert!(parse_effective_date("2025-06-02T00:00:00Z").is_ok());
        assert!(parse_effective_date("2025-06-02T12:30:00").is_ok());
        assert!(parse_effective_date("2025-06-02").is_ok());
        assert!(parse_effective_date("June 2nd").is_err());
    }
}
