//! Certificate page extraction
//!
//! The upstream success page carries the course name in a styled `<h1>` and
//! the student name, completion date, and duration in the first three
//! `<strong>` tags, in that order. This grammar is the stable extraction
//! contract; a page without the course heading is not a certificate page.

use scraper::{Html, Selector};

/// The course-name heading that marks a valid certificate page
const COURSE_SELECTOR: &str = r#"h1[style="color: #002347;font-size: 25px;"]"#;

/// Fields extracted from a certificate verification page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFields {
    pub course_name: String,
    pub student_name: String,
    pub completion_date: String,
    pub duration: String,
}

/// Parses a certificate page body into its fields
///
/// Returns `None` if the body does not contain the course heading, i.e. the
/// page is 2xx but structurally not a certificate. Missing `<strong>` tags
/// degrade to empty fields rather than rejecting the page; the course
/// heading alone decides validity.
pub fn parse_certificate(html: &str) -> Option<CertificateFields> {
    let document = Html::parse_document(html);

    let course_selector = Selector::parse(COURSE_SELECTOR).ok()?;
    let course_name = document
        .select(&course_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())?;

    let strong_selector = Selector::parse("strong").ok()?;
    let mut strongs = document
        .select(&strong_selector)
        .map(|el| el.text().collect::<String>().trim().to_string());

    Some(CertificateFields {
        course_name,
        student_name: strongs.next().unwrap_or_default(),
        completion_date: strongs.next().unwrap_or_default(),
        duration: strongs.next().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A representative verification page body
    pub(crate) fn certificate_page(course: &str, student: &str, date: &str, duration: &str) -> String {
        format!(
            r#"<html><body>
            <h1 style="color: #002347;font-size: 25px;">{course}</h1>
            <p>Bu sertifikat <strong>{student}</strong> tərəfindən</p>
            <p>Tarix: <strong>{date}</strong></p>
            <p>Müddət: <strong>{duration}</strong></p>
            </body></html>"#
        )
    }

    #[test]
    fn test_parse_valid_page() {
        let html = certificate_page(
            "Oracle Database SQL",
            "Tural Garayev",
            "30 Dekabr 2023",
            "3 ay",
        );
        let fields = parse_certificate(&html).unwrap();
        assert_eq!(fields.course_name, "Oracle Database SQL");
        assert_eq!(fields.student_name, "Tural Garayev");
        assert_eq!(fields.completion_date, "30 Dekabr 2023");
        assert_eq!(fields.duration, "3 ay");
    }

    #[test]
    fn test_missing_course_heading_rejected() {
        let html = r#"<html><body><h1>Generic landing page</h1>
            <strong>Not a certificate</strong></body></html>"#;
        assert!(parse_certificate(html).is_none());
    }

    #[test]
    fn test_unstyled_heading_rejected() {
        // The course heading is identified by its exact inline style.
        let html = r#"<html><body>
            <h1 style="font-size: 25px;">Some Course</h1>
            <strong>Someone</strong></body></html>"#;
        assert!(parse_certificate(html).is_none());
    }

    #[test]
    fn test_missing_strong_tags_degrade_to_empty() {
        let html = r#"<html><body>
            <h1 style="color: #002347;font-size: 25px;">Data Analitikası</h1>
            </body></html>"#;
        let fields = parse_certificate(html).unwrap();
        assert_eq!(fields.course_name, "Data Analitikası");
        assert_eq!(fields.student_name, "");
        assert_eq!(fields.completion_date, "");
        assert_eq!(fields.duration, "");
    }

    #[test]
    fn test_whitespace_trimmed() {
        let html = r#"<html><body>
            <h1 style="color: #002347;font-size: 25px;">
                Kibertəhlükəsizlik
            </h1>
            <strong> Aysel Mammadova </strong></body></html>"#;
        let fields = parse_certificate(html).unwrap();
        assert_eq!(fields.course_name, "Kibertəhlükəsizlik");
        assert_eq!(fields.student_name, "Aysel Mammadova");
    }
}
