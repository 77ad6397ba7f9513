//! Final cleanup of the QC table before publishing.

use seoenrich_shared::QcRow;

/// Remove one pair of wrapping double quotes (`"x"` → `x`).
///
/// Text shorter than two characters, or quoted on one side only, is
/// returned unchanged.
pub fn strip_wrapping_quotes(text: &str) -> String {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text[1..text.len() - 1].to_string()
    } else {
        text.to_string()
    }
}

/// Strip wrapping quotes from the generated fields of every row.
///
/// Returns the rows and how many of them changed.
pub fn finalize_rows(rows: Vec<QcRow>) -> (Vec<QcRow>, usize) {
    let mut changed = 0;
    let rows = rows
        .into_iter()
        .map(|mut row| {
            let seo_title = strip_wrapping_quotes(&row.seo_title);
            let meta_description = strip_wrapping_quotes(&row.meta_description);
            if seo_title != row.seo_title || meta_description != row.meta_description {
                changed += 1;
            }
            row.seo_title = seo_title;
            row.meta_description = meta_description;
            row
        })
        .collect();
    (rows, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_one_pair() {
        assert_eq!(strip_wrapping_quotes("\"Hello\""), "Hello");
        assert_eq!(strip_wrapping_quotes("\"\"Twice\"\""), "\"Twice\"");
        assert_eq!(strip_wrapping_quotes("\"\""), "");
    }

    #[test]
    fn leaves_other_text_alone() {
        assert_eq!(strip_wrapping_quotes("Hello"), "Hello");
        assert_eq!(strip_wrapping_quotes("\"Hello"), "\"Hello");
        assert_eq!(strip_wrapping_quotes("Say \"hi\""), "Say \"hi\"");
        assert_eq!(strip_wrapping_quotes("\""), "\"");
        assert_eq!(strip_wrapping_quotes(""), "");
    }

    #[test]
    fn multibyte_content_survives() {
        assert_eq!(strip_wrapping_quotes("\"Café night\""), "Café night");
    }

    #[test]
    fn finalize_touches_generated_fields_only() {
        let rows = vec![
            QcRow {
                url: "https://x/a".into(),
                title: "\"Quoted page title\"".into(),
                seo_title: "\"Richmond Jazz Night\"".into(),
                meta_description: "Plain.".into(),
            },
            QcRow {
                url: "https://x/b".into(),
                title: "B".into(),
                seo_title: "B Title".into(),
                meta_description: "B description.".into(),
            },
        ];

        let (out, changed) = finalize_rows(rows.clone());
        assert_eq!(changed, 1);
        assert_eq!(out[0].seo_title, "Richmond Jazz Night");
        assert_eq!(out[0].title, "\"Quoted page title\"");
        assert_eq!(out[1], rows[1]);
    }
}
