//! HTML markup for report documents.
//!
//! The layout is a right-to-left Hebrew page: a logo, a title, the employee line and a
//! two-column status/section table. Sections that carry image slots get a second row with
//! one `<img class="photo">` per slot. The generation timestamp is rendered last, in its own
//! `<footer class="generated-at">`, and nowhere else.

use crate::report::RenderedSection;
use chrono::{DateTime, SecondsFormat, Utc};

const TITLE: &str = "דוח סגירת סניף";
const EMPLOYEE_LABEL: &str = "שם עובד:";
const STATUS_HEADER: &str = "סטטוס";
const SECTION_HEADER: &str = "סעיף";
const DONE_LABEL: &str = "בוצע";
const NOT_DONE_LABEL: &str = "לא בוצע";
const GENERATED_LABEL: &str = "הופק:";

const STYLE: &str = "\
body { font-family: sans-serif; text-align: center; direction: rtl; }
table { width: 90%; border-collapse: collapse; margin: auto; margin-top: 20px; }
th, td { border: 1px solid #aaa; padding: 10px; text-align: center; }
.done { color: green; font-weight: bold; }
.fail { color: red; font-weight: bold; }
img.logo { width: 150px; margin-top: 20px; }
img.photo { width: 150px; margin: 5px; border: 1px solid #ccc; }
footer.generated-at { margin-top: 20px; color: #777; font-size: small; }
";

/// One section with the `src` of each of its image slots, in slot order.
pub(crate) struct SectionMarkup<'a> {
    pub section: &'a RenderedSection,
    pub sources: Vec<&'a str>,
}

/// Renders the whole document.
pub(crate) fn render(
    employee_name: &str,
    logo_src: &str,
    sections: &[SectionMarkup<'_>],
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html lang=\"he\" dir=\"rtl\"><head><meta charset=\"UTF-8\">");
    out.push_str(&format!("<title>{TITLE}</title>\n<style>\n{STYLE}</style></head><body>\n"));
    out.push_str(&format!(
        "<img src=\"{}\" class=\"logo\" alt=\"\">\n",
        escape(logo_src)
    ));
    out.push_str(&format!("<h2>{TITLE}</h2>\n"));
    out.push_str(&format!(
        "<p><b>{EMPLOYEE_LABEL}</b> {}</p>\n",
        escape(employee_name)
    ));
    out.push_str(&format!(
        "<table><tr><th>{STATUS_HEADER}</th><th>{SECTION_HEADER}</th></tr>\n"
    ));

    for markup in sections {
        push_section(&mut out, markup);
    }

    out.push_str("</table>\n");
    out.push_str(&format!(
        "<footer class=\"generated-at\">{GENERATED_LABEL} {}</footer>\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str("</body></html>\n");
    out
}

fn push_section(out: &mut String, markup: &SectionMarkup<'_>) {
    let (class, label) = status_marker(markup.section.done);
    out.push_str(&format!(
        "<tr class=\"section\"><td class=\"{class}\">{label}</td><td>{}</td></tr>\n",
        escape(&markup.section.text)
    ));

    if markup.sources.is_empty() {
        return;
    }
    out.push_str("<tr class=\"images\"><td colspan=\"2\">");
    for src in &markup.sources {
        out.push_str(&image_tag(src));
    }
    out.push_str("</td></tr>\n");
}

/// Markup for one image slot. Real and fallback images share it.
pub(crate) fn image_tag(src: &str) -> String {
    format!("<img src=\"{}\" class=\"photo\" alt=\"\">", escape(src))
}

pub(crate) fn status_marker(done: bool) -> (&'static str, &'static str) {
    if done {
        ("done", DONE_LABEL)
    } else {
        ("fail", NOT_DONE_LABEL)
    }
}

/// Escapes text for use in element content and double-quoted attributes.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
