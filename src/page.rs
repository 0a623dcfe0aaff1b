//! HTML page shell: header with search, filter panel, map container, footer.

use crate::datasets::SearchHit;
use crate::filter::FilterPanel;
use crate::params;
use crate::types::{Level, Selection};
use std::fmt::Write;

const TITLE: &str = "Nepal Visual - Geographic Mapping";
const MAPLIBRE_VERSION: &str = "4.7.1";

pub struct Page<'a> {
    pub panel: &'a FilterPanel,
    pub search: &'a str,
    pub hits: &'a [SearchHit],
}

pub fn render(page: &Page<'_>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/maplibre-gl@{v}/dist/maplibre-gl.css">
<link rel="stylesheet" href="/static/atlas.css">
</head>
<body>
"#,
        title = TITLE,
        v = MAPLIBRE_VERSION,
    );
    render_header(&mut html, page.panel.selection(), page.search);
    html.push_str("<main>\n");
    render_filters(&mut html, page.panel);
    if !page.search.is_empty() {
        render_hits(&mut html, page.hits);
    }
    html.push_str("<div id=\"map\"></div>\n</main>\n");
    render_footer(&mut html);
    let _ = write!(
        html,
        "<script src=\"https://unpkg.com/maplibre-gl@{v}/dist/maplibre-gl.js\"></script>\n<script src=\"/static/atlas.js\"></script>\n</body>\n</html>\n",
        v = MAPLIBRE_VERSION,
    );
    html
}

fn render_header(html: &mut String, selection: &Selection, search: &str) {
    html.push_str(
        "<header>\n<a class=\"brand\" href=\"/\">Nepal Visual</a>\n<form class=\"search\" method=\"get\" action=\"/\">\n",
    );
    // Searching keeps the current selection in the URL.
    for level in Level::ALL {
        let value = selection.get(level);
        if !value.is_empty() {
            let _ = writeln!(
                html,
                "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
                level.as_param(),
                escape_html(value)
            );
        }
    }
    let _ = write!(
        html,
        "<input type=\"search\" name=\"q\" placeholder=\"Search provinces, districts, municipalities\" value=\"{}\">\n</form>\n</header>\n",
        escape_html(search)
    );
}

fn render_filters(html: &mut String, panel: &FilterPanel) {
    html.push_str("<aside class=\"filters\">\n");
    for level in Level::ALL {
        let selected = panel.selection().get(level);
        let options = panel.options_for(level);
        let disabled = if options.is_empty() && selected.is_empty() {
            " disabled"
        } else {
            ""
        };
        let _ = writeln!(
            html,
            "<label>{label}<select data-level=\"{level}\"{disabled}>",
            label = capitalize(level.as_param()),
        );
        let _ = writeln!(html, "<option value=\"\">All</option>");
        for option in options {
            let mark = if option.value == selected { " selected" } else { "" };
            let _ = writeln!(
                html,
                "<option value=\"{}\"{}>{}</option>",
                escape_html(&option.value),
                mark,
                escape_html(&option.name)
            );
        }
        html.push_str("</select></label>\n");
    }
    html.push_str("<a class=\"reset\" href=\"/\">Reset filters</a>\n</aside>\n");
}

fn render_hits(html: &mut String, hits: &[SearchHit]) {
    html.push_str("<ul class=\"search-results\">\n");
    if hits.is_empty() {
        html.push_str("<li>No matches</li>\n");
    }
    for hit in hits {
        let Ok(query) = params::encode(&hit.selection) else {
            continue;
        };
        let _ = writeln!(
            html,
            "<li><a href=\"/?{}\">{}</a> <span>{}</span></li>",
            escape_html(&query),
            escape_html(hit.name),
            hit.level
        );
    }
    html.push_str("</ul>\n");
}

fn render_footer(html: &mut String) {
    html.push_str("<footer>Boundary data shown for reference only.</footer>\n");
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn escape_html(text: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Catalog;
    use std::sync::Arc;

    fn panel_for(selection: &Selection) -> FilterPanel {
        FilterPanel::from_selection(Arc::new(Catalog::builtin()), selection)
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn renders_selected_options_and_disables_empty_levels() {
        let panel = panel_for(&Selection {
            country: "nepal".into(),
            province: "province3".into(),
            ..Selection::default()
        });
        let html = render(&Page {
            panel: &panel,
            search: "",
            hits: &[],
        });

        assert!(html.contains("<option value=\"province3\" selected>Bagmati Province</option>"));
        assert!(html.contains("<option value=\"kathmandu\">Kathmandu</option>"));
        assert!(html.contains("<select data-level=\"municipality\" disabled>"));
        assert!(!html.contains("search-results"));
        assert!(html.contains("<script src=\"/static/atlas.js\"></script>"));
    }

    #[test]
    fn search_form_carries_current_selection() {
        let panel = panel_for(&Selection {
            country: "nepal".into(),
            province: "province4".into(),
            ..Selection::default()
        });
        let html = render(&Page {
            panel: &panel,
            search: "",
            hits: &[],
        });

        assert!(html.contains("<input type=\"hidden\" name=\"country\" value=\"nepal\">"));
        assert!(html.contains("<input type=\"hidden\" name=\"province\" value=\"province4\">"));
        assert!(!html.contains("name=\"district\""));
    }

    #[test]
    fn search_hits_link_to_their_selection() {
        let catalog = Catalog::builtin();
        let hits = catalog.search("bhaktapur");
        let panel = panel_for(&Selection::default());
        let html = render(&Page {
            panel: &panel,
            search: "bhaktapur",
            hits: &hits,
        });

        assert!(html.contains(
            "<a href=\"/?country=nepal&amp;province=province3&amp;district=bhaktapur\">Bhaktapur</a>"
        ));
        assert!(html.contains("value=\"bhaktapur\""));
    }

    #[test]
    fn empty_search_says_so() {
        let panel = panel_for(&Selection::default());
        let html = render(&Page {
            panel: &panel,
            search: "zzz",
            hits: &[],
        });
        assert!(html.contains("<li>No matches</li>"));
    }
}
