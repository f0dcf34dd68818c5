use scraper::{ElementRef, Html, Selector};

/// Renders inflection tables as plain text: one line per table row, cells
/// separated by ` | `. Markup outside tables is flattened to its text.
pub fn render_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let (Ok(row_selector), Ok(cell_selector)) = (Selector::parse("tr"), Selector::parse("th, td"))
    else {
        return String::new();
    };

    let lines: Vec<String> = fragment
        .select(&row_selector)
        .map(|row| {
            row.select(&cell_selector)
                .map(|cell| cell_text(&cell))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        return cell_text(&fragment.root_element());
    }
    lines.join("\n")
}

fn cell_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
