use std::fmt::Write as _;

use breakfast_core::Breakfast;

/// Renders the breakfast page.
#[must_use]
pub fn render(breakfast: &Breakfast) -> String {
    let mut page = String::with_capacity(512);
    page.push_str("<html><head><title>Breakfast Solutions</title>\n");
    page.push_str("<style>body { margin: 2em auto; max-width: 500px; }</style></head>\n");
    page.push_str("<h1>Breakfast Solutions</h1>\n");
    let _ = writeln!(page, "<h2>{}</h2>", escape(&breakfast.name));
    page.push_str("<br/>\n");
    let _ = writeln!(
        page,
        r#"<img src="{}" style="max-width:500px;"/>"#,
        escape(&breakfast.image)
    );
    page.push_str("<br/>\n<br/>\n");
    let _ = writeln!(page, "{}", escape(&breakfast.description));
    page.push_str("<br/>\n");
    let _ = writeln!(page, r#"<a href="/breakfasts/{}">Permalink</a>"#, breakfast.id);
    page.push_str("</body></html>\n");
    page
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pancakes() -> Breakfast {
        Breakfast {
            id: 42,
            name: "Pancakes".to_string(),
            image: "/images/pancakes.jpg".to_string(),
            description: "Fluffy & golden.".to_string(),
        }
    }

    #[test]
    fn page_contains_record_fields_and_permalink() {
        let page = render(&pancakes());
        assert!(page.contains("<title>Breakfast Solutions</title>"));
        assert!(page.contains("<h2>Pancakes</h2>"));
        assert!(page.contains(r#"<img src="/images/pancakes.jpg""#));
        assert!(page.contains(r#"<a href="/breakfasts/42">Permalink</a>"#));
    }

    #[test]
    fn text_is_escaped() {
        let mut b = pancakes();
        b.name = "<script>alert('x')</script>".to_string();
        b.image = r#"" onerror="x"#.to_string();
        let page = render(&b);
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(page.contains("&#34; onerror=&#34;x"));
        assert!(page.contains("Fluffy &amp; golden."));
    }
}
