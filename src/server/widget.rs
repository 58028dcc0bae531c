//! The chat widget page.

use crate::config::UiSettings;

const TEMPLATE: &str = include_str!("../../assets/chat.html");

/// Render the widget with the configured labels and examples.
pub fn render_page(ui: &UiSettings) -> String {
    let examples = ui
        .examples
        .iter()
        .map(|example| {
            format!(
                r#"<button type="button" class="example">{}</button>"#,
                escape_html(example)
            )
        })
        .collect::<Vec<_>>()
        .join("\n        ");

    let avatar = if ui.avatar_path.is_some() { "/avatar" } else { "" };

    TEMPLATE
        .replace("{{title}}", &escape_html(&ui.title))
        .replace("{{chatbot_label}}", &escape_html(&ui.chatbot_label))
        .replace("{{placeholder}}", &escape_html(&ui.placeholder))
        .replace("{{submit_label}}", &escape_html(&ui.submit_label))
        .replace("{{stop_label}}", &escape_html(&ui.stop_label))
        .replace("{{avatar}}", avatar)
        .replace("{{examples}}", &examples)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
