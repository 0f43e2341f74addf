//! Builds embed nodes and renders them as terminal text.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use url::Url;

use crate::domain::dom::{Document, Node, NodeRef};
use crate::domain::entities::{Presentation, ResolvedContent};
use crate::domain::ports::{BANNER_CLASS, EMBED_CLASS, EmbedRenderer};

/// Class of the loading placeholder.
pub const PLACEHOLDER_CLASS: &str = "link-preloader";
/// Attribute carrying the embed style name.
pub const STYLE_ATTR: &str = "data-style";

const LOADING_TEXT: &str = "Loading...";
const BANNER_TEXT: &str = "Link embeds are active";
const TEXT_WIDTH: usize = 64;
const DESCRIPTION_LINES: usize = 2;

/// Renderer producing plain element trees. The console host prints them with
/// [`render_text`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl TextRenderer {
    /// Creates the renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn text_div(doc: &Document, class: &str, text: impl Into<String>) -> NodeRef {
        doc.element("div").class(class).text(text).build()
    }

    fn header(doc: &Document, content: &ResolvedContent) -> NodeRef {
        let mut header = doc
            .element("div")
            .class("embed-header")
            .child(Self::text_div(doc, "embed-platform-name", &*content.platform));
        if content.live {
            header = header.child(doc.element("span").class("embed-live").text("LIVE").build());
        }
        header.build()
    }

    fn body(doc: &Document, content: &ResolvedContent) -> NodeRef {
        let mut details = doc
            .element("div")
            .class("embed-content")
            .child(Self::text_div(doc, "embed-title", &*content.title));
        if let Some(subtitle) = &content.subtitle {
            details = details.child(Self::text_div(doc, "embed-subtitle", subtitle));
        }
        if let Some(description) = &content.description {
            details = details.child(Self::text_div(doc, "embed-description", description));
        }
        if !content.stats.is_empty() {
            let stats = content.stats.iter().fold(
                doc.element("div").class("embed-stats"),
                |stats, (label, value)| {
                    stats.child(
                        doc.element("span")
                            .class("embed-stat")
                            .attr("data-label", label)
                            .text(value)
                            .build(),
                    )
                },
            );
            details = details.child(stats.build());
        }

        let mut body = doc.element("div").class("embed-body");
        if let Some(thumbnail) = &content.thumbnail {
            body = body.child(
                doc.element("img")
                    .class("embed-thumbnail")
                    .attr("src", thumbnail)
                    .build(),
            );
        } else {
            details = details.class("full-width");
        }
        body.child(details.build()).build()
    }
}

impl EmbedRenderer for TextRenderer {
    fn placeholder(&self, doc: &Document, url: &Url) -> NodeRef {
        doc.element("div")
            .class(PLACEHOLDER_CLASS)
            .class(EMBED_CLASS)
            .attr("data-url", url.as_str())
            .text(LOADING_TEXT)
            .build()
    }

    fn embed(
        &self,
        doc: &Document,
        content: &ResolvedContent,
        presentation: &Presentation,
    ) -> NodeRef {
        let embed = doc
            .element("div")
            .class(EMBED_CLASS)
            .class(&format!("{}-embed", content.family.tag()))
            .attr("data-href", content.url.as_str())
            .child(Self::header(doc, content))
            .child(Self::body(doc, content))
            .build();
        self.apply_presentation(&embed, presentation);
        embed
    }

    fn plain_link(&self, doc: &Document, url: &Url) -> NodeRef {
        doc.element("a")
            .attr("href", url.as_str())
            .attr("target", "_blank")
            .attr("rel", "noopener noreferrer")
            .text(url.as_str())
            .build()
    }

    fn apply_presentation(&self, embed: &NodeRef, presentation: &Presentation) {
        embed.set_attribute(STYLE_ATTR, presentation.style.as_str());
        let bounds = format!(
            "max-width:{}px;max-height:{}px",
            presentation.max_image_width, presentation.max_image_height
        );
        for node in embed.descendants() {
            if node.tag() == "img" {
                node.set_attribute("style", bounds.clone());
            }
        }
    }

    fn banner(&self, doc: &Document) -> NodeRef {
        Self::text_div(doc, BANNER_CLASS, BANNER_TEXT)
    }
}

fn descendant_text(node: &Node, class: &str) -> Option<String> {
    node.descendants()
        .into_iter()
        .find(|n| n.has_class(class))
        .map(|n| n.text_content())
        .filter(|text| !text.trim().is_empty())
}

/// Cuts `text` to at most `width` columns, marking the cut with an ellipsis.
#[must_use]
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Greedy word wrap by display width, capped at `max_lines`.
fn wrap(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.width() + 1 + word.width() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            *last = truncate_to_width(&format!("{last} …"), width);
        }
    }
    lines.into_iter().map(|line| truncate_to_width(&line, width)).collect()
}

fn framed(heading: &str, lines: &[String]) -> String {
    let inner = TEXT_WIDTH - 4;
    let heading = truncate_to_width(heading, inner - 2);
    let mut out = format!("┌ {heading} {}┐\n", "─".repeat(inner - heading.width()));
    for line in lines {
        let line = truncate_to_width(line, inner);
        out.push_str(&format!("│ {line}{} │\n", " ".repeat(inner - line.width())));
    }
    out.push('└');
    out.push_str(&"─".repeat(TEXT_WIDTH - 2));
    out.push('┘');
    out
}

/// Renders a node built by [`TextRenderer`] for a terminal.
#[must_use]
pub fn render_text(node: &Node) -> String {
    if node.tag() == "a" {
        return format!("<{}>", node.attribute("href").unwrap_or_else(|| node.text_content()));
    }
    if node.has_class(PLACEHOLDER_CLASS) {
        return format!("{LOADING_TEXT} {}", node.attribute("data-url").unwrap_or_default());
    }
    if node.has_class(BANNER_CLASS) {
        return format!("** {} **", node.text_content());
    }
    if !node.has_class(EMBED_CLASS) {
        return node.text_content();
    }

    let inner = TEXT_WIDTH - 4;
    let mut heading = descendant_text(node, "embed-platform-name").unwrap_or_default();
    if descendant_text(node, "embed-live").is_some() {
        heading.push_str(" ● LIVE");
    }

    let mut lines = Vec::new();
    if let Some(title) = descendant_text(node, "embed-title") {
        lines.push(title);
    }
    if let Some(subtitle) = descendant_text(node, "embed-subtitle") {
        lines.push(subtitle);
    }
    if let Some(description) = descendant_text(node, "embed-description") {
        lines.extend(wrap(&description, inner, DESCRIPTION_LINES));
    }
    let stats: Vec<String> = node
        .descendants()
        .into_iter()
        .filter(|n| n.has_class("embed-stat"))
        .map(|stat| match stat.attribute("data-label") {
            Some(label) => format!("{} {label}", stat.text_content()),
            None => stat.text_content(),
        })
        .collect();
    if !stats.is_empty() {
        lines.push(stats.join(" · "));
    }
    if let Some(href) = node.attribute("data-href") {
        lines.push(href);
    }
    framed(&heading, &lines)
}
