//! Structured page content and its two serializations: Confluence storage
//! format (what the service stores) and wiki markup (local output).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Code(String),
    PageLink { title: String, label: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(Vec<Inline>),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupDocument {
    pub blocks: Vec<Block>,
}

impl Inline {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn code(value: impl Into<String>) -> Self {
        Self::Code(value.into())
    }

    pub fn link(title: impl Into<String>, label: impl Into<String>) -> Self {
        Self::PageLink {
            title: title.into(),
            label: label.into(),
        }
    }
}

impl MarkupDocument {
    pub fn heading(&mut self, level: u8, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Heading {
            level: level.clamp(1, 6),
            text: text.into(),
        });
        self
    }

    pub fn paragraph(&mut self, inlines: Vec<Inline>) -> &mut Self {
        self.blocks.push(Block::Paragraph(inlines));
        self
    }

    pub fn table(&mut self, header: Vec<String>, rows: Vec<Vec<Vec<Inline>>>) -> &mut Self {
        self.blocks.push(Block::Table { header, rows });
        self
    }

    /// Titles of every page this document links to, in document order.
    pub fn link_targets(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Heading { .. } => {}
                Block::Paragraph(inlines) => collect_link_targets(inlines, &mut targets),
                Block::Table { rows, .. } => {
                    for cell in rows.iter().flatten() {
                        collect_link_targets(cell, &mut targets);
                    }
                }
            }
        }
        targets
    }

    pub fn to_storage(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                Block::Heading { level, text } => {
                    out.push_str(&format!("<h{level}>{}</h{level}>", escape_xml(text)));
                }
                Block::Paragraph(inlines) => {
                    out.push_str("<p>");
                    push_storage_inlines(&mut out, inlines);
                    out.push_str("</p>");
                }
                Block::Table { header, rows } => {
                    out.push_str("<table><tbody><tr>");
                    for cell in header {
                        out.push_str(&format!("<th>{}</th>", escape_xml(cell)));
                    }
                    out.push_str("</tr>");
                    for row in rows {
                        out.push_str("<tr>");
                        for cell in row {
                            out.push_str("<td>");
                            push_storage_inlines(&mut out, cell);
                            out.push_str("</td>");
                        }
                        out.push_str("</tr>");
                    }
                    out.push_str("</tbody></table>");
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn to_wiki(&self) -> String {
        let mut sections = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let rendered = match block {
                Block::Heading { level, text } => format!("h{level}. {}", escape_wiki(text)),
                Block::Paragraph(inlines) => wiki_inlines(inlines),
                Block::Table { header, rows } => {
                    let mut lines = Vec::with_capacity(rows.len() + 1);
                    let header = header
                        .iter()
                        .map(|cell| escape_wiki(cell))
                        .collect::<Vec<_>>();
                    lines.push(format!("||{}||", header.join("||")));
                    for row in rows {
                        let cells = row
                            .iter()
                            .map(|cell| {
                                let value = wiki_inlines(cell);
                                if value.is_empty() { " ".to_string() } else { value }
                            })
                            .collect::<Vec<_>>();
                        lines.push(format!("|{}|", cells.join("|")));
                    }
                    lines.join("\n")
                }
            };
            sections.push(rendered);
        }
        let mut out = sections.join("\n\n");
        out.push('\n');
        out
    }
}

fn collect_link_targets<'a>(inlines: &'a [Inline], targets: &mut Vec<&'a str>) {
    for inline in inlines {
        if let Inline::PageLink { title, .. } = inline {
            targets.push(title.as_str());
        }
    }
}

fn push_storage_inlines(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match inline {
            Inline::Text(value) => out.push_str(&escape_xml(value)),
            Inline::Code(value) => out.push_str(&format!("<code>{}</code>", escape_xml(value))),
            Inline::PageLink { title, label } => {
                out.push_str(&format!(
                    "<ac:link><ri:page ri:content-title=\"{}\" /><ac:plain-text-link-body><![CDATA[{}]]></ac:plain-text-link-body></ac:link>",
                    escape_attribute(title),
                    label.replace("]]>", "]]]]><![CDATA[>")
                ));
            }
        }
    }
}

fn wiki_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(value) => out.push_str(&escape_wiki(value)),
            Inline::Code(value) => out.push_str(&format!("{{{{{}}}}}", escape_wiki(value))),
            Inline::PageLink { title, label } => {
                out.push_str(&format!("[{}|{}]", escape_wiki(label), escape_wiki(title)));
            }
        }
    }
    out
}

pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    escape_xml(value).replace('"', "&quot;")
}

fn escape_wiki(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '[' | ']' | '{' | '}' | '|' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}
