//! HTML cleaning utilities
//!
//! Strips non-content markup before HTML is stored or handed to a backend.
//! The scanner works on the raw string: text between tags is copied
//! byte-for-byte, kept tags are re-emitted with their surviving attributes.

/// Elements removed together with everything inside them
const DROPPED_CONTAINERS: &[&str] = &[
    "script", "style", "noscript", "svg", "nav", "header", "footer", "aside", "form", "iframe",
    "button", "select", "textarea",
];

/// Content-less elements that are removed
const DROPPED_VOID: &[&str] = &["img", "input"];

/// Elements whose body is raw text and may contain `<`
const RAW_TEXT: &[&str] = &["script", "style"];

/// Which attributes survive cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributePolicy {
    /// Drop styling and behavior attributes (`style`, `class`, `id`, `data-*`, `on*`)
    Presentational,
    /// Drop every attribute
    All,
}

impl AttributePolicy {
    fn keeps(&self, name: &str) -> bool {
        match self {
            AttributePolicy::All => false,
            AttributePolicy::Presentational => !is_presentational_attribute(name),
        }
    }
}

/// Clean HTML, dropping non-content elements, comments and presentational attributes
///
/// Pure: the same input always yields the same output.
pub fn clean_html(html: &str) -> String {
    scan(html, AttributePolicy::Presentational, true)
}

/// Remove every attribute, keeping all elements, text and comments
pub fn strip_attributes(html: &str) -> String {
    scan(html, AttributePolicy::All, false)
}

fn scan(html: &str, policy: AttributePolicy, drop_markup: bool) -> String {
    let mut output = String::with_capacity(html.len());
    let mut skip_elements: Vec<String> = Vec::new();
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        let (text, markup) = rest.split_at(start);
        if skip_elements.is_empty() {
            output.push_str(text);
        }

        // Comments, including the empty forms `<!-->` and `<!--->`
        if let Some(body) = markup.strip_prefix("<!--") {
            let len = if body.starts_with('>') {
                1
            } else if body.starts_with("->") {
                2
            } else {
                body.find("-->").map(|end| end + 3).unwrap_or(body.len())
            };
            if !drop_markup {
                output.push_str(&markup[..4 + len]);
            }
            rest = &body[len..];
            continue;
        }

        // A bare '<' (e.g. "a < b") is text
        let opens_tag = markup[1..]
            .starts_with(|c: char| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        if !opens_tag {
            if skip_elements.is_empty() {
                output.push('<');
            }
            rest = &markup[1..];
            continue;
        }

        let Some(end) = find_tag_end(markup) else {
            // Unterminated tag: keep the remainder as text
            if skip_elements.is_empty() {
                output.push_str(markup);
            }
            rest = "";
            break;
        };
        let raw = &markup[1..end];
        rest = &markup[end + 1..];

        // Doctype, CDATA, processing instructions
        if raw.starts_with('!') || raw.starts_with('?') {
            if skip_elements.is_empty() {
                output.push_str(&markup[..=end]);
            }
            continue;
        }

        let tag = parse_tag(raw);
        let name = tag.name.as_str();
        let raw_text = !tag.closing && !tag.self_closing && RAW_TEXT.contains(&name);

        if drop_markup && DROPPED_CONTAINERS.contains(&name) {
            if tag.closing {
                if let Some(pos) = skip_elements.iter().rposition(|t| t == name) {
                    skip_elements.truncate(pos);
                }
            } else if raw_text {
                rest = &rest[raw_text_len(rest, name)..];
                rest = rest.find('>').map(|gt| &rest[gt + 1..]).unwrap_or("");
            } else if !tag.self_closing {
                skip_elements.push(name.to_string());
            }
            continue;
        }

        if !skip_elements.is_empty() || (drop_markup && DROPPED_VOID.contains(&name)) {
            continue;
        }

        write_tag(&mut output, &tag, policy);
        if raw_text {
            let len = raw_text_len(rest, name);
            output.push_str(&rest[..len]);
            rest = &rest[len..];
        }
    }

    if skip_elements.is_empty() {
        output.push_str(rest);
    }

    output
}

/// Attributes used only for styling or behavior
fn is_presentational_attribute(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    matches!(name.as_str(), "style" | "class" | "id")
        || name.starts_with("data-")
        || (name.starts_with("on") && name.len() > 2 && name != "open")
}

struct Tag<'a> {
    name: String,
    closing: bool,
    self_closing: bool,
    attributes: Vec<Attribute<'a>>,
}

struct Attribute<'a> {
    name: &'a str,
    /// Raw value as written, quotes included
    value: Option<&'a str>,
}

/// Byte index of the `>` closing the tag that starts `markup`
///
/// Quotes only count when they open an attribute value.
fn find_tag_end(markup: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut after_equals = false;

    for (i, c) in markup.char_indices().skip(1) {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '>' => return Some(i),
                '"' | '\'' if after_equals => quote = Some(c),
                _ => {}
            },
        }
        if !c.is_whitespace() {
            after_equals = c == '=';
        }
    }

    None
}

fn parse_tag(raw: &str) -> Tag<'_> {
    let (closing, body) = match raw.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, raw),
    };
    let body = body.trim_end();
    let (self_closing, body) = match body.strip_suffix('/') {
        Some(body) => (true, body),
        None => (false, body),
    };

    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());

    Tag {
        name: body[..name_end].to_ascii_lowercase(),
        closing,
        self_closing,
        attributes: parse_attributes(&body[name_end..]),
    }
}

fn parse_attributes(s: &str) -> Vec<Attribute<'_>> {
    let mut attributes = Vec::new();
    let mut rest = s.trim_start();

    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let mut value = None;
        if let Some(after) = rest.strip_prefix('=') {
            let after = after.trim_start();
            let value_end = match after.chars().next() {
                Some(q @ ('"' | '\'')) => after[1..].find(q).map(|i| i + 2).unwrap_or(after.len()),
                _ => after.find(char::is_whitespace).unwrap_or(after.len()),
            };
            value = Some(&after[..value_end]);
            rest = after[value_end..].trim_start();
        }

        if !name.is_empty() {
            attributes.push(Attribute { name, value });
        }
    }

    attributes
}

/// Length of a raw-text element body, up to its closing tag or the end
fn raw_text_len(rest: &str, name: &str) -> usize {
    let closing = format!("</{}", name);
    rest.to_ascii_lowercase()
        .find(&closing)
        .unwrap_or(rest.len())
}

fn write_tag(output: &mut String, tag: &Tag<'_>, policy: AttributePolicy) {
    output.push('<');
    if tag.closing {
        output.push('/');
    }
    output.push_str(&tag.name);
    if !tag.closing {
        for attribute in tag.attributes.iter().filter(|a| policy.keeps(a.name)) {
            output.push(' ');
            output.push_str(attribute.name);
            if let Some(value) = attribute.value {
                output.push('=');
                output.push_str(value);
            }
        }
    }
    if tag.self_closing {
        output.push_str(" /");
    }
    output.push('>');
}
