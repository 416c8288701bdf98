//! Fence-aware container scanner.
//!
//! Rewrites block-level custom directives into HTML blocks before the text
//! reaches pulldown-cmark:
//!
//! - `:::encrypted{password="…"}` … `:::` → `<div class="encrypted-block" data-password="…">`
//! - `:::style [no-icon]` … `:::` → `<div class="note-block note-style">`
//! - `+++style Title` … `+++` → `<details class="collapse-block collapse-style">`
//! - `;;;id Title` … `;;;` → tab panels, grouped by id (see [`crate::tabs`])
//! - `{% links %}` … `{% endlinks %}` and `{% media audio|video %}` … `{% endmedia %}`
//!
//! The scanner is a stack machine: an opener pushes a frame, lines go into the
//! innermost frame's output, and a closer of the same syntax family pops the
//! frame and writes its HTML into the parent. Frame bodies are therefore
//! scanned at `depth + 1` without recursion. Past
//! [`MAX_CONTAINER_DEPTH`] frames are kept verbatim and only count nesting.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::attrs::Attributes;
use crate::fence::FenceTracker;
use crate::hexo::{self, MediaKind};
use crate::tabs::{BlockOutput, TabPanel};
use crate::util::escape_html;

/// Default nesting limit for container directives.
pub const MAX_CONTAINER_DEPTH: usize = 10;

static ENCRYPTED_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:::encrypted(?:\s*\{(.*)\})?$").expect("invalid encrypted opener regex")
});

static NOTE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:::(\w+)(\s+no-icon)?$").expect("invalid note opener regex"));

static COLLAPSE_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+\+\+(\w+)\s+(.+)$").expect("invalid collapse opener regex")
});

static TAB_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^;;;(\S+)\s+(.+)$").expect("invalid tab opener regex"));

static LINKS_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{%\s*links\s*%\}$").expect("invalid links opener regex"));

static LINKS_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{%\s*endlinks\s*%\}$").expect("invalid links closer regex"));

static MEDIA_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{%\s*media\s+(\w+)\s*%\}$").expect("invalid media opener regex")
});

static MEDIA_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{%\s*endmedia\s*%\}$").expect("invalid media closer regex"));

/// Which directives the scanner recognizes.
#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// `:::`, `+++` and `;;;` containers.
    pub containers: bool,
    /// `{% links %}` and `{% media %}` tag pairs.
    pub hexo_tags: bool,
    /// Frames deeper than this are copied verbatim.
    pub max_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            containers: true,
            hexo_tags: true,
            max_depth: MAX_CONTAINER_DEPTH,
        }
    }
}

/// Syntax family: an opener is closed only by a closer of its own family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    Colon,
    Plus,
    Semicolon,
    Links,
    Media,
}

impl Family {
    fn closer(self) -> &'static str {
        match self {
            Self::Colon => ":::",
            Self::Plus => "+++",
            Self::Semicolon => ";;;",
            Self::Links => "{% endlinks %}",
            Self::Media => "{% endmedia %}",
        }
    }

    /// Hexo tag bodies are YAML and are collected raw.
    fn is_raw(self) -> bool {
        matches!(self, Self::Links | Self::Media)
    }
}

/// A recognized container directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    /// `:::style`, with the icon suppressed by `no-icon`.
    Note { style: String, icon: bool },
    /// `+++style Title`.
    Collapse { style: String, title: String },
    /// `;;;group Title`.
    TabPanel { group: String, title: String },
    /// `:::encrypted{…}`; the password travels in `attrs`.
    Encrypted { attrs: Attributes },
    /// `{% links %}`.
    Links,
    /// `{% media audio|video %}`.
    Media { kind: MediaKind },
}

impl ContainerKind {
    fn family(&self) -> Family {
        match self {
            Self::Note { .. } | Self::Encrypted { .. } => Family::Colon,
            Self::Collapse { .. } => Family::Plus,
            Self::TabPanel { .. } => Family::Semicolon,
            Self::Links => Family::Links,
            Self::Media { .. } => Family::Media,
        }
    }
}

/// What a frame holds: a real container, or nesting past the depth limit.
#[derive(Debug)]
enum FrameKind {
    Container(ContainerKind),
    Verbatim(Family),
}

/// One open directive on the scanner stack.
#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Opener line as written, for verbatim output.
    opener: String,
    /// 1-based line of the opener.
    line: usize,
    out: BlockOutput,
}

impl Frame {
    fn family(&self) -> Family {
        match &self.kind {
            FrameKind::Container(kind) => kind.family(),
            FrameKind::Verbatim(family) => *family,
        }
    }

    fn collects_raw(&self) -> bool {
        matches!(&self.kind, FrameKind::Container(kind) if kind.family().is_raw())
    }
}

/// Classified line outside code fences.
enum Directive {
    Open(ContainerKind),
    Close(Family),
}

/// Line scanner turning container directives into HTML blocks.
///
/// # Example
///
/// ```
/// use quill_markup::{ContainerScanner, ScanOptions};
///
/// let mut scanner = ContainerScanner::new(ScanOptions::default());
/// let output = scanner.scan(":::info\n:::warn\ntext\n:::\n:::\n");
///
/// assert!(output.contains(r#"<div class="note-block note-info">"#));
/// assert!(output.contains(r#"<div class="note-block note-warn">"#));
/// assert!(scanner.warnings().is_empty());
/// ```
pub struct ContainerScanner {
    options: ScanOptions,
    warnings: Vec<String>,
    next_tab_seq: usize,
}

impl ContainerScanner {
    /// Create a scanner with the given options.
    #[must_use]
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            warnings: Vec::new(),
            next_tab_seq: 0,
        }
    }

    /// Warnings generated during scanning.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Consume the scanner and return its warnings.
    #[must_use]
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }

    /// Rewrite directives in `input`.
    ///
    /// Returns the input unchanged when no directive is recognized.
    #[must_use]
    pub fn scan(&mut self, input: &str) -> String {
        let mut stack: Vec<Frame> = Vec::new();
        let mut root = BlockOutput::default();
        let mut fence = FenceTracker::new();
        let mut changed = false;

        for (idx, line) in input.lines().enumerate() {
            let line_num = idx + 1;
            let trimmed = line.trim();

            if let Some(top) = stack.last_mut()
                && top.collects_raw()
            {
                if self.closes_family(trimmed) == Some(top.family()) {
                    self.pop_frame(&mut stack, &mut root, true);
                } else {
                    top.out.push_verbatim(line);
                }
                continue;
            }

            let fence_line = fence.update(line);
            if fence_line || fence.in_fence() {
                current(&mut stack, &mut root).push_line(line);
                continue;
            }

            match self.classify(trimmed, line_num) {
                Some(Directive::Close(family)) => {
                    if stack.last().is_some_and(|frame| frame.family() == family) {
                        self.pop_frame(&mut stack, &mut root, true);
                    } else {
                        if stack.is_empty() {
                            self.warn(format!(
                                "line {line_num}: stray {} with no opening directive",
                                family.closer()
                            ));
                        }
                        current(&mut stack, &mut root).push_line(line);
                    }
                }
                Some(Directive::Open(kind)) => {
                    changed = true;
                    let kind = if stack.len() >= self.options.max_depth {
                        let family = kind.family();
                        if stack
                            .last()
                            .is_some_and(|frame| matches!(frame.kind, FrameKind::Container(_)))
                        {
                            self.warn(format!(
                                "line {line_num}: containers nested deeper than {} levels, passing through",
                                self.options.max_depth
                            ));
                        }
                        FrameKind::Verbatim(family)
                    } else {
                        FrameKind::Container(kind)
                    };
                    stack.push(Frame {
                        kind,
                        opener: line.to_owned(),
                        line: line_num,
                        out: BlockOutput::default(),
                    });
                }
                None => current(&mut stack, &mut root).push_line(line),
            }
        }

        while !stack.is_empty() {
            self.pop_frame(&mut stack, &mut root, false);
        }

        if !changed {
            return input.to_owned();
        }

        let mut output = root.finish();
        if !input.ends_with('\n') && output.ends_with('\n') {
            output.pop();
        }
        output
    }

    /// Classify a trimmed line as an opener or closer, honoring options.
    fn classify(&mut self, trimmed: &str, line_num: usize) -> Option<Directive> {
        if let Some(family) = self.closes_family(trimmed) {
            return Some(Directive::Close(family));
        }

        if self.options.containers {
            if let Some(caps) = ENCRYPTED_OPEN.captures(trimmed) {
                let attrs = match caps.get(1) {
                    Some(body) => Attributes::parse(body.as_str()).unwrap_or_else(|| {
                        self.warn(format!(
                            "line {line_num}: unrecognized attributes on :::encrypted"
                        ));
                        Attributes::default()
                    }),
                    None => Attributes::default(),
                };
                return Some(Directive::Open(ContainerKind::Encrypted { attrs }));
            }
            if let Some(caps) = NOTE_OPEN.captures(trimmed) {
                return Some(Directive::Open(ContainerKind::Note {
                    style: caps[1].to_owned(),
                    icon: caps.get(2).is_none(),
                }));
            }
            if let Some(caps) = COLLAPSE_OPEN.captures(trimmed) {
                return Some(Directive::Open(ContainerKind::Collapse {
                    style: caps[1].to_owned(),
                    title: caps[2].trim().to_owned(),
                }));
            }
            if let Some(caps) = TAB_OPEN.captures(trimmed) {
                return Some(Directive::Open(ContainerKind::TabPanel {
                    group: caps[1].to_owned(),
                    title: caps[2].trim().to_owned(),
                }));
            }
        }

        if self.options.hexo_tags {
            if LINKS_OPEN.is_match(trimmed) {
                return Some(Directive::Open(ContainerKind::Links));
            }
            if let Some(caps) = MEDIA_OPEN.captures(trimmed) {
                if let Some(kind) = MediaKind::from_name(&caps[1]) {
                    return Some(Directive::Open(ContainerKind::Media { kind }));
                }
                self.warn(format!(
                    "line {line_num}: unknown media kind '{}', expected audio or video",
                    &caps[1]
                ));
            }
        }

        None
    }

    fn closes_family(&self, trimmed: &str) -> Option<Family> {
        if self.options.containers {
            match trimmed {
                ":::" => return Some(Family::Colon),
                "+++" => return Some(Family::Plus),
                ";;;" => return Some(Family::Semicolon),
                _ => {}
            }
        }
        if self.options.hexo_tags {
            if LINKS_CLOSE.is_match(trimmed) {
                return Some(Family::Links);
            }
            if MEDIA_CLOSE.is_match(trimmed) {
                return Some(Family::Media);
            }
        }
        None
    }

    /// Pop the innermost frame and write its output into the parent.
    ///
    /// `closed` is false when the frame is being closed at end of input.
    fn pop_frame(&mut self, stack: &mut Vec<Frame>, root: &mut BlockOutput, closed: bool) {
        let Some(frame) = stack.pop() else {
            return;
        };
        let Frame {
            kind,
            opener,
            line,
            out,
        } = frame;
        let family = match &kind {
            FrameKind::Container(kind) => kind.family(),
            FrameKind::Verbatim(family) => *family,
        };
        let body = out.finish();

        if !closed && matches!(kind, FrameKind::Container(_)) {
            self.warn(format!(
                "line {line}: unclosed {} (missing closing {})",
                opener.trim(),
                family.closer()
            ));
        }

        let parent = current(stack, root);
        let verbatim = || {
            let mut text = format!("{opener}\n{body}");
            if closed {
                text.push_str(family.closer());
                text.push('\n');
            }
            text
        };

        match kind {
            FrameKind::Verbatim(_) => parent.push_verbatim(&verbatim()),
            FrameKind::Container(ContainerKind::Note { style, icon }) => {
                let style = escape_html(&style);
                let icon_class = if icon { "" } else { " no-icon" };
                parent.push_block(&format!(
                    "<div class=\"note-block note-{style}{icon_class}\">\n\n{}\n\n</div>\n",
                    body.trim_end_matches('\n')
                ));
            }
            FrameKind::Container(ContainerKind::Collapse { style, title }) => {
                parent.push_block(&format!(
                    "<details class=\"collapse-block collapse-{}\">\n<summary>{}</summary>\n\n{}\n\n</details>\n",
                    escape_html(&style),
                    escape_html(&title),
                    body.trim_end_matches('\n')
                ));
            }
            FrameKind::Container(ContainerKind::Encrypted { mut attrs }) => {
                let password = attrs.take("password").unwrap_or_default();
                let mut open = String::from("<div");
                attrs.write_html(&["encrypted-block"], &mut open);
                parent.push_block(&format!(
                    "{open} data-password=\"{}\">\n\n{}\n\n</div>\n",
                    escape_html(&password),
                    body.trim_end_matches('\n')
                ));
            }
            FrameKind::Container(ContainerKind::TabPanel { group, title }) => {
                parent.push_panel(&group, TabPanel { title, body }, &mut self.next_tab_seq);
            }
            FrameKind::Container(ContainerKind::Links) => {
                let rendered = if closed {
                    hexo::render_links(&body).map_err(|e| e.to_string())
                } else {
                    Err("unterminated tag".to_owned())
                };
                match rendered {
                    Ok(html) => parent.push_block(&html),
                    Err(reason) => {
                        self.warn(format!("line {line}: invalid links block: {reason}"));
                        parent.push_verbatim(&verbatim());
                    }
                }
            }
            FrameKind::Container(ContainerKind::Media { kind }) => {
                let rendered = if closed {
                    hexo::render_media(kind, &body).map_err(|e| e.to_string())
                } else {
                    Err("unterminated tag".to_owned())
                };
                match rendered {
                    Ok(html) => parent.push_block(&html),
                    Err(reason) => {
                        self.warn(format!("line {line}: invalid media block: {reason}"));
                        parent.push_verbatim(&verbatim());
                    }
                }
            }
        }
    }

    fn warn(&mut self, message: String) {
        warn!(target: "quill_markup::scanner", "{message}");
        self.warnings.push(message);
    }
}

impl Default for ContainerScanner {
    fn default() -> Self {
        Self::new(ScanOptions::default())
    }
}

/// Output of the innermost open frame, or the document root.
fn current<'a>(stack: &'a mut [Frame], root: &'a mut BlockOutput) -> &'a mut BlockOutput {
    match stack.last_mut() {
        Some(frame) => &mut frame.out,
        None => root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn scan(input: &str) -> (String, Vec<String>) {
        let mut scanner = ContainerScanner::default();
        let output = scanner.scan(input);
        (output, scanner.into_warnings())
    }

    #[test]
    fn test_no_directives_identical() {
        let input = "# Title\r\n\r\nPlain *markdown* text.\r\n";
        let (output, warnings) = scan(input);
        assert_eq!(output, input);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_note_block() {
        let (output, _) = scan(":::info\nHello **world**\n:::\n");
        assert_eq!(
            output,
            "<div class=\"note-block note-info\">\n\nHello **world**\n\n</div>\n\n"
        );
    }

    #[test]
    fn test_note_no_icon() {
        let (output, _) = scan(":::warning no-icon\nCareful\n:::");
        assert!(output.contains(r#"<div class="note-block note-warning no-icon">"#));
    }

    #[test]
    fn test_nested_notes_depth_two() {
        let (output, warnings) = scan(":::info\n:::warn\ntext\n:::\n:::");
        assert!(warnings.is_empty());
        let outer = output.find("note-info").unwrap();
        let inner = output.find("note-warn").unwrap();
        let text = output.find("text").unwrap();
        assert!(outer < inner && inner < text);
        assert_eq!(output.matches("</div>").count(), 2);
    }

    #[test]
    fn test_collapse_block() {
        let (output, _) = scan("+++primary Click <me>\nHidden\n+++\n");
        assert!(output.contains("<details class=\"collapse-block collapse-primary\">\n<summary>Click &lt;me&gt;</summary>\n\nHidden\n\n</details>"));
    }

    #[test]
    fn test_closer_of_other_family_is_literal() {
        let (output, warnings) = scan("+++info Title\n:::\nstill inside\n+++\n");
        assert!(output.contains(":::\nstill inside"));
        assert!(output.contains("</details>"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_fence_immunity() {
        let input = "```markdown\n:::note\nnot a container\n:::\n```\n";
        let (output, warnings) = scan(input);
        assert_eq!(output, input);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_fence_inside_container() {
        let (output, _) = scan(":::tip\n```\n:::\n```\n:::\n");
        assert!(output.contains("```\n:::\n```"));
        assert_eq!(output.matches("</div>").count(), 1);
    }

    #[test]
    fn test_tab_grouping() {
        let (output, _) = scan(";;;a First\ncontent1\n;;;\n\n;;;a Second\ncontent2\n;;;");
        assert_eq!(output.matches("tabs-block").count(), 1);
        assert_eq!(output.matches(r#"role="tabpanel""#).count(), 2);
        let first = output.find(">First</button>").unwrap();
        let second = output.find(">Second</button>").unwrap();
        assert!(first < second);
        assert!(output.find("content1").unwrap() < output.find("content2").unwrap());
    }

    #[test]
    fn test_tab_other_id_splits_groups() {
        let (output, _) = scan(
            ";;;a First\none\n;;;\n\n;;;b Other\nmid\n;;;\n\n;;;a Second\ntwo\n;;;\n",
        );
        assert_eq!(output.matches("tabs-block").count(), 3);
        assert!(output.contains(r#"data-tab-group="b""#));
    }

    #[test]
    fn test_tabs_inside_note() {
        let (output, _) = scan(":::info\n;;;x A\none\n;;;\n;;;x B\ntwo\n;;;\n:::\n");
        let note = output.find("note-info").unwrap();
        let tabs = output.find("tabs-block").unwrap();
        assert!(note < tabs);
        assert_eq!(output.matches("tabs-block").count(), 1);
    }

    #[test]
    fn test_encrypted_block() {
        let (output, _) = scan(":::encrypted{password=\"p@ss\" .wide}\nSecret\n:::\n");
        assert!(output.contains(
            "<div class=\"encrypted-block wide\" data-password=\"p@ss\">\n\nSecret\n\n</div>"
        ));
    }

    #[test]
    fn test_encrypted_without_password() {
        let (output, _) = scan(":::encrypted\nSecret\n:::\n");
        assert!(output.contains(r#"<div class="encrypted-block" data-password="">"#));
    }

    #[test]
    fn test_unterminated_consumes_to_end() {
        let (output, warnings) = scan("intro\n:::info\nbody\nmore");
        assert!(output.starts_with("intro\n"));
        assert!(output.contains("<div class=\"note-block note-info\">\n\nbody\nmore\n\n</div>"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("line 2: unclosed :::info"));
    }

    #[test]
    fn test_stray_closer_warns() {
        let (output, warnings) = scan("text\n:::\n");
        assert_eq!(output, "text\n:::\n");
        assert_eq!(warnings, vec!["line 2: stray ::: with no opening directive"]);
    }

    #[test]
    fn test_depth_guard_thousand_openers() {
        let mut input = ":::note\n".repeat(1000);
        input.push_str("deep\n");
        input.push_str(&":::\n".repeat(1000));

        let (output, warnings) = scan(&input);
        assert_eq!(output.matches("<div class=\"note-block").count(), MAX_CONTAINER_DEPTH);
        assert!(output.contains("deep"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("deeper than 10"));
    }

    #[test]
    fn test_depth_guard_unclosed_openers() {
        let input = "+++info T\n".repeat(1000);
        let (output, warnings) = scan(&input);
        assert_eq!(output.matches("<details").count(), MAX_CONTAINER_DEPTH);
        // One warning per real frame plus the depth warning.
        assert_eq!(warnings.len(), MAX_CONTAINER_DEPTH + 1);
    }

    #[test]
    fn test_custom_depth_limit() {
        let mut scanner = ContainerScanner::new(ScanOptions {
            max_depth: 1,
            ..ScanOptions::default()
        });
        let output = scanner.scan(":::a\n:::b\ninner\n:::\n:::\n");
        assert!(output.contains("note-block note-a"));
        assert!(!output.contains("note-block note-b"));
        assert!(output.contains(":::b\ninner\n:::"));
    }

    #[test]
    fn test_links_tag() {
        let (output, warnings) = scan("{% links %}\n- name: A\n  link: https://a.dev\n{% endlinks %}\n");
        assert!(warnings.is_empty());
        assert!(output.contains(r#"<a class="link-card" href="https://a.dev""#));
    }

    #[test]
    fn test_links_body_not_scanned() {
        let (output, _) = scan("{% links %}\n- name: \":::\"\n  link: /x\n{% endlinks %}\n");
        assert!(output.contains(r#"<span class="link-name">:::</span>"#));
    }

    #[test]
    fn test_media_tag_malformed_yaml_verbatim() {
        let input = "{% media audio %}\n- url: [oops\n{% endmedia %}\n";
        let (output, warnings) = scan(input);
        assert!(output.contains("{% media audio %}\n- url: [oops\n{% endmedia %}"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("invalid media block"));
    }

    #[test]
    fn test_options_disable_containers() {
        let mut scanner = ContainerScanner::new(ScanOptions {
            containers: false,
            ..ScanOptions::default()
        });
        let input = ":::info\ntext\n:::\n";
        assert_eq!(scanner.scan(input), input);
        assert!(scanner.warnings().is_empty());
    }

    #[test]
    fn test_paragraph_after_block_separated() {
        let (output, _) = scan(":::info\nx\n:::\nAfter");
        assert!(output.ends_with("</div>\n\nAfter"));
    }
}
