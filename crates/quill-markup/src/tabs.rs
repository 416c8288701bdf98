//! Tab-group accumulation and HTML output.
//!
//! Every scanner frame owns a [`BlockOutput`]. Closed `;;;id Title` panels are
//! handed to the output of the enclosing frame, which keeps the pending group
//! open across blank lines and flushes it as soon as anything else arrives.

use std::fmt::Write;

use crate::util::escape_html;

/// One panel of a tab group: its title and already-scanned markdown body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TabPanel {
    pub title: String,
    pub body: String,
}

/// Adjacent `;;;id` panels sharing an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TabGroup {
    /// Author-supplied group id.
    pub id: String,
    /// Document-wide sequence number used for element ids.
    pub seq: usize,
    pub panels: Vec<TabPanel>,
}

impl TabGroup {
    /// Render the group as accessible tab markup.
    ///
    /// ```html
    /// <div class="tabs-block" id="tabs-0" data-tab-group="a">
    /// <div class="tab-headers" role="tablist"><button … aria-selected="true">First</button>…</div>
    /// <div class="tab-panel active" role="tabpanel" id="panel-0-0" aria-labelledby="tab-0-0">
    ///
    /// …markdown…
    ///
    /// </div>
    /// </div>
    /// ```
    ///
    /// The first panel is active; the rest start hidden.
    pub(crate) fn render(&self) -> String {
        let seq = self.seq;
        let mut out = String::with_capacity(256);

        writeln!(
            out,
            r#"<div class="tabs-block" id="tabs-{seq}" data-tab-group="{}">"#,
            escape_html(&self.id)
        )
        .unwrap();

        out.push_str(r#"<div class="tab-headers" role="tablist">"#);
        for (idx, panel) in self.panels.iter().enumerate() {
            let active = idx == 0;
            write!(
                out,
                r#"<button type="button" class="{}" role="tab" id="tab-{seq}-{idx}" aria-controls="panel-{seq}-{idx}" aria-selected="{active}" tabindex="{}">{}</button>"#,
                if active { "tab-header active" } else { "tab-header" },
                if active { "0" } else { "-1" },
                escape_html(&panel.title)
            )
            .unwrap();
        }
        out.push_str("</div>\n");

        for (idx, panel) in self.panels.iter().enumerate() {
            let (class, hidden) = if idx == 0 {
                ("tab-panel active", "")
            } else {
                ("tab-panel", r#" hidden="hidden""#)
            };
            write!(
                out,
                r#"<div class="{class}" role="tabpanel" id="panel-{seq}-{idx}" aria-labelledby="tab-{seq}-{idx}"{hidden}>"#
            )
            .unwrap();
            write!(out, "\n\n{}\n\n</div>\n", panel.body.trim_end_matches('\n')).unwrap();
        }

        out.push_str("</div>\n");
        out
    }
}

/// Output buffer of one scanner frame, with the pending tab group.
#[derive(Debug, Default)]
pub(crate) struct BlockOutput {
    text: String,
    pending: Option<TabGroup>,
    held_blank: usize,
}

impl BlockOutput {
    /// Append a markdown line.
    ///
    /// Blank lines are held while a tab group is pending; any other line
    /// flushes the group first.
    pub(crate) fn push_line(&mut self, line: &str) {
        if self.pending.is_some() && line.trim().is_empty() {
            self.held_blank += 1;
            return;
        }
        self.flush();
        self.text.push_str(line);
        self.text.push('\n');
    }

    /// Append text verbatim, flushing any pending group.
    pub(crate) fn push_verbatim(&mut self, text: &str) {
        self.flush();
        self.text.push_str(text);
        if !text.is_empty() && !text.ends_with('\n') {
            self.text.push('\n');
        }
    }

    /// Append a rendered HTML block surrounded by blank lines.
    pub(crate) fn push_block(&mut self, html: &str) {
        self.flush();
        self.write_block(html);
    }

    /// Add a closed tab panel, joining the pending group when the id matches.
    ///
    /// `next_seq` numbers new groups across the whole document.
    pub(crate) fn push_panel(&mut self, group: &str, panel: TabPanel, next_seq: &mut usize) {
        if let Some(pending) = self.pending.as_mut()
            && pending.id == group
        {
            pending.panels.push(panel);
            self.held_blank = 0;
            return;
        }

        self.flush();
        self.pending = Some(TabGroup {
            id: group.to_owned(),
            seq: *next_seq,
            panels: vec![panel],
        });
        *next_seq += 1;
    }

    /// Flush the pending group and return the accumulated text.
    pub(crate) fn finish(mut self) -> String {
        self.flush();
        self.text
    }

    fn flush(&mut self) {
        if let Some(group) = self.pending.take() {
            let html = group.render();
            self.write_block(&html);
        }
        for _ in 0..std::mem::take(&mut self.held_blank) {
            self.text.push('\n');
        }
    }

    fn write_block(&mut self, html: &str) {
        if !self.text.is_empty() && !self.text.ends_with("\n\n") {
            self.text.push('\n');
        }
        self.text.push_str(html);
        if !html.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push('\n');
    }
}
