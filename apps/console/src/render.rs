//! Plain-text view of the session for a terminal.

use std::io::{self, Write};

use client_core::{Control, LogEntry, SessionSnapshot, ViewRenderer};

pub struct TextRenderer<W> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn emit(&mut self, text: &str) {
        if let Err(err) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            tracing::warn!(%err, "console output failed");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn control(control: &Control) -> Option<String> {
    if !control.visible {
        return None;
    }
    Some(if control.enabled {
        format!("[{}]", control.label)
    } else {
        format!("({})", control.label)
    })
}

fn status_line(snapshot: &SessionSnapshot) -> String {
    let a = &snapshot.affordances;
    let controls: Vec<String> = [&a.init, &a.run, &a.pause, &a.exit]
        .into_iter()
        .filter_map(control)
        .collect();
    format!(
        "== {} | {:?} | {}",
        snapshot.mode,
        snapshot.run_state,
        controls.join(" ")
    )
}

impl<W: Write> ViewRenderer for TextRenderer<W> {
    fn render(&mut self, snapshot: &SessionSnapshot) {
        let line = status_line(snapshot);
        self.emit(&line);
    }

    fn open_panel(&mut self, snapshot: &SessionSnapshot) {
        let mut panel = vec![format!("-- {} ({}) --", snapshot.title, snapshot.mode)];
        for spider in &snapshot.spider_catalog {
            let mark = if spider.selected { 'x' } else { ' ' };
            panel.push(format!(
                "  [{mark}] {:<12} {} {}",
                spider.id, spider.name, spider.description
            ));
        }
        if !snapshot.spider_catalog.is_empty() {
            let d = &snapshot.form_defaults;
            panel.push(format!(
                "  threads {} ({}-{})  cap {}  pausetime {}  proxy {}  out {}",
                d.thread_num.curr,
                d.thread_num.min,
                d.thread_num.max,
                d.docker_cap.curr,
                d.pausetime.curr,
                d.proxy_minute.curr,
                d.out_type.curr
            ));
        }
        panel.push(status_line(snapshot));
        self.emit(&panel.join("\n"));
    }

    fn dismiss_panel(&mut self) {
        self.emit("-- session closed --");
    }

    fn append_log(&mut self, entry: &LogEntry) {
        let line = format!(
            "{} {}",
            entry.received_at.format("%H:%M:%S"),
            entry.line
        );
        self.emit(&line);
    }
}

/// Renderer for stdout, the usual target.
pub fn stdout() -> TextRenderer<io::Stdout> {
    TextRenderer::new(io::stdout())
}

#[cfg(test)]
mod tests {
    use client_core::{Msg, SessionMachine};
    use shared::domain::Mode;

    use super::*;

    #[test]
    fn status_line_lists_visible_controls() {
        let mut machine = SessionMachine::new();
        machine.update(Msg::SelectMode(Mode::Offline)).unwrap();
        let mut renderer = TextRenderer::new(Vec::new());
        renderer.render(&machine.snapshot());

        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(text, "== offline | Unconfigured | [Start] [Exit]\n");
    }

    #[test]
    fn log_lines_keep_their_text() {
        let mut renderer = TextRenderer::new(Vec::new());
        let mut sink = client_core::LogSink::new();
        renderer.append_log(sink.append("fetch url 1"));
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(text.trim_end().ends_with(" fetch url 1"));
    }
}
