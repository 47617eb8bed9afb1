use crate::panel::{LcdPanel, COLS};
use crossterm::terminal;
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::text::{Span, Spans};
use tui::widgets::{Block, Borders, Paragraph};
use tui::Terminal;

/// Renders the simulated panel's visible character cells. Abstracted so the
/// machine can run against a terminal, or against nothing at all.
pub trait PanelView {
    fn draw(&mut self, panel: &LcdPanel) -> Result<(), io::Error>;
}

/// character-cell rendering in a terminal, using TUI and crossterm
pub struct TermPanelView {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TermPanelView {
    pub fn new() -> Result<TermPanelView, io::Error> {
        terminal::enable_raw_mode()?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(TermPanelView { terminal })
    }
}

impl Drop for TermPanelView {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        let _ = terminal::disable_raw_mode();
    }
}

impl PanelView for TermPanelView {
    fn draw(&mut self, panel: &LcdPanel) -> Result<(), io::Error> {
        let [top, bottom] = panel.visible_lines();
        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + COLS as u16, 4);
            let text = vec![Spans::from(Span::raw(top)), Spans::from(Span::raw(bottom))];
            let block = Block::default()
                .title("SAP-1")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Green).bg(Color::Black));
            f.render_widget(Paragraph::new(text).block(block), size);
        })?;
        Ok(())
    }
}

/// no-op view for logging-only runs and tests
pub struct HeadlessView;

impl PanelView for HeadlessView {
    fn draw(&mut self, _panel: &LcdPanel) -> Result<(), io::Error> {
        Ok(())
    }
}
