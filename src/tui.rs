//! Terminal chat surface
//!
//! Drives the surface reducer: key presses and stream events become
//! [`Action`]s, and the returned [`Effect`]s are executed here (sending the
//! prompt, collapse timers, scroll-follow, focus).

mod input;
mod render;
mod terminal;

use crate::event::StreamEvent;
use crate::ipc::SurfacePort;
use crate::surface::{reduce, Action, Effect, NodeIndex, Transcript};
use anyhow::Result;
use crossterm::event::{
    self, Event, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use input::{Command, InputBuffer};
use ratatui::{layout::Rect, Frame};
use render::RenderedTranscript;
use std::time::Duration;
use tokio::sync::mpsc;

const TICK_INTERVAL: Duration = Duration::from_millis(50);
const WHEEL_STEP: usize = 3;
const HOST_LOST: &str = "Connection to host lost";

/// Scroll position of the history pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scroll {
    offset: usize,
    /// Stick to the newest row as content grows
    follow: bool,
    total: usize,
    viewport: usize,
}

impl Default for Scroll {
    fn default() -> Self {
        Self {
            offset: 0,
            follow: true,
            total: 0,
            viewport: 0,
        }
    }
}

impl Scroll {
    fn max_offset(&self) -> usize {
        self.total.saturating_sub(self.viewport)
    }

    fn update(&mut self, total: usize, viewport: usize) {
        self.total = total;
        self.viewport = viewport;
        if self.follow || self.offset > self.max_offset() {
            self.offset = self.max_offset();
        }
    }

    fn to_bottom(&mut self) {
        self.follow = true;
        self.offset = self.max_offset();
    }

    fn up(&mut self, rows: usize) {
        self.offset = self.offset.saturating_sub(rows);
        self.follow = self.offset >= self.max_offset();
    }

    fn down(&mut self, rows: usize) {
        self.offset = (self.offset + rows).min(self.max_offset());
        self.follow = self.offset >= self.max_offset();
    }

    fn page(&self) -> usize {
        self.viewport.saturating_sub(1).max(1)
    }
}

pub struct ChatApp {
    title: String,
    transcript: Transcript,
    input: InputBuffer,
    port: SurfacePort,
    collapse_tx: mpsc::UnboundedSender<NodeIndex>,
    collapse_rx: mpsc::UnboundedReceiver<NodeIndex>,
    scroll: Scroll,
    rendered: RenderedTranscript,
    history_area: Rect,
    focused: bool,
    host_connected: bool,
    should_quit: bool,
}

impl ChatApp {
    pub fn new(title: impl Into<String>, port: SurfacePort) -> Self {
        let (collapse_tx, collapse_rx) = mpsc::unbounded_channel();
        Self {
            title: title.into(),
            transcript: Transcript::new(),
            input: InputBuffer::default(),
            port,
            collapse_tx,
            collapse_rx,
            scroll: Scroll::default(),
            rendered: RenderedTranscript {
                lines: Vec::new(),
                headers: Vec::new(),
            },
            history_area: Rect::default(),
            focused: true,
            host_connected: true,
            should_quit: false,
        }
    }

    /// Take over the terminal until the user closes the window.
    pub async fn run(mut self) -> Result<()> {
        let mut terminal = terminal::TerminalGuard::enter()?;
        self.event_loop(&mut terminal).await
    }

    async fn event_loop(&mut self, terminal: &mut terminal::ChatTerminal) -> Result<()> {
        tracing::info!(title = %self.title, "Surface started");
        let mut tick = tokio::time::interval(TICK_INTERVAL);

        while !self.should_quit {
            terminal.draw(|frame| self.draw(frame))?;
            self.process_terminal_events()?;
            if self.should_quit {
                break;
            }

            tokio::select! {
                _ = tick.tick() => {}
                event = self.port.recv(), if self.host_connected => {
                    self.on_stream_event(event);
                }
                Some(card) = self.collapse_rx.recv() => {
                    self.dispatch(Action::CollapseDue(card));
                }
            }
        }

        tracing::info!("Surface closed");
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let area = frame.area();
        let input_width = area.width.saturating_sub(2).max(1) as usize;
        let layout = render::split_layout(area, render::input_rows(self.input.text(), input_width));

        let rendered = render::layout_transcript(&self.transcript, layout.history.width as usize);
        self.scroll
            .update(rendered.lines.len(), layout.history.height as usize);

        render::render_history(frame, layout.history, &rendered.lines, self.scroll.offset);
        render::render_status(
            frame,
            layout.status,
            &self.title,
            !self.transcript.input_enabled(),
        );
        render::render_input(
            frame,
            layout.input,
            self.input.text(),
            self.input.cursor(),
            self.transcript.input_enabled() && self.focused,
        );

        self.history_area = layout.history;
        self.rendered = rendered;
    }

    fn process_terminal_events(&mut self) -> Result<()> {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key)
                    if key.kind == KeyEventKind::Press || key.kind == KeyEventKind::Repeat =>
                {
                    self.on_key(key);
                }
                Event::Paste(text) => {
                    if self.transcript.input_enabled() {
                        self.focused = true;
                        self.input.insert_str(&text);
                    }
                }
                Event::Mouse(mouse) => self.on_mouse(mouse),
                _ => {}
            }
            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) {
        let command = input::command_for_key(key);
        match command {
            Command::Close => self.close(),
            Command::ToggleLastCard => {
                if let Some(card) = self.transcript.last_card() {
                    self.dispatch(Action::ToggleCard(card));
                }
            }
            Command::ScrollUp => {
                let page = self.scroll.page();
                self.scroll.up(page);
            }
            Command::ScrollDown => {
                let page = self.scroll.page();
                self.scroll.down(page);
            }
            Command::Submit => self.submit(),
            Command::Ignore => {}
            edit if self.transcript.input_enabled() => {
                self.focused = true;
                match edit {
                    Command::Newline => self.input.insert('\n'),
                    Command::Insert(c) => self.input.insert(c),
                    Command::Backspace => self.input.backspace(),
                    Command::Delete => self.input.delete(),
                    Command::Left => self.input.left(),
                    Command::Right => self.input.right(),
                    Command::Home => self.input.home(),
                    Command::End => self.input.end(),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.scroll.up(WHEEL_STEP),
            MouseEventKind::ScrollDown => self.scroll.down(WHEEL_STEP),
            MouseEventKind::Down(MouseButton::Left) => {
                let area = self.history_area;
                let inside = mouse.row >= area.y
                    && mouse.row < area.y.saturating_add(area.height)
                    && mouse.column >= area.x
                    && mouse.column < area.x.saturating_add(area.width);
                if !inside {
                    self.focused = true;
                    return;
                }
                self.focused = false;
                let row = (mouse.row - area.y) as usize + self.scroll.offset;
                if let Some(card) = self.rendered.card_at(row) {
                    self.dispatch(Action::ToggleCard(card));
                }
            }
            _ => {}
        }
    }

    fn submit(&mut self) {
        let before = self.transcript.nodes().len();
        self.dispatch(Action::Submit(self.input.text().to_string()));
        if self.transcript.nodes().len() > before {
            self.input.take();
        }
    }

    fn on_stream_event(&mut self, event: Option<StreamEvent>) {
        match event {
            Some(event) => {
                tracing::debug!(event = event.tag(), "Stream event");
                self.dispatch(Action::Stream(event));
            }
            None => {
                tracing::warn!("Host channel closed");
                self.host_connected = false;
                if !self.transcript.input_enabled() {
                    self.dispatch(Action::Stream(StreamEvent::Error(HOST_LOST.into())));
                }
            }
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.port.close_window() {
            tracing::debug!(error = %e, "Host already gone on close");
        }
        self.should_quit = true;
    }

    /// Run the reducer and execute its effects.
    fn dispatch(&mut self, action: Action) {
        for effect in reduce(&mut self.transcript, action) {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::SendPrompt(_) if !self.host_connected => {
                tracing::warn!("Prompt not sent, host connection is gone");
                self.dispatch(Action::Stream(StreamEvent::Error(HOST_LOST.into())));
            }
            Effect::SendPrompt(text) => {
                if let Err(e) = self.port.send_user_message(text) {
                    tracing::warn!(error = %e, "Prompt not delivered");
                    self.dispatch(Action::Stream(StreamEvent::Error(format!(
                        "Could not reach the chat host: {e}"
                    ))));
                }
            }
            Effect::ScheduleCollapse { card, after } => {
                let tx = self.collapse_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    if tx.send(card).is_err() {
                        tracing::debug!(card, "Surface closed before collapse");
                    }
                });
            }
            Effect::ScrollToBottom => self.scroll.to_bottom(),
            Effect::FocusInput => {
                self.focused = true;
                self.input.end();
            }
        }
    }
}
