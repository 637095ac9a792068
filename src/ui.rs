use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};
use std::{io, time::Duration};
use textwrap::wrap;
use tui_input::{backend::crossterm::EventHandler, Input};

use chatsphere::live_query::ScrollSurface;
use chatsphere::models::{ContactStatus, Message};
use chatsphere::ChatRoom;

// Export types needed by main module
pub use ratatui::backend::CrosstermBackend;
pub use ratatui::Terminal;

/// What the main loop should do after a key press
#[derive(Debug, PartialEq)]
pub enum UiAction {
    None,
    Submit,
    DismissNotice,
    Quit,
}

enum Focus {
    Messages,
    Contacts,
}

/// Scroll state of the message list. Only counts as mounted once it has been
/// drawn.
#[derive(Default)]
pub struct MessagePane {
    selected: usize,
    mounted: bool,
}

impl ScrollSurface for MessagePane {
    fn scroll_to_latest(&mut self, len: usize) {
        self.selected = len.saturating_sub(1);
    }
}

pub struct ChatUI {
    input: Input,
    pane: MessagePane,
    focus: Focus,
}

impl ChatUI {
    pub fn new() -> Self {
        ChatUI {
            input: Input::default(),
            pane: MessagePane::default(),
            focus: Focus::Messages,
        }
    }

    /// The message pane, if it is on screen
    pub fn scroll_surface(&mut self) -> Option<&mut dyn ScrollSurface> {
        if self.pane.mounted {
            Some(&mut self.pane)
        } else {
            None
        }
    }

    /// Pick up changes the room made to the composer buffer (it clears after
    /// a successful send)
    pub fn sync_input(&mut self, room: &ChatRoom) {
        if room.composer().input() != self.input.value() {
            self.input = Input::new(room.composer().input().to_string());
        }
    }

    pub fn handle_input(&mut self, room: &mut ChatRoom) -> Result<UiAction> {
        if !event::poll(Duration::from_millis(10))? {
            return Ok(UiAction::None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(UiAction::None);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(UiAction::None);
        }

        match key.code {
            KeyCode::Esc => return Ok(UiAction::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(UiAction::Quit),
            KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(UiAction::DismissNotice),
            KeyCode::Enter => return Ok(UiAction::Submit),
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Messages => Focus::Contacts,
                    Focus::Contacts => Focus::Messages,
                };
            }
            KeyCode::Up => {
                self.pane.selected = self.pane.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                let last = room.messages().len().saturating_sub(1);
                self.pane.selected = (self.pane.selected + 1).min(last);
            }
            _ => {
                if let Focus::Messages = self.focus {
                    self.input.handle_event(&Event::Key(key));
                    room.composer_mut().set_input(self.input.value());
                }
            }
        }
        Ok(UiAction::None)
    }

    pub fn draw<B: Backend>(&mut self, frame: &mut Frame<B>, room: &ChatRoom) {
        let size = frame.size();

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25), // Contacts panel
                Constraint::Percentage(75), // Chat panel
            ])
            .split(size);

        let chat_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // Messages area
                Constraint::Length(3), // Input box
                Constraint::Length(1), // Help line
            ])
            .split(chunks[1]);

        // Contacts
        let contacts: Vec<ListItem> = room
            .roster()
            .contacts()
            .iter()
            .flat_map(|c| {
                let indicator = match c.status {
                    ContactStatus::Online => Span::styled("● ", Style::default().fg(Color::Green)),
                    ContactStatus::Offline => Span::styled("○ ", Style::default().fg(Color::Gray)),
                };
                vec![
                    ListItem::new(Line::from(vec![indicator, Span::raw(c.name.clone())])),
                    ListItem::new(Line::from(Span::styled(
                        format!("  {}", c.last_message),
                        Style::default().fg(Color::Gray),
                    ))),
                ]
            })
            .collect();
        let contacts_list = List::new(contacts).block(
            Block::default()
                .title("Chats")
                .borders(Borders::ALL)
                .border_style(match self.focus {
                    Focus::Contacts => Style::default().fg(Color::Yellow),
                    _ => Style::default(),
                }),
        );
        frame.render_widget(contacts_list, chunks[0]);

        // Messages. The initial load usually lands before the first frame, so
        // mounting the pane catches up on it.
        if !self.pane.mounted {
            self.pane.mounted = true;
            self.pane.scroll_to_latest(room.messages().len());
        }
        draw_messages(frame, room.messages(), chat_chunks[0], &self.pane);

        // Input
        let title = match room.in_flight() {
            0 => "Type a message".to_string(),
            n => format!("Type a message (sending {})", n),
        };
        let input_widget = Paragraph::new(self.input.value()).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(match self.focus {
                    Focus::Messages => Style::default().fg(Color::Yellow),
                    _ => Style::default(),
                }),
        );
        frame.render_widget(input_widget, chat_chunks[1]);

        // Help line, or the inline error when there is one
        let help = match room.feedback().inline() {
            Some(text) => Paragraph::new(Span::styled(text.to_string(), Style::default().fg(Color::Red))),
            None => Paragraph::new(Span::styled(
                "ESC quit | Enter send | TAB switch | Up/Down scroll | Ctrl+X dismiss",
                Style::default().fg(Color::Gray),
            )),
        };
        frame.render_widget(help, chat_chunks[2]);

        if let Focus::Messages = self.focus {
            frame.set_cursor(
                chat_chunks[1].x + self.input.cursor() as u16 + 1,
                chat_chunks[1].y + 1,
            );
        }

        if let Some(notice) = room.feedback().notices().first() {
            draw_notice(frame, &notice.text, room.feedback().notices().len(), size);
        }
    }
}

/// One message as display lines: header with name and time, then the wrapped
/// body
fn message_lines(message: &Message, width: usize) -> Vec<ListItem<'static>> {
    let time_style = if message.is_pending() {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC)
    } else {
        Style::default().fg(Color::Gray)
    };
    let header = Line::from(vec![
        Span::styled(format!("{}: ", message.display_name), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(message.time_label(), time_style),
    ]);

    let mut lines = vec![ListItem::new(header)];
    lines.extend(
        wrap(&message.text, width.max(1))
            .into_iter()
            .map(|l| ListItem::new(Text::from(format!("  {}", l)))),
    );
    lines
}

fn draw_messages<B: Backend>(f: &mut Frame<B>, messages: &[Message], area: Rect, pane: &MessagePane) {
    let wrap_width = area.width.saturating_sub(4) as usize; // Borders and indent

    // Select the last display line of the selected message so all of it is visible
    let mut items = Vec::new();
    let mut selected_line = None;
    for (i, m) in messages.iter().enumerate() {
        let lines = message_lines(m, wrap_width);
        if i == pane.selected {
            selected_line = Some(items.len() + lines.len() - 1);
        }
        items.extend(lines);
    }

    let mut list_state = ListState::default();
    list_state.select(selected_line);

    let messages_list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Chat"))
        .highlight_style(Style::default());
    f.render_stateful_widget(messages_list, area, &mut list_state);
}

fn draw_notice<B: Backend>(f: &mut Frame<B>, text: &str, count: usize, area: Rect) {
    let width = (area.width / 2).max(30).min(area.width);
    let popup = Rect::new(area.x + area.width.saturating_sub(width) / 2, area.y + 1, width, 3).intersection(area);

    let title = if count > 1 {
        format!("Notice (1 of {}) - Ctrl+X to dismiss", count)
    } else {
        "Notice - Ctrl+X to dismiss".to_string()
    };
    debug!("UI: Showing notice: {}", text);
    let paragraph = Paragraph::new(text.to_string())
        .style(Style::default().fg(Color::Red))
        .block(Block::default().title(title).borders(Borders::ALL));

    f.render_widget(Clear, popup);
    f.render_widget(paragraph, popup);
}

pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

pub fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
