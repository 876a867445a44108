use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use tutoria_core::session::GENERATING_PLACEHOLDER;
use tutoria_core::{ChatView, TranscriptEntry};
use crate::app::{App, FocusPane};

const ASSISTANT_NAME: &str = "Tutor.ia";
const WELCOME_TITLE: &str = "¡Hola, soy Tutor.ia!";
const WELCOME_SUBTITLE: &str =
    "Estoy aquí para ayudarte con tu estudio. Hazme una pregunta y te responderé lo mejor que pueda.";

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    // Headings render bold without their markers
    let trimmed = text.trim_start();
    if trimmed.starts_with('#') {
        let heading = trimmed.trim_start_matches('#').trim_start().to_string();
        return Line::from(Span::styled(heading, Style::default().add_modifier(Modifier::BOLD)));
    }

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            // Push any accumulated plain text
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Rows a set of lines occupies once wrapped to `width`
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let width = width as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    rows.min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let show_panel = app.session.visible_citation().is_some();
    let (chat_area, panel_area) = if show_panel {
        let [chat, panel] = Layout::horizontal([
            Constraint::Percentage(60),
            Constraint::Percentage(40),
        ])
        .areas(body_area);
        (chat, Some(panel))
    } else {
        (body_area, None)
    };

    render_chat(app, frame, chat_area);

    app.citation_area = panel_area;
    if let Some(panel_area) = panel_area {
        render_citation_panel(app, frame, panel_area);
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let id = app.session.conversation_id().to_string();
    let short_id: String = id.chars().take(8).collect();

    let title = Line::from(vec![
        Span::styled(format!(" {} ", ASSISTANT_NAME), Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.client.base_url()), Style::default().fg(Color::Gray)),
        Span::styled(format!("[{}]", short_id), Style::default().fg(Color::Black)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Black),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let input_rows = (app.input.text().split('\n').count() as u16).min(6);
    let stop_rows = if app.session.is_loading() { 1 } else { 0 };

    let [transcript_area, stop_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(stop_rows),
        Constraint::Length(input_rows + 2),
    ])
    .areas(area);

    render_transcript(app, frame, transcript_area);

    app.stop_area = (stop_rows > 0).then_some(stop_area);
    app.input_area = Some(input_area);

    if stop_rows > 0 {
        let stop = Paragraph::new(Line::from(vec![
            Span::styled(" ■ ", Style::default().fg(Color::Red).bold()),
            Span::styled("Stop generating (Esc)", Style::default().fg(Color::Gray)),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(stop, stop_area);
    }

    render_input(app, frame, input_area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.transcript_area = Some(area);

    let focused = app.focus == FocusPane::Transcript;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let inner_width = area.width.saturating_sub(2);
    app.transcript_height = area.height.saturating_sub(2);

    let view = app.session.view();
    if view == ChatView::Welcome {
        app.total_transcript_lines = 0;
        app.transcript_scroll = 0;
        let top_padding = app.transcript_height.saturating_sub(3) / 2;
        let mut lines: Vec<Line> = (0..top_padding).map(|_| Line::default()).collect();
        lines.push(Line::from(Span::styled(
            WELCOME_TITLE,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(WELCOME_SUBTITLE, Style::default().fg(Color::Gray))));

        let welcome = Paragraph::new(Text::from(lines))
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(welcome, area);
        return;
    }

    let lines = transcript_lines(app, &view);

    app.total_transcript_lines = wrapped_height(&lines, inner_width);
    if app.follow_bottom {
        app.transcript_scroll = app.max_transcript_scroll();
    } else {
        app.transcript_scroll = app.transcript_scroll.min(app.max_transcript_scroll());
    }

    let transcript = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.transcript_scroll, 0));

    frame.render_widget(transcript, area);
}

fn transcript_lines(app: &App, view: &ChatView) -> Vec<Line<'static>> {
    let ChatView::Transcript { entries, pending_question } = view else {
        return Vec::new();
    };

    let user_label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let assistant_label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut citation_number = 0usize;

    for entry in entries {
        match entry {
            TranscriptEntry::User { text, .. } => {
                lines.push(Line::from(Span::styled("Tú:", user_label)));
                for line in text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
                lines.push(Line::default());
            }
            TranscriptEntry::Answer { text, citations, .. } => {
                lines.push(Line::from(Span::styled(format!("{}:", ASSISTANT_NAME), assistant_label)));
                for line in text.lines() {
                    lines.push(parse_markdown_line(line));
                }
                if !citations.is_empty() {
                    lines.push(Line::from(Span::styled(
                        format!("{} references", citations.len()),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                    for citation in citations {
                        let selected = app.focus == FocusPane::Transcript
                            && app.selected_citation == Some(citation_number);
                        citation_number += 1;
                        let style = if selected {
                            Style::default().bg(Color::Magenta).fg(Color::White).add_modifier(Modifier::BOLD)
                        } else {
                            Style::default().fg(Color::Magenta)
                        };
                        let marker = if selected { "> " } else { "  " };
                        lines.push(Line::from(Span::styled(
                            format!("{}[{}] {}", marker, citation_number, citation.display_title()),
                            style,
                        )));
                    }
                }
                lines.push(Line::default());
            }
            TranscriptEntry::Error { text, .. } => {
                lines.push(Line::from(Span::styled(format!("{}:", ASSISTANT_NAME), assistant_label)));
                lines.push(Line::from(Span::styled(text.clone(), Style::default().fg(Color::Red))));
                lines.push(Line::default());
            }
        }
    }

    if let Some(question) = pending_question {
        lines.push(Line::from(Span::styled("Tú:", user_label)));
        for line in question.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(format!("{}:", ASSISTANT_NAME), assistant_label)));
        // Animated ellipsis: the placeholder's own dots grow and shrink
        let base = GENERATING_PLACEHOLDER.trim_end_matches('.');
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("{}{}", base, dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Input;
    let border_color = if app.input.disabled {
        Color::DarkGray
    } else if focused {
        Color::Yellow
    } else {
        Color::Gray
    };

    // Send indicator swaps while a request is outstanding
    let send_indicator = if app.input.disabled {
        Span::styled(" ■ ", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(" ➤ Enter ", Style::default().fg(Color::Yellow).bold())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Pregunta ")
        .title_bottom(Line::from(send_indicator).right_aligned());

    let inner_height = area.height.saturating_sub(2) as usize;
    let (cursor_line, cursor_col) = app.input.cursor_line_col();
    // Keep the cursor line visible
    let scroll = cursor_line.saturating_sub(inner_height.saturating_sub(1));

    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled(
            app.input.placeholder.clone(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        // Use cyan text to match the "Tú:" style
        Paragraph::new(app.input.text().to_string())
            .style(Style::default().fg(Color::Cyan))
            .scroll((scroll as u16, 0))
    };
    let input = input.block(block);

    frame.render_widget(input, area);

    if focused {
        let inner_width = area.width.saturating_sub(2) as usize;
        let x = cursor_col.min(inner_width.saturating_sub(1)) as u16;
        let y = (cursor_line - scroll) as u16;
        frame.set_cursor_position((area.x + 1 + x, area.y + 1 + y));
    }
}

fn render_citation_panel(app: &App, frame: &mut Frame, area: Rect) {
    let Some(citation) = app.session.visible_citation() else {
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Citations (Esc to close) ");

    let mut lines: Vec<Line<'static>> = Vec::new();
    if !citation.title.is_empty() {
        lines.push(Line::from(Span::styled(
            citation.title.clone(),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )));
    }
    if !citation.filepath.is_empty() {
        lines.push(Line::from(Span::styled(
            citation.filepath.clone(),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::default());
    for line in citation.content.lines() {
        lines.push(parse_markdown_line(line));
    }

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.citation_scroll, 0));

    frame.render_widget(panel, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let disabled_style = Style::default().bg(Color::Black).fg(Color::DarkGray);

    let mode = match app.focus {
        FocusPane::Input => Span::styled(" ASK ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        FocusPane::Transcript => Span::styled(" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    let mut hints = vec![mode, Span::raw(" ")];

    match app.focus {
        FocusPane::Input => hints.extend(vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" S-Enter ", key_style),
            Span::styled(" newline ", label_style),
        ]),
        FocusPane::Transcript => hints.extend(vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" citation ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" open ", label_style),
        ]),
    }

    if app.session.is_loading() {
        hints.extend(vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" stop ", label_style),
        ]);
    } else if app.session.is_citation_panel_open() {
        hints.extend(vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" close ", label_style),
        ]);
    }

    hints.extend(vec![
        Span::styled(" Tab ", key_style),
        Span::styled(" focus ", label_style),
        Span::styled(" ^L ", key_style),
        Span::styled(" clear ", if app.can_clear() { label_style } else { disabled_style }),
        Span::styled(" ^C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;
    use tutoria_core::{ChatMessage, ChatSession, Config, ConversationClient};

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(ConversationClient::new("http://127.0.0.1:9"), &Config::new(), tx)
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_markdown_bold() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));

        let line = parse_markdown_line("open **only");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "open **only");
    }

    #[test]
    fn test_markdown_heading() {
        let line = parse_markdown_line("## Resumen");
        assert_eq!(line.spans[0].content, "Resumen");
    }

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("abcdef"), Line::default(), Line::from("abc")];
        assert_eq!(wrapped_height(&lines, 3), 4);
        assert_eq!(wrapped_height(&lines, 0), 0);
    }

    #[test]
    fn test_welcome_shown_before_first_question() {
        let mut app = app();
        let screen = draw(&mut app);
        assert!(screen.contains("Hola, soy Tutor.ia"));
        assert!(screen.contains("Escribe tu pregunta"));
    }

    #[test]
    fn test_transcript_renders_answer_and_error() {
        let mut app = app();
        app.session = ChatSession::with_history(vec![
            ChatMessage::user("What is 2+2?"),
            ChatMessage::assistant("4"),
            ChatMessage::user("otra"),
            ChatMessage::error("boom"),
        ]);

        let screen = draw(&mut app);
        assert!(screen.contains("What is 2+2?"));
        assert!(screen.contains("Sorry, an error occurred."));
        assert!(!screen.contains("Hola, soy Tutor.ia"));
    }

    #[test]
    fn test_citation_panel_renders_active_citation() {
        let mut app = app();
        app.session = ChatSession::with_history(vec![
            ChatMessage::user("q"),
            ChatMessage::tool(r#"{"citations":[{"id":"1","content":"Texto de la fuente","title":"Tema 2"}]}"#),
            ChatMessage::assistant("respuesta"),
        ]);
        app.toggle_focus();
        app.open_selected_citation();

        let screen = draw(&mut app);
        assert!(screen.contains("Citations"));
        assert!(screen.contains("Texto de la fuente"));
        assert!(app.citation_area.is_some());
    }

    #[tokio::test]
    async fn test_click_targets_recorded_while_loading() {
        let mut app = app();
        draw(&mut app);
        assert!(app.input_area.is_some());
        assert!(app.stop_area.is_none());

        app.submit("hola".to_string());
        let screen = draw(&mut app);
        assert!(screen.contains("Stop generating"));
        let stop = app.stop_area.unwrap();
        let input = app.input_area.unwrap();
        assert_eq!(stop.height, 1);
        assert_eq!(stop.y + 1, input.y);
        app.stop_generating();
    }
}
