use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane};
use crate::input::InputAction;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Settled(settled) => app.settle(settled),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any focus
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('l') => {
                app.clear_chat();
                return;
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Esc => {
            if app.session.is_loading() {
                app.stop_generating();
            } else if app.session.is_citation_panel_open() {
                app.dismiss_citation();
            } else if app.focus == FocusPane::Transcript {
                app.focus = FocusPane::Input;
            }
            return;
        }
        KeyCode::Tab => {
            app.toggle_focus();
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.transcript_height.max(2) / 2);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.transcript_height.max(2) / 2);
            return;
        }
        _ => {}
    }

    match app.focus {
        FocusPane::Input => handle_input_key(app, key),
        FocusPane::Transcript => handle_transcript_key(app, key),
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match app.input.handle_key(key) {
        InputAction::Send(question) => app.submit(question),
        InputAction::Edited | InputAction::Ignored => {}
    }
}

fn handle_transcript_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.select_next_citation(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev_citation(),
        KeyCode::Enter => app.open_selected_citation(),
        KeyCode::Char('J') => app.scroll_citation_down(1),
        KeyCode::Char('K') => app.scroll_citation_up(1),
        KeyCode::Char('g') => {
            app.transcript_scroll = 0;
            app.follow_bottom = false;
        }
        KeyCode::Char('G') => {
            app.transcript_scroll = app.max_transcript_scroll();
            app.follow_bottom = true;
        }
        KeyCode::Char('q') => app.should_quit = true,
        // Typing jumps back into the input box
        KeyCode::Char(_) => {
            app.focus = FocusPane::Input;
            handle_input_key(app, key);
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Determine which area the mouse is in (position-based scrolling)
    let in_transcript = app.transcript_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_citation = app.citation_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => handle_click(app, x, y),
        MouseEventKind::ScrollDown => {
            if in_citation {
                app.scroll_citation_down(3);
            } else if in_transcript {
                app.scroll_down(3);
            }
        }
        MouseEventKind::ScrollUp => {
            if in_citation {
                app.scroll_citation_up(3);
            } else if in_transcript {
                app.scroll_up(3);
            }
        }
        _ => {}
    }
}

fn handle_click(app: &mut App, x: u16, y: u16) {
    if let Some(stop) = app.stop_area {
        if point_in_rect(x, y, stop) {
            app.stop_generating();
            return;
        }
    }

    let Some(input) = app.input_area else {
        return;
    };
    if !point_in_rect(x, y, input) {
        return;
    }
    app.focus = FocusPane::Input;
    // The send indicator sits on the bottom border
    if y == input.y + input.height.saturating_sub(1) {
        app.send_input();
    }
}
