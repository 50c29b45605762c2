//! The document pane: modal editing, viewport scrolling, and the buffer
//! draw with gutter, syntax, selection, diagnostics, and the completion
//! popup overlay.

use std::sync::Arc;

use tracing::debug;

use pat_doc::document::DocumentHandle;
use pat_events::{Event, MouseButton};
use pat_keymap::{Consumed, KeyActor, KeyTree};
use pat_lsp::types::DiagnosticSeverity;
use pat_render::{Area, Cell, FrameBuffer, Position, Style, draw_text_line};
use pat_text::Slice;

use crate::{EventHandler, Overlay, Pane, PaneCtx, PaneId, UiCommand};

const BLINK_PERIOD_MS: u64 = 500;
const WHEEL_SCROLL_LINES: usize = 3;
const MAX_COMPLETION_ROWS: usize = 20;

/// The key-actor half of a document window, split out so the event handler
/// can borrow it while the pane owns both.
struct DocView {
    document: DocumentHandle,
    mode: String,
    view_row: usize,
    view_col: usize,
    blink_last: u64,
    blink_show: bool,
    commands: Vec<UiCommand>,
}

impl DocView {
    fn reset_blink(&mut self) {
        self.blink_show = true;
        self.blink_last = u64::MAX; // next update re-arms from its own clock
    }
}

impl KeyActor for DocView {
    fn actor_class(&self) -> &'static str {
        "document"
    }

    fn mode(&self) -> &str {
        &self.mode
    }

    fn invoke(&mut self, action: &str) -> bool {
        let mut doc = self.document.borrow_mut();
        match action {
            "cursor.up" => doc.cursor_up(),
            "cursor.down" => doc.cursor_down(),
            "cursor.left" => doc.cursor_left(),
            "cursor.right" => doc.cursor_right(),
            "cursor.home" => doc.cursor_home(),
            "cursor.end" => doc.cursor_end(),
            "select.up" => doc.select_up(),
            "select.down" => doc.select_down(),
            "select.left" => doc.select_left(),
            "select.right" => doc.select_right(),
            "select.home" => doc.select_home(),
            "select.end" => doc.select_end(),
            "cursor.add_below" => doc.add_cursor_down(),
            "cursor.add_above" => doc.add_cursor_up(),
            "cursor.collapse" => {
                doc.clear_multi_cursors();
                doc.clear_selections();
            }
            "edit.newline" => {
                let accepting = doc.completion().visible;
                if accepting {
                    doc.select_completion_item();
                } else {
                    doc.insert_text("\n");
                }
            }
            "edit.tab" => {
                let accepting = doc.completion().visible;
                if accepting {
                    doc.select_completion_item();
                } else {
                    doc.insert_text("\t");
                }
            }
            "edit.backspace" => doc.backspace(),
            "edit.delete" => doc.delete_forward(),
            "history.undo" => doc.undo(),
            "history.redo" => doc.redo(),
            "mode.insert" => self.mode = "insert".to_string(),
            "mode.append" => {
                doc.cursor_right();
                self.mode = "insert".to_string();
            }
            "mode.normal" => {
                doc.clear_completion_items();
                self.mode = "normal".to_string();
            }
            "completion.trigger" => doc.trigger_completion(),
            "completion.next" => doc.cycle_completion_list(false),
            "completion.prev" => doc.cycle_completion_list(true),
            "completion.accept" => doc.select_completion_item(),
            "completion.cancel" => doc.clear_completion_items(),
            "lsp.signature" => doc.request_signature_help(),
            "lsp.definition" => {
                if let Some(lsp) = doc.lsp().cloned() {
                    let coord = doc.cursors().primary().coord();
                    lsp.definition(
                        doc.uri(),
                        doc.version(),
                        pat_doc::document::coord_to_position(coord),
                    );
                }
            }
            "lsp.declaration" => {
                if let Some(lsp) = doc.lsp().cloned() {
                    let coord = doc.cursors().primary().coord();
                    lsp.declaration(
                        doc.uri(),
                        doc.version(),
                        pat_doc::document::coord_to_position(coord),
                    );
                }
            }
            "lsp.hover" => {
                if let Some(lsp) = doc.lsp().cloned() {
                    let coord = doc.cursors().primary().coord();
                    lsp.hover(
                        doc.uri(),
                        doc.version(),
                        pat_doc::document::coord_to_position(coord),
                    );
                }
            }
            unknown => {
                debug!(target: "ui.document", action = unknown, "unknown document action");
                drop(doc);
                self.commands
                    .push(UiCommand::StatusMessage(format!("unknown action: {unknown}")));
                return false;
            }
        }
        drop(doc);
        self.reset_blink();
        true
    }
}

pub struct DocumentWindow {
    id: PaneId,
    keytree: Arc<KeyTree>,
    handler: EventHandler,
    view: DocView,
}

impl DocumentWindow {
    pub fn new(keytree: Arc<KeyTree>, document: DocumentHandle) -> Self {
        Self {
            id: PaneId::next(),
            handler: EventHandler::new(keytree.clone()),
            keytree,
            view: DocView {
                document,
                mode: "normal".to_string(),
                view_row: 0,
                view_col: 0,
                blink_last: 0,
                blink_show: true,
                commands: Vec::new(),
            },
        }
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.view.document
    }

    pub fn mode(&self) -> &str {
        &self.view.mode
    }

    /// Scroll so the primary cursor stays inside the viewport with the
    /// configured vertical margin.
    fn ensure_cursor_on_view(&mut self, text_area: Area, scrolloff: usize) {
        let doc = self.view.document.borrow();
        let cursor = doc.cursors().primary();
        let row = cursor.coord().line;
        let col = cursor.real_column();
        drop(doc);

        if col <= self.view.view_col {
            self.view.view_col = col;
        } else if self.view.view_col + text_area.width <= col {
            self.view.view_col = col - text_area.width.saturating_sub(1).max(1);
        }

        if row.saturating_sub(scrolloff) <= self.view.view_row {
            self.view.view_row = row.saturating_sub(scrolloff);
        } else if self.view.view_row + text_area.height <= row + scrolloff {
            self.view.view_row = (row + scrolloff).saturating_sub(text_area.height.saturating_sub(1));
        }
    }
}

impl KeyActor for DocumentWindow {
    fn actor_class(&self) -> &'static str {
        self.view.actor_class()
    }

    fn mode(&self) -> &str {
        self.view.mode()
    }

    fn invoke(&mut self, action: &str) -> bool {
        self.view.invoke(action)
    }
}

impl Pane for DocumentWindow {
    fn id(&self) -> PaneId {
        self.id
    }

    fn handle_event(&mut self, event: &Event, _ctx: &PaneCtx) -> bool {
        match event {
            Event::Key(key) => {
                match self.handler.consume(&mut self.view, *key) {
                    Consumed::Pass => {}
                    _ => return true,
                }
                // Default behavior: printable characters insert in insert
                // mode; everything else bubbles.
                if self.view.mode == "insert"
                    && key.is_text()
                    && let Some(ch) = char::from_u32(key.unicode)
                    && !ch.is_control()
                {
                    self.view.document.borrow_mut().enter_character(ch);
                    self.view.reset_blink();
                    return true;
                }
                false
            }
            Event::Mouse(mouse) => match mouse.button {
                MouseButton::WheelUp => {
                    self.view.view_row = self.view.view_row.saturating_sub(WHEEL_SCROLL_LINES);
                    true
                }
                MouseButton::WheelDown => {
                    let lines = self.view.document.borrow().buffer().line_count();
                    self.view.view_row =
                        (self.view.view_row + WHEEL_SCROLL_LINES).min(lines.saturating_sub(1));
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn update(&mut self, ctx: &PaneCtx) -> bool {
        if !ctx.focused {
            return false;
        }
        if self.view.blink_last == u64::MAX || self.view.blink_last > ctx.now_ms {
            self.view.blink_last = ctx.now_ms;
            return false;
        }
        if ctx.now_ms - self.view.blink_last >= BLINK_PERIOD_MS {
            self.view.blink_last = ctx.now_ms;
            self.view.blink_show = !self.view.blink_show;
            return true;
        }
        false
    }

    fn take_commands(&mut self) -> Vec<UiCommand> {
        std::mem::take(&mut self.view.commands)
    }

    fn duplicate(&self) -> Option<Box<dyn Pane>> {
        Some(Box::new(DocumentWindow::new(
            self.keytree.clone(),
            self.view.document.clone(),
        )))
    }

    fn on_key_timeout(&mut self) -> bool {
        self.handler.on_timeout(&mut self.view)
    }

    fn has_held_binding(&self) -> bool {
        self.handler.is_held()
    }

    fn draw(
        &mut self,
        buff: &mut FrameBuffer,
        pos: Position,
        area: Area,
        ctx: &PaneCtx,
        overlays: &mut Vec<Overlay>,
    ) {
        if area.width == 0 || area.height < 2 {
            return;
        }

        let line_count = self.view.document.borrow().buffer().line_count();
        let gutter = if ctx.config.show_linenum {
            digits(line_count) + 2
        } else {
            0
        };
        let text_area = Area::new(area.width.saturating_sub(gutter), area.height - 1);
        self.ensure_cursor_on_view(text_area, ctx.config.scrolloff);

        self.draw_buffer(buff, Position::new(pos.x + gutter as i32, pos.y), text_area, ctx);
        if gutter > 0 {
            self.draw_gutter(buff, pos, gutter, text_area.height, ctx);
        }
        self.draw_status_line(buff, Position::new(pos.x, pos.y + text_area.height as i32), area.width, ctx);
        if ctx.focused {
            self.draw_completion_popup(
                buff,
                Position::new(pos.x + gutter as i32, pos.y),
                text_area,
                ctx,
                overlays,
            );
        }
    }
}

impl DocumentWindow {
    fn draw_buffer(&mut self, buff: &mut FrameBuffer, pos: Position, area: Area, ctx: &PaneCtx) {
        let mut doc = self.view.document.borrow_mut();
        let tab_size = doc.buffer().tab_size();
        let style_text = ctx.theme.get("ui.text");
        let style_selection = style_text.apply(&ctx.theme.get("ui.selection"));
        let style_cursor = ctx.theme.get("ui.cursor");

        // Highlight spans resolved up front; diagnostics converted to byte
        // ranges once per frame.
        let highlight_styles: Vec<(Slice, Style)> = doc
            .highlights()
            .iter()
            .map(|span| (span.range, ctx.theme.get(&span.capture)))
            .collect();
        let diag_ranges: Vec<(usize, usize, Option<DiagnosticSeverity>)> = {
            let buffer = doc.buffer();
            let diagnostics = doc.diagnostics();
            diagnostics
                .iter()
                .filter_map(|diag| {
                    let start = buffer.is_valid_coord(pat_doc::document::position_to_coord(
                        diag.range.start,
                    ))?;
                    let end = buffer
                        .is_valid_coord(pat_doc::document::position_to_coord(diag.range.end))?;
                    Some((start, end.max(start), diag.severity))
                })
                .collect()
        };

        let cursor_cells: Vec<usize> = doc.cursors().cursors().iter().map(|c| c.index()).collect();
        let selections: Vec<Slice> = doc
            .cursors()
            .cursors()
            .iter()
            .filter_map(|c| c.selection())
            .collect();
        let show_cursor = ctx.focused && self.view.blink_show;

        let buffer = doc.buffer();
        let line_count = buffer.line_count();

        for y in 0..area.height {
            let line_index = self.view.view_row + y;
            if line_index >= line_count {
                break;
            }
            let line = buffer.line(line_index);
            let mut x: i32 = 0;

            // When the leftmost visible column lands inside a tab, pad the
            // remaining half of the tab with spaces before the next glyph.
            let (mut index, col_delta) = buffer.column_to_index(self.view.view_col, line_index);
            if col_delta > 0 && index < line.end {
                let in_selection = selections.iter().any(|s| s.contains(index));
                let pad_style = if in_selection { style_selection } else { style_text };
                for _ in 0..tab_size - col_delta {
                    buff.set_cell(pos.x + x, pos.y + y as i32, Cell::styled(' ' as u32, &pad_style));
                    x += 1;
                }
                index += 1;
            }

            while (x as usize) < area.width && index <= line.end {
                let raw = buffer.at(index);
                let mut style = style_text;

                for (range, hl) in &highlight_styles {
                    if range.contains(index) {
                        style = style.apply(hl);
                    }
                }

                for (start, end, severity) in &diag_ranges {
                    if *start <= index && index < *end {
                        let scope = match severity {
                            Some(DiagnosticSeverity::Error) => "diagnostic.error",
                            Some(DiagnosticSeverity::Warning) => "diagnostic.warning",
                            Some(DiagnosticSeverity::Information) => "diagnostic.info",
                            _ => "diagnostic.hint",
                        };
                        style = style.apply(&ctx.theme.get(scope));
                    }
                }

                let in_cursor = cursor_cells.contains(&index);
                let in_selection = selections.iter().any(|s| s.contains(index));
                if in_cursor && show_cursor {
                    style = style.apply(&style_cursor);
                } else if in_selection {
                    style = style.apply(&ctx.theme.get("ui.selection"));
                }

                let is_tab = raw == b'\t' as u32;
                let glyph = if is_tab || raw == b'\n' as u32 || raw == 0 {
                    ' ' as u32
                } else {
                    raw
                };
                buff.set_cell(pos.x + x, pos.y + y as i32, Cell::styled(glyph, &style));
                x += 1;

                if is_tab {
                    let spaces = tab_size - buffer.index_to_column(index) % tab_size - 1;
                    let pad_style = if in_selection { style_selection } else { style_text };
                    for _ in 0..spaces {
                        if (x as usize) >= area.width {
                            break;
                        }
                        buff.set_cell(
                            pos.x + x,
                            pos.y + y as i32,
                            Cell::styled(' ' as u32, &pad_style),
                        );
                        x += 1;
                    }
                }

                index += 1;
            }
        }
    }

    fn draw_gutter(
        &self,
        buff: &mut FrameBuffer,
        pos: Position,
        gutter: usize,
        height: usize,
        ctx: &PaneCtx,
    ) {
        let doc = self.view.document.borrow();
        let line_count = doc.buffer().line_count();
        let cursor_line = doc.cursors().primary().coord().line;
        let style = ctx.theme.get("ui.linenum");
        let style_selected = ctx.theme.get("ui.linenum.selected");

        for y in 0..height {
            let line_index = self.view.view_row + y;
            if line_index >= line_count {
                break;
            }
            let chosen = if line_index == cursor_line {
                style_selected
            } else {
                style
            };
            let label = format!("{:>width$} ", line_index + 1, width = gutter - 1);
            draw_text_line(
                buff,
                &label,
                Position::new(pos.x, pos.y + y as i32),
                gutter,
                &chosen,
                ctx.icons,
                true,
                false,
            );
        }
    }

    fn draw_status_line(&self, buff: &mut FrameBuffer, pos: Position, width: usize, ctx: &PaneCtx) {
        let doc = self.view.document.borrow();
        let style = if ctx.focused {
            ctx.theme.get("ui.statusline")
        } else {
            ctx.theme.get("ui.statusline.inactive")
        };
        let coord = doc.cursors().primary().coord();
        let readonly = if doc.is_readonly() { " [ro]" } else { "" };
        let left = format!(
            " {}  {}{}",
            self.view.mode.to_uppercase(),
            doc.uri().file_name(),
            readonly
        );
        let right = format!("{}:{} ", coord.line + 1, coord.character + 1);
        drop(doc);

        draw_text_line(buff, &left, pos, width, &style, ctx.icons, true, false);
        if right.len() < width {
            draw_text_line(
                buff,
                &right,
                Position::new(pos.x + (width - right.len()) as i32, pos.y),
                right.len(),
                &style,
                ctx.icons,
                false,
                false,
            );
        }
    }

    /// Build the completion popup as an overlay frame buffer anchored at the
    /// column the completed word starts on, below the cursor line when there
    /// is room and above otherwise.
    fn draw_completion_popup(
        &mut self,
        _buff: &mut FrameBuffer,
        pos: Position,
        area: Area,
        ctx: &PaneCtx,
        overlays: &mut Vec<Overlay>,
    ) {
        let doc = self.view.document.borrow();
        let completion = doc.completion();
        if !completion.visible {
            return;
        }
        let items = completion.visible_items();
        if items.is_empty() {
            return;
        }

        let cursor = doc.cursors().primary();
        let cursor_line = cursor.coord().line;
        if cursor_line < self.view.view_row {
            return;
        }
        let lines_above = cursor_line - self.view.view_row;
        let lines_below = (self.view.view_row + area.height)
            .saturating_sub(cursor_line + 1);

        let wanted = items.len().min(MAX_COMPLETION_ROWS);
        let below = wanted <= lines_below || lines_below >= lines_above;
        let rows = wanted.min(if below { lines_below } else { lines_above });
        if rows == 0 {
            return;
        }

        // Two cells of padding, one icon, one spacer.
        let label_width = items.iter().map(|i| i.label.chars().count()).max().unwrap_or(0);
        let width = label_width + 4;

        let menu_index = completion
            .start_index
            .unwrap_or(cursor.index())
            .min(doc.buffer().len());
        let menu_col = doc
            .buffer()
            .index_to_column(menu_index)
            .saturating_sub(self.view.view_col);

        let style_menu = ctx.theme.get("ui.popup");
        let style_selected = style_menu.apply(&ctx.theme.get("ui.popup.selected"));

        let mut popup = FrameBuffer::new(width, rows);
        // Selection stays on screen by scrolling the window of items.
        let first = completion.selected.saturating_sub(rows.saturating_sub(1));
        for (row, item) in items.iter().skip(first).take(rows).enumerate() {
            let style = if first + row == completion.selected {
                style_selected
            } else {
                style_menu
            };
            let line = format!(" • {} ", item.label);
            draw_text_line(
                &mut popup,
                &line,
                Position::new(0, row as i32),
                width,
                &style,
                ctx.icons,
                true,
                false,
            );
        }

        let anchor_row = cursor_line - self.view.view_row;
        let y = if below {
            pos.y + anchor_row as i32 + 1
        } else {
            pos.y + anchor_row as i32 - rows as i32
        };
        overlays.push(Overlay {
            buffer: popup,
            at: Position::new(pos.x + menu_col as i32, y),
        });
    }
}

fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}
