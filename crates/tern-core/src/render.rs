//! Element-to-text rendering.
//!
//! The runtime treats layout as an external concern: an application's view
//! returns an [`Element`], and the runtime only ever asks it for text. Any
//! cloneable ratatui widget is an element, which includes `String` and
//! `&str`.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

/// Something a view can return.
pub trait Element {
    /// Lay the element out in a `columns` x `rows` area and return the text.
    fn render_to_string(&self, columns: u16, rows: u16) -> String;
}

impl<W: Widget + Clone> Element for W {
    fn render_to_string(&self, columns: u16, rows: u16) -> String {
        let area = Rect::new(0, 0, columns, rows);
        let mut buffer = Buffer::empty(area);
        Widget::render(self.clone(), area, &mut buffer);
        buffer_to_string(&buffer)
    }
}

/// Render `element` at the given size.
pub fn render<E: Element + ?Sized>(element: &E, columns: u16, rows: u16) -> String {
    element.render_to_string(columns, rows)
}

/// Flatten a buffer into lines, dropping trailing blanks on each line and
/// trailing empty lines.
pub fn buffer_to_string(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut lines = Vec::with_capacity(area.height as usize);
    for y in area.top()..area.bottom() {
        let mut line = String::new();
        for x in area.left()..area.right() {
            line.push_str(buffer[(x, y)].symbol());
        }
        lines.push(line.trim_end().to_string());
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines.join("\n")
}
