use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table},
};

use crate::domain::{CMDMode, SVConfig};
use crate::model::{Model, Picker, UIData};
use crate::session::ViewState;
use crate::table::CellValue;

pub const CMDLINE_HEIGH: u16 = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(config: &SVConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, statusline_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(CMDLINE_HEIGH)])
                .areas(frame.area());

        self.draw_table(&uidata.view, frame, table_area);
        self.draw_statusline(uidata, frame, statusline_area);

        if let Some(picker) = &uidata.picker {
            Self::draw_picker(picker, frame);
        }
        if uidata.show_popup {
            Self::draw_popup(&uidata.popup_message, frame);
        }
    }

    fn cell_text(value: &CellValue) -> String {
        value
            .to_string()
            .replace("\r\n", " ↵ ")
            .replace('\n', " ↵ ")
    }

    /// Width of every column: the widest of header and page values, capped.
    fn column_widths(&self, view: &ViewState) -> Vec<usize> {
        view.columns
            .iter()
            .enumerate()
            .map(|(cidx, name)| {
                let widest_value = view
                    .page_rows
                    .iter()
                    .map(|row| Self::cell_text(&row[cidx]).chars().count())
                    .max()
                    .unwrap_or(0);
                let width = std::cmp::max(name.chars().count(), widest_value) + COLUMN_WIDTH_MARGIN;
                std::cmp::min(width, self.max_column_width)
            })
            .collect()
    }

    fn draw_table(&self, view: &ViewState, frame: &mut Frame, area: Rect) {
        let title = match &view.workbook {
            Some(wb) => Line::from(vec![
                " ".into(),
                wb.as_str().bold(),
                " / ".into(),
                view.sheet.as_str().yellow().bold(),
                " ".into(),
            ]),
            None => Line::from(" Sheet viewer ".bold()),
        };
        let highlight = Style::default().fg(Color::Cyan);
        let filter = Line::from(vec![
            " search: ".into(),
            Span::styled(format!("\"{}\"", view.filter.search_term), highlight),
            " in: ".into(),
            Span::styled(
                view.filter.category.as_deref().unwrap_or("all columns"),
                highlight,
            ),
            " ".into(),
        ]);
        let block = Block::bordered()
            .title(title.left_aligned())
            .title(filter.right_aligned())
            .title_bottom(Self::pagination_line(view).centered())
            .border_set(border::THICK);

        if view.page_rows.is_empty() {
            let message = if view.columns.is_empty() {
                "No data loaded"
            } else {
                "No results found"
            };
            frame.render_widget(
                Paragraph::new(message.italic()).centered().block(block),
                area,
            );
            return;
        }

        // Leading index column with the 1-based row number in the sheet
        let index_width = view
            .page_row_indices
            .last()
            .map(|idx| (idx + 1).to_string().len())
            .unwrap_or(1);
        let mut widths = vec![index_width];
        widths.extend(self.column_widths(view));

        let header = Row::new(
            std::iter::once(Cell::from("#"))
                .chain(view.columns.iter().map(|c| Cell::from(c.as_str()))),
        )
        .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
        let rows = view
            .page_rows
            .iter()
            .zip(view.page_row_indices.iter())
            .map(|(row, ridx)| {
                let index = Cell::from(Span::styled(
                    (ridx + 1).to_string(),
                    Style::default().fg(Color::DarkGray),
                ));
                Row::new(std::iter::once(index).chain(row.iter().map(|v| match v {
                    CellValue::Absent => Cell::from("∅".dark_gray()),
                    v => Cell::from(Self::cell_text(v)),
                })))
            });
        let table = Table::new(
            rows,
            widths.iter().map(|&w| Constraint::Length(w as u16)),
        )
        .header(header)
        .column_spacing(1)
        .block(block);
        frame.render_widget(table, area);
    }

    fn pagination_line(view: &ViewState) -> Line<'_> {
        let enabled = Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD);
        let disabled = Style::default().fg(Color::DarkGray);
        Line::from(vec![
            Span::styled(" < prev ", if view.has_prev { enabled } else { disabled }),
            Span::raw(format!(
                " page {} of {} ",
                view.page_index + 1,
                view.total_pages
            )),
            Span::styled(" next > ", if view.has_next { enabled } else { disabled }),
            Span::raw(format!(
                " {}/{} rows, {} per page ",
                view.nmatches, view.nrows, view.page_size
            )),
        ])
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::OpenFile) => "open: ",
                Some(CMDMode::Search) => "search: ",
                None => "> ",
            };
            let line = Line::from(vec![
                prompt.yellow().bold(),
                Span::raw(uidata.cmdinput.input.clone()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.len() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position((std::cmp::min(x, area.right().saturating_sub(1)), area.y));
        } else {
            let line = Line::from(vec![
                Span::raw(uidata.status_message.clone()),
                "  ?: help".dark_gray(),
            ]);
            frame.render_widget(Paragraph::new(line), area);
        }
    }

    fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
        let [area] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::horizontal([Constraint::Length(width)])
            .flex(Flex::Center)
            .areas(area);
        area
    }

    fn draw_picker(picker: &Picker, frame: &mut Frame) {
        let width = picker
            .items
            .iter()
            .map(|i| i.chars().count())
            .chain(std::iter::once(picker.title.chars().count()))
            .max()
            .unwrap_or(10)
            + 6;
        let height = picker.items.len() + 2;
        let area = Self::popup_area(frame.area(), width as u16, height as u16);

        let list = List::new(picker.items.iter().map(|i| ListItem::new(i.as_str())))
            .block(Block::bordered().title(Line::from(picker.title.as_str()).centered()))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(picker.selected));

        frame.render_widget(Clear, area);
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_popup(message: &str, frame: &mut Frame) {
        let width = message.lines().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
        let height = message.lines().count() + 2;
        let area = Self::popup_area(frame.area(), width as u16, height as u16);
        let popup = Paragraph::new(message).block(
            Block::bordered()
                .title(Line::from(" Help ".bold()).centered())
                .border_set(border::THICK),
        );
        frame.render_widget(Clear, area);
        frame.render_widget(popup, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterInput;

    fn view(columns: &[&str], rows: Vec<Vec<CellValue>>) -> ViewState {
        ViewState {
            workbook: Some("book.xlsx".into()),
            sheets: vec!["s".into()],
            sheet: "s".into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            page_row_indices: (0..rows.len()).collect(),
            nmatches: rows.len(),
            nrows: rows.len(),
            page_rows: rows,
            page_index: 0,
            page_size: 20,
            total_pages: 1,
            has_prev: false,
            has_next: false,
            categories: columns.iter().map(|c| c.to_string()).collect(),
            filter: FilterInput::default(),
            notice: None,
        }
    }

    #[test]
    fn column_widths_fit_content_up_to_max() {
        let ui = TableUI::new(&SVConfig::default().max_column_width(10usize));
        let v = view(
            &["ID", "DESCRIPTION"],
            vec![
                vec![CellValue::Int(7), CellValue::Text("short".into())],
                vec![
                    CellValue::Int(12345),
                    CellValue::Text("a very long description".into()),
                ],
            ],
        );
        assert_eq!(ui.column_widths(&v), vec![6, 10]);
    }

    #[test]
    fn newlines_are_flattened() {
        assert_eq!(
            TableUI::cell_text(&CellValue::Text("a\nb".into())),
            "a ↵ b"
        );
        assert_eq!(TableUI::cell_text(&CellValue::Absent), "∅");
    }

    #[test]
    fn pagination_line_shows_one_based_page() {
        let mut v = view(&["A"], vec![]);
        v.page_index = 1;
        v.total_pages = 3;
        let text: String = TableUI::pagination_line(&v)
            .spans
            .iter()
            .map(|s| s.content.to_string())
            .collect();
        assert!(text.contains("page 2 of 3"));
    }
}
