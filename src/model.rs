use std::path::PathBuf;

use ratatui::crossterm::event::KeyEvent;
use tracing::{error, info, trace, warn};

use crate::domain::{CMDMode, HELP_TEXT, Message, PickerKind, SVConfig, SVError};
use crate::inputter::{InputResult, Inputter};
use crate::session::{Session, ViewState};

/// Label of the picker entry that searches in every column.
pub const ALL_COLUMNS: &str = "(all columns)";

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    PICKER,
    CMDINPUT,
    POPUP,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Picker {
    pub kind: Option<PickerKind>,
    pub title: String,
    pub items: Vec<String>,
    pub selected: usize,
}

pub struct UIData {
    pub view: ViewState,
    pub picker: Option<Picker>,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
}

pub struct Model {
    config: SVConfig,
    session: Session,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    picker: Picker,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &SVConfig) -> Self {
        let session = Session::new(config.page_size);
        let view = session.view_state();
        let mut model = Self {
            config: config.clone(),
            session,
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            picker: Picker::default(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Press 'o' to open a workbook, '?' for help".to_string(),
            uidata: UIData {
                view,
                picker: None,
                show_popup: false,
                popup_message: String::new(),
                cmdinput: InputResult::default(),
                cmd_mode: None,
                active_cmdinput: false,
                status_message: String::new(),
            },
        };
        model.apply_startup_choices();
        model.update_uidata();
        model
    }

    /// Applies the workbook, sheet, column and search given on the command line.
    /// The rest is skipped when the workbook cannot be opened, leaving its
    /// error in the status line.
    fn apply_startup_choices(&mut self) {
        if let Some(path) = self.config.path.clone() {
            self.open_file(Some(path));
            if !self.session.has_workbook() {
                return;
            }
        }
        if let Some(sheet) = self.config.sheet.clone()
            && let Err(e) = self.session.select_sheet(&sheet)
        {
            self.report(e);
        }
        if let Some(category) = self.config.category.clone() {
            self.session.select_category(Some(category));
        }
        if let Some(term) = self.config.search.clone() {
            self.session.search(&term);
        }
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    /// Recoverable errors end up in the status line, never terminate the viewer.
    fn report(&mut self, e: SVError) {
        match e {
            SVError::FileNotSelected => {
                trace!("No file selected");
                self.set_status_message("No file selected");
            }
            SVError::NoWorkbook
            | SVError::UnknownCategory(_)
            | SVError::UnknownSheet(_)
            | SVError::ParseError(_) => {
                warn!("{e}");
                self.set_status_message(e.to_string());
            }
            e => {
                error!("{e}");
                self.set_status_message(format!("Error: {e}"));
            }
        }
    }

    fn update_uidata(&mut self) {
        let view = self.session.view_state();
        if let Some(notice) = &view.notice {
            self.status_message = notice.clone();
        }
        self.uidata = UIData {
            view,
            picker: (self.modus == Modus::PICKER).then(|| self.picker.clone()),
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
        };
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), SVError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);

        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::OpenFile => self.enter_cmd_mode(CMDMode::OpenFile),
                Message::Search => self.enter_cmd_mode(CMDMode::Search),
                Message::SelectSheet => self.open_picker(PickerKind::Sheet),
                Message::SelectCategory => self.open_picker(PickerKind::Category),
                Message::Reset => {
                    self.session.reset_filter();
                    self.set_status_message("Filter reset");
                }
                Message::PreviousPage => self.session.previous_page(),
                Message::NextPage => self.session.next_page(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::PICKER => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.picker.selected = self.picker.selected.saturating_sub(1),
                Message::MoveDown => {
                    if self.picker.selected + 1 < self.picker.items.len() {
                        self.picker.selected += 1;
                    }
                }
                Message::Enter => self.pick(),
                Message::Exit => self.exit(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.exit(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }

        self.update_uidata();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        trace!("Leaving {:?}", self.modus);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::TABLE;
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn open_picker(&mut self, kind: PickerKind) {
        let (title, items, current) = match kind {
            PickerKind::Sheet => {
                let sheets = self.session.sheet_names();
                let current = self.session.table().name().to_string();
                ("Sheets".to_string(), sheets, Some(current))
            }
            PickerKind::Category => {
                let mut items = vec![ALL_COLUMNS.to_string()];
                items.extend(self.session.categories().iter().cloned());
                let current = self.session.filter_input().category.clone();
                (
                    "Search in column".to_string(),
                    items,
                    Some(current.unwrap_or_else(|| ALL_COLUMNS.to_string())),
                )
            }
        };

        if items.is_empty() {
            return self.report(SVError::NoWorkbook);
        }

        let selected = current
            .and_then(|c| items.iter().position(|i| *i == c))
            .unwrap_or(0);
        self.picker = Picker {
            kind: Some(kind),
            title,
            items,
            selected,
        };
        self.previous_modus = self.modus;
        self.modus = Modus::PICKER;
    }

    fn pick(&mut self) {
        let Some(choice) = self.picker.items.get(self.picker.selected).cloned() else {
            return self.exit();
        };
        match self.picker.kind {
            Some(PickerKind::Sheet) => match self.session.select_sheet(&choice) {
                Ok(()) => self.set_status_message(format!("Showing sheet {choice}")),
                Err(e) => self.report(e),
            },
            Some(PickerKind::Category) => {
                if self.picker.selected == 0 {
                    self.session.select_category(None);
                    self.set_status_message("Searching in all columns");
                } else {
                    self.session.select_category(Some(choice.clone()));
                    self.set_status_message(format!("Searching in column {choice}"));
                }
            }
            None => {}
        }
        self.exit();
    }

    fn open_file(&mut self, selection: Option<PathBuf>) {
        match self.session.open_workbook(selection) {
            Ok(()) => {
                let workbook = self.session.workbook_name().unwrap_or_default();
                info!("Showing {} sheet {}", workbook, self.session.table().name());
                self.set_status_message(format!(
                    "Loaded {} ({} sheets)",
                    workbook,
                    self.session.sheet_names().len()
                ));
            }
            Err(e) => self.report(e),
        }
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        if mode == CMDMode::Search {
            let term = self.session.filter_input().search_term.clone();
            self.input.set(&term);
        }
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let canceled = self.last_input.canceled;
        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode {
            Some(CMDMode::OpenFile) => {
                let selection = if canceled || cmd_input.trim().is_empty() {
                    None
                } else {
                    Some(expand_path(cmd_input.trim()))
                };
                self.open_file(selection);
            }
            Some(CMDMode::Search) => {
                if !canceled {
                    self.session.search(&cmd_input);
                    if self.session.filter_input().search_term.is_empty() {
                        self.set_status_message("Enter a search term to filter rows");
                    } else {
                        self.set_status_message(format!(
                            "Found {} of {} rows",
                            self.session.matches().len(),
                            self.session.table().nrows()
                        ));
                    }
                }
            }
            None => {
                info!("Cmd mode is none!")
            }
        }

        self.cmd_mode = None;
        self.last_input = InputResult::default();
    }
}

/// Expands `~` and environment variables the way a shell would.
pub fn expand_path(input: &str) -> PathBuf {
    match shellexpand::full(input) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            warn!("Could not expand {input}: {e}");
            PathBuf::from(input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterInput;
    use crate::table::RawSheet;
    use crate::workbook::MemoryWorkbook;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn fixture() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/testdata_01.csv")
    }

    fn model_with_fixture() -> Model {
        Model::init(&SVConfig::default().path(fixture()))
    }

    fn send(model: &mut Model, msg: Message) {
        model.update(Some(msg)).unwrap();
    }

    fn type_line(model: &mut Model, s: &str) {
        for c in s.chars() {
            send(
                model,
                Message::RawKey(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)),
            );
        }
        send(
            model,
            Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
        );
    }

    #[test]
    fn startup_without_file_shows_empty_view() {
        let model = Model::init(&SVConfig::default());
        let ui = model.get_uidata();
        assert!(ui.view.columns.is_empty());
        assert_eq!(ui.view.total_pages, 1);
        assert!(!ui.view.has_prev);
        assert!(!ui.view.has_next);
    }

    #[test]
    fn startup_loads_path_from_config() {
        let model = model_with_fixture();
        let view = &model.get_uidata().view;
        assert_eq!(view.sheet, "testdata_01");
        assert_eq!(view.columns, vec!["NAME", "AGE", "CITY", "SALARY"]);
        assert_eq!(view.nrows, 45);
        assert_eq!(view.total_pages, 3);
        assert_eq!(view.page_rows.len(), 20);
    }

    #[test]
    fn startup_category_and_search_are_applied() {
        let cfg = SVConfig::default()
            .path(fixture())
            .category("city".to_string())
            .search("recife".to_string());
        let model = Model::init(&cfg);
        let view = &model.get_uidata().view;
        assert_eq!(view.filter.category.as_deref(), Some("CITY"));
        assert!(view.nmatches > 0);
        assert!(view.nmatches < 45);
    }

    #[test]
    fn search_prompt_filters_rows() {
        let mut model = model_with_fixture();
        send(&mut model, Message::Search);
        assert!(model.raw_keyevents());
        type_line(&mut model, "porto");
        assert!(!model.raw_keyevents());

        let ui = model.get_uidata();
        assert_eq!(ui.view.filter.search_term, "porto");
        assert!(ui.view.nmatches > 0 && ui.view.nmatches < 45);
        assert!(ui.status_message.starts_with("Found"));
    }

    #[test]
    fn cancelled_search_keeps_previous_filter() {
        let mut model = model_with_fixture();
        send(&mut model, Message::Search);
        type_line(&mut model, "recife");
        let before = model.get_uidata().view.nmatches;

        send(&mut model, Message::Search);
        send(
            &mut model,
            Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
        );
        assert_eq!(model.get_uidata().view.nmatches, before);
        assert_eq!(model.get_uidata().view.filter.search_term, "recife");
    }

    #[test]
    fn empty_open_prompt_is_a_no_op() {
        let mut model = model_with_fixture();
        send(&mut model, Message::OpenFile);
        type_line(&mut model, "   ");
        let ui = model.get_uidata();
        assert_eq!(ui.view.sheet, "testdata_01");
        assert_eq!(ui.status_message, "No file selected");
    }

    #[test]
    fn open_prompt_reports_missing_file() {
        let mut model = model_with_fixture();
        send(&mut model, Message::OpenFile);
        type_line(&mut model, "/does/not/exist.xlsx");
        let ui = model.get_uidata();
        assert_eq!(ui.view.sheet, "testdata_01");
        assert!(ui.status_message.contains("file not found"));
    }

    #[test]
    fn category_picker_selects_column_and_all_columns() {
        let mut model = model_with_fixture();
        send(&mut model, Message::SelectCategory);
        let picker = model.get_uidata().picker.clone().unwrap();
        assert_eq!(picker.items[0], ALL_COLUMNS);
        assert_eq!(picker.selected, 0);

        send(&mut model, Message::MoveDown);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::Enter);
        assert!(model.get_uidata().picker.is_none());
        assert_eq!(
            model.session.filter_input().category.as_deref(),
            Some("AGE")
        );

        send(&mut model, Message::SelectCategory);
        assert_eq!(model.get_uidata().picker.as_ref().unwrap().selected, 2);
        send(&mut model, Message::MoveUp);
        send(&mut model, Message::MoveUp);
        send(&mut model, Message::MoveUp);
        send(&mut model, Message::Enter);
        assert_eq!(model.session.filter_input().category, None);
    }

    #[test]
    fn paging_messages_move_between_pages() {
        let mut model = model_with_fixture();
        send(&mut model, Message::NextPage);
        send(&mut model, Message::NextPage);
        let view = &model.get_uidata().view;
        assert_eq!(view.page_index, 2);
        assert_eq!(view.page_rows.len(), 5);
        assert!(!view.has_next);

        send(&mut model, Message::PreviousPage);
        assert_eq!(model.get_uidata().view.page_index, 1);
    }

    #[test]
    fn reset_clears_search_and_category() {
        let mut model = model_with_fixture();
        send(&mut model, Message::SelectCategory);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::Enter);
        send(&mut model, Message::Search);
        type_line(&mut model, "ana");
        send(&mut model, Message::Reset);

        let view = &model.get_uidata().view;
        assert_eq!(view.filter.search_term, "");
        assert_eq!(view.filter.category, None);
        assert_eq!(view.nmatches, 45);
    }

    #[test]
    fn unknown_startup_category_shows_notice() {
        let cfg = SVConfig::default()
            .path(fixture())
            .category("missing".to_string())
            .search("x".to_string());
        let model = Model::init(&cfg);
        let ui = model.get_uidata();
        assert_eq!(ui.view.nmatches, 0);
        assert!(ui.status_message.contains("MISSING"));
    }

    #[test]
    fn failed_startup_open_keeps_its_error() {
        let cfg = SVConfig::default()
            .path(PathBuf::from("/does/not/exist.xlsx"))
            .sheet("Plan1".to_string())
            .category("name".to_string())
            .search("ana".to_string());
        let model = Model::init(&cfg);
        let ui = model.get_uidata();
        assert_eq!(ui.status_message, "Error: file not found");
        assert!(ui.view.columns.is_empty());
        assert_eq!(ui.view.filter, FilterInput::default());
    }

    #[test]
    fn startup_sheet_without_path_reports_missing_workbook() {
        let model = Model::init(&SVConfig::default().sheet("Plan1".to_string()));
        assert_eq!(model.get_uidata().status_message, "no workbook loaded");
    }

    #[test]
    fn broken_sheet_is_reported_in_status_line() {
        let mut model = Model::init(&SVConfig::default());
        model
            .session
            .attach_workbook(Box::new(
                MemoryWorkbook::new()
                    .with_sheet("ok", RawSheet::default())
                    .with_broken_sheet("bad"),
            ))
            .unwrap();
        send(&mut model, Message::SelectSheet);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::Enter);

        let ui = model.get_uidata();
        assert_eq!(ui.view.sheet, "bad");
        assert!(ui.view.columns.is_empty());
        assert!(ui.status_message.starts_with("could not parse sheet"));
        assert!(ui.status_message.contains("bad"));
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = model_with_fixture();
        send(&mut model, Message::Help);
        assert!(model.get_uidata().show_popup);
        send(&mut model, Message::Exit);
        assert!(!model.get_uidata().show_popup);
    }

    #[test]
    fn quit_sets_status() {
        let mut model = model_with_fixture();
        send(&mut model, Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn home_directory_is_expanded() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_path("~/book.xlsx"), PathBuf::from(home).join("book.xlsx"));
        }
    }
}
