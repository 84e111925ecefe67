use std::time::Duration;

use api_types::{
    catalogue::{ProductView, UnitView},
    snapshot::SnapshotEntry,
};
use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use engine::{
    BackendError, Confirm, EngineError, Fetch, KeyResolver, LoadOutcome, LoadTicket, PlanKey,
    PlanTable,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    client::Client,
    config::AppConfig,
    error::{AppError, Result},
    session::Session,
    ui::{
        self,
        keymap::{AppAction, map_key},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Price { row: usize },
    Comment { row: usize },
    Branch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Grid,
    Prompt { kind: Prompt, input: String },
    ConfirmReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ToastState {
    pub message: String,
    pub level: ToastLevel,
}

#[derive(Debug)]
pub struct AppState {
    pub title: String,
    pub table: PlanTable,
    pub mode: Mode,
    pub toast: Option<ToastState>,
    /// Non-empty when the configuration is unusable; no request is sent.
    pub config_issues: Vec<String>,
    /// Requests in flight.
    pub pending: usize,
    pub last_saved: Option<DateTime<Local>>,
}

impl AppState {
    fn notify(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(ToastState {
            message: message.into(),
            level,
        });
    }
}

/// Results of background requests, delivered to the event loop.
#[derive(Debug)]
enum Message {
    Units {
        branch_id: i64,
        result: std::result::Result<Vec<UnitView>, BackendError>,
    },
    Catalogue {
        plan_id: i64,
        result: std::result::Result<Vec<ProductView>, BackendError>,
    },
    Snapshot {
        ticket: LoadTicket,
        result: std::result::Result<Vec<SnapshotEntry>, BackendError>,
    },
    Saved {
        key: PlanKey,
        result: std::result::Result<(), BackendError>,
    },
}

pub struct App {
    config: AppConfig,
    client: Option<Client>,
    session: Session,
    pub state: AppState,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
    quit_armed: bool,
    /// Branch the operator asked for once while holding unsaved edits.
    switch_armed: Option<i64>,
    should_quit: bool,
}

fn load_resolver(path: Option<&str>) -> std::result::Result<KeyResolver, String> {
    let Some(path) = path else {
        return Ok(KeyResolver::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("cannot read mapping seed {path}: {err}"))?;
    let resolver = KeyResolver::from_json(&raw)
        .map_err(|err| format!("invalid mapping seed {path}: {err}"))?;
    tracing::info!(path, entries = resolver.len(), "mapping seed loaded");
    Ok(resolver)
}

impl App {
    pub fn new(config: AppConfig, session: Session) -> Result<Self> {
        let mut issues = config.validate();
        let resolver = match load_resolver(config.table.seed_path.as_deref()) {
            Ok(resolver) => resolver,
            Err(issue) => {
                issues.push(issue);
                KeyResolver::default()
            }
        };

        let client = if issues.is_empty() {
            Some(Client::new(
                &config.base_url,
                config.token.clone(),
                config.table.endpoints.clone(),
            )?)
        } else {
            for issue in &issues {
                tracing::warn!("configuration issue: {issue}");
            }
            None
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState {
            title: config.table.title.clone(),
            table: PlanTable::new(config.table.spec(), resolver),
            mode: Mode::Grid,
            toast: None,
            config_issues: issues,
            pending: 0,
            last_saved: None,
        };

        Ok(Self {
            config,
            client,
            session,
            state,
            tx,
            rx,
            quit_armed: false,
            switch_armed: None,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = ui::setup_terminal()?;
        self.start();
        let result = self.event_loop(&mut terminal).await;
        ui::restore_terminal(&mut terminal)?;
        self.persist_session();
        result
    }

    fn start(&mut self) {
        if self.client.is_none() {
            return;
        }
        if let (Some(plan_id), Some(branch_id)) = (self.config.plan_id, self.config.branch_id) {
            let fetch = self.state.table.select(PlanKey { plan_id, branch_id });
            self.dispatch(fetch);
        }
    }

    async fn event_loop(&mut self, terminal: &mut ui::Terminal) -> Result<()> {
        let tick_rate = Duration::from_millis(100);

        while !self.should_quit {
            while let Ok(message) = self.rx.try_recv() {
                self.handle_message(message);
            }

            let area = ui::frame_area(terminal)?;
            self.sync_viewport(area);
            terminal
                .draw(|frame| ui::render(frame, &self.state))
                .map_err(|err| AppError::Terminal(err.to_string()))?;

            if event::poll(tick_rate)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }
            // Let spawned requests make progress between frames.
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    fn sync_viewport(&mut self, area: ratatui::layout::Rect) {
        let (body, _) = ui::screens::grid::split(ui::grid_area(area));
        let geo = ui::screens::grid::geometry(body, &self.state.table);
        self.state
            .table
            .scroll_to_cursor(&geo.layout, geo.container, geo.frozen);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let text_entry = matches!(self.state.mode, Mode::Prompt { .. });
        let action = map_key(key, text_entry);
        if action != AppAction::Quit {
            self.quit_armed = false;
        }

        match self.state.mode.clone() {
            Mode::ConfirmReset => self.handle_confirm(action),
            Mode::Prompt { kind, input } => self.handle_prompt(action, kind, input),
            Mode::Grid => self.handle_grid(action),
        }
    }

    fn handle_confirm(&mut self, action: AppAction) {
        self.state.mode = Mode::Grid;
        match action {
            AppAction::Input('y' | 'Y') => {
                self.state.table.reset(Confirm);
                self.state.notify(ToastLevel::Info, "Matrix cleared; save to persist");
            }
            AppAction::Quit => self.quit(),
            _ => {}
        }
    }

    fn handle_prompt(&mut self, action: AppAction, kind: Prompt, mut input: String) {
        match action {
            AppAction::Input(ch) => {
                input.push(ch);
                self.state.mode = Mode::Prompt { kind, input };
            }
            AppAction::Backspace => {
                input.pop();
                self.state.mode = Mode::Prompt { kind, input };
            }
            AppAction::Cancel => self.state.mode = Mode::Grid,
            AppAction::Submit => {
                self.state.mode = Mode::Grid;
                self.apply_prompt(kind, &input);
            }
            AppAction::Save => self.save(),
            AppAction::Quit => self.quit(),
            _ => {}
        }
    }

    fn apply_prompt(&mut self, kind: Prompt, input: &str) {
        let result = match kind {
            Prompt::Price { row } => self.state.table.set_price(row, input),
            Prompt::Comment { row } => self.state.table.set_comment(row, input),
            Prompt::Branch => {
                match (input.trim().parse::<i64>(), self.state.table.key()) {
                    (Ok(branch_id), Some(key)) => {
                        self.switch_branch(key, branch_id);
                        Ok(())
                    }
                    (Ok(_), None) => Err(EngineError::NotReady("no plan selected".to_string())),
                    (Err(_), _) => Err(EngineError::Config(format!(
                        "\"{}\" is not a branch id",
                        input.trim()
                    ))),
                }
            }
        };
        if let Err(err) = result {
            self.state.notify(ToastLevel::Error, err.to_string());
        }
    }

    fn handle_grid(&mut self, action: AppAction) {
        let result = match action {
            AppAction::Quit => {
                self.quit();
                Ok(())
            }
            AppAction::Cancel => {
                self.state.toast = None;
                Ok(())
            }
            AppAction::Move(direction) => {
                self.state.table.move_cursor(direction);
                Ok(())
            }
            AppAction::Input(ch) if ch.is_ascii_digit() || ch == '.' || ch == ',' => {
                self.state.table.type_char(ch)
            }
            AppAction::Backspace => self.state.table.backspace(),
            AppAction::Clear => self.state.table.clear_cell(),
            AppAction::EditPrice => self.open_price_prompt(),
            AppAction::EditComment => {
                let row = self.state.table.cursor().row;
                match self.state.table.rows().get(row) {
                    Some(r) if self.state.table.is_editable() => {
                        let input = self.state.table.grid().comment(&r.id).to_string();
                        self.state.mode = Mode::Prompt {
                            kind: Prompt::Comment { row },
                            input,
                        };
                        Ok(())
                    }
                    _ => Err(EngineError::NotReady("catalogue still loading".to_string())),
                }
            }
            AppAction::SwitchBranch => {
                if self.client.is_some() && self.state.table.key().is_some() {
                    self.state.mode = Mode::Prompt {
                        kind: Prompt::Branch,
                        input: String::new(),
                    };
                }
                Ok(())
            }
            AppAction::Reset => {
                if self.state.table.is_editable() {
                    self.state.mode = Mode::ConfirmReset;
                }
                Ok(())
            }
            AppAction::Reload => {
                if let Some(ticket) = self.state.table.reload() {
                    self.spawn_snapshot(ticket);
                    self.state.notify(ToastLevel::Info, "Reloading saved values");
                }
                Ok(())
            }
            AppAction::Save => {
                self.save();
                Ok(())
            }
            AppAction::Submit | AppAction::Input(_) | AppAction::None => Ok(()),
        };

        if let Err(err) = result {
            self.state.notify(ToastLevel::Error, err.to_string());
        }
    }

    fn open_price_prompt(&mut self) -> std::result::Result<(), EngineError> {
        let table = &self.state.table;
        if !table.spec().editable_prices {
            return Err(EngineError::Config(
                "prices are read-only for this table".to_string(),
            ));
        }
        let row = table.cursor().row;
        let Some(r) = table.rows().get(row) else {
            return Err(EngineError::NotReady("catalogue still loading".to_string()));
        };
        let input = table.prices().raw(&r.id).unwrap_or_default().to_string();
        self.state.mode = Mode::Prompt {
            kind: Prompt::Price { row },
            input,
        };
        Ok(())
    }

    fn quit(&mut self) {
        if self.state.table.is_dirty() && !self.quit_armed {
            self.quit_armed = true;
            self.state.notify(
                ToastLevel::Warning,
                "Unsaved changes. Press q again to quit without saving",
            );
            return;
        }
        self.should_quit = true;
    }

    fn switch_branch(&mut self, current: PlanKey, branch_id: i64) {
        if branch_id == current.branch_id {
            self.state
                .notify(ToastLevel::Info, format!("Already on branch {branch_id}"));
            return;
        }
        if self.state.table.is_dirty() && self.switch_armed != Some(branch_id) {
            self.switch_armed = Some(branch_id);
            self.state.notify(
                ToastLevel::Warning,
                format!("Unsaved changes. Enter branch {branch_id} again to discard them"),
            );
            return;
        }
        self.switch_armed = None;
        self.select(PlanKey {
            plan_id: current.plan_id,
            branch_id,
        });
    }

    fn select(&mut self, key: PlanKey) {
        let fetch = self.state.table.select(key);
        self.dispatch(fetch);
    }

    fn dispatch(&mut self, fetch: Fetch) {
        if let Some(branch_id) = fetch.units {
            self.spawn_units(branch_id);
        }
        if let Some(plan_id) = fetch.rows {
            self.spawn_catalogue(plan_id);
        }
        if let Some(ticket) = fetch.snapshot {
            self.spawn_snapshot(ticket);
        }
    }

    fn spawn_units(&mut self, branch_id: i64) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let tx = self.tx.clone();
        self.state.pending += 1;
        tokio::spawn(async move {
            let result = client.units(branch_id).await.map_err(BackendError::from);
            let _ = tx.send(Message::Units { branch_id, result });
        });
    }

    fn spawn_catalogue(&mut self, plan_id: i64) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let tx = self.tx.clone();
        self.state.pending += 1;
        tokio::spawn(async move {
            let result = client.catalogue(plan_id).await.map_err(BackendError::from);
            let _ = tx.send(Message::Catalogue { plan_id, result });
        });
    }

    fn spawn_snapshot(&mut self, ticket: LoadTicket) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let tx = self.tx.clone();
        self.state.pending += 1;
        tokio::spawn(async move {
            let result = client.snapshot(ticket.key).await.map_err(BackendError::from);
            let _ = tx.send(Message::Snapshot { ticket, result });
        });
    }

    fn save(&mut self) {
        let Some(client) = self.client.clone() else {
            self.state
                .notify(ToastLevel::Error, "Fix the configuration before saving");
            return;
        };
        let plan = match self.state.table.prepare_save() {
            Ok(plan) => plan,
            Err(EngineError::SaveInProgress) => {
                self.state.notify(ToastLevel::Info, "A save is already running");
                return;
            }
            Err(err) => {
                self.state.notify(ToastLevel::Error, err.to_string());
                return;
            }
        };

        let tx = self.tx.clone();
        self.state.pending += 1;
        self.state.notify(ToastLevel::Info, "Saving…");
        tokio::spawn(async move {
            let key = plan.key;
            let result = plan.execute(&client).await;
            let _ = tx.send(Message::Saved { key, result });
        });
    }

    fn handle_message(&mut self, message: Message) {
        self.state.pending = self.state.pending.saturating_sub(1);
        match message {
            Message::Units { branch_id, result } => match result {
                Ok(units) => {
                    if let Some(ticket) = self.state.table.set_units(branch_id, &units) {
                        self.spawn_snapshot(ticket);
                    }
                }
                Err(err) => {
                    if self.state.table.key().map(|k| k.branch_id) == Some(branch_id) {
                        self.state
                            .notify(ToastLevel::Error, format!("Could not load units: {err}"));
                    }
                }
            },
            Message::Catalogue { plan_id, result } => match result {
                Ok(products) => {
                    if let Some(ticket) = self.state.table.set_catalogue(plan_id, &products) {
                        self.spawn_snapshot(ticket);
                    }
                }
                Err(err) => {
                    if self.state.table.key().map(|k| k.plan_id) == Some(plan_id) {
                        self.state
                            .notify(ToastLevel::Error, format!("Could not load rows: {err}"));
                    }
                }
            },
            Message::Snapshot { ticket, result } => {
                match self.state.table.apply_snapshot(&ticket, result) {
                    LoadOutcome::Applied(merge) => {
                        if merge.skipped > 0 {
                            self.state.notify(
                                ToastLevel::Warning,
                                format!("{} saved values do not fit this grid", merge.skipped),
                            );
                        }
                    }
                    LoadOutcome::Fallback(err) => self.state.notify(
                        ToastLevel::Warning,
                        format!("Saved values unavailable, starting blank: {err}"),
                    ),
                    LoadOutcome::Failed(err) => self
                        .state
                        .notify(ToastLevel::Error, format!("Could not load saved values: {err}")),
                    LoadOutcome::Stale => {}
                }
            }
            Message::Saved { key, result } => match self.state.table.finish_save(key, result) {
                Ok(reload) => {
                    self.state.last_saved = Some(Local::now());
                    self.state.notify(ToastLevel::Success, "Saved");
                    self.session.remember(key);
                    if let Some(ticket) = reload {
                        self.spawn_snapshot(ticket);
                    }
                }
                Err(err) => self
                    .state
                    .notify(ToastLevel::Error, format!("Save failed: {err}")),
            },
        }
    }

    fn persist_session(&mut self) {
        if let Some(key) = self.state.table.key() {
            self.session.remember(key);
        }
        if let Err(err) = self.session.save(&self.config.session_path) {
            tracing::warn!("failed to write session: {err}");
        }
    }
}
