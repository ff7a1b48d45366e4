use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::distro::OperationResult;
use crate::model::command::{Command, HELP, Selection};
use crate::model::config::AppConfig;
use crate::model::mode::Mode;
use crate::msg::Msg;
use crate::system::{SystemManager, supported_distributions};

const MAX_NOTIFICATIONS: usize = 8;
const EMPTY_INPUT: &str = "Please enter a valid kernel version or command.";
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub struct App {
    pub mode: Mode,
    pub config: AppConfig,
    system: Arc<SystemManager>,
    input: String,
    pub selected_kernel: Option<String>,
    pub status_line: String,
    notifications: VecDeque<String>,
    pub should_quit: bool,
    event_tx: mpsc::Sender<Msg>,
    tick: usize,
}

impl App {
    pub fn new(mut config: AppConfig, system: SystemManager, event_tx: mpsc::Sender<Msg>) -> Self {
        if let Some(name) = system.backend_name() {
            if config.record_backend(name) {
                match config.save() {
                    Ok(()) => tracing::info!("recorded backend {name}"),
                    Err(err) => tracing::warn!("failed to persist backend {name}: {err:#}"),
                }
            }
        }

        let status_line = if system.is_supported() {
            "Ready. Type 'help' for commands.".to_string()
        } else {
            format!(
                "Automatic dependency installation unavailable (supported: {})",
                supported_distributions()
            )
        };

        Self {
            mode: Mode::Input,
            config,
            system: Arc::new(system),
            input: String::new(),
            selected_kernel: None,
            status_line,
            notifications: VecDeque::new(),
            should_quit: false,
            event_tx,
            tick: 0,
        }
    }

    /// Typing is disabled when there is nothing to select from. Shortcuts
    /// still work.
    fn input_enabled(&self) -> bool {
        !self.config.kernels.available.is_empty()
    }

    fn placeholder(&self) -> &'static str {
        if self.input_enabled() {
            "Enter a kernel version or command"
        } else {
            "No kernel versions configured; input disabled"
        }
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::OperationFinished(result) => self.finish_operation(result),
            Msg::Tick => {
                if self.mode == Mode::Busy {
                    self.tick = self.tick.wrapping_add(1);
                }
            }
            Msg::Resize => {}
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => self.request_quit(),
                KeyCode::Char('d') => self.install_dependencies(),
                _ => {}
            }
            return;
        }

        if !self.input_enabled() {
            return;
        }

        match key.code {
            KeyCode::Enter => {
                let input = std::mem::take(&mut self.input);
                self.submit(&input);
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Char(ch) => self.input.push(ch),
            _ => {}
        }
    }

    fn submit(&mut self, input: &str) {
        match Command::parse(input) {
            Command::InstallDeps => self.install_dependencies(),
            Command::Prepare(version) => {
                let result = self.system.prepare_kernel_source(&version);
                self.show_result(&result);
            }
            Command::Configure(source_dir) => {
                let Some(version) = self.selected_kernel.clone() else {
                    self.show_result(&OperationResult::failed(
                        "Select a kernel version before applying its config",
                    ));
                    return;
                };
                let changes = self.config.kernel.config.clone();
                self.spawn_operation("Applying kernel config...", move |system| {
                    system.configure_kernel(&source_dir, &version, &changes)
                });
            }
            Command::Status => self.set_status(self.status_summary()),
            Command::Help => self.set_status(HELP),
            Command::Quit => self.request_quit(),
            Command::SelectKernel(version) => {
                let selection = Selection::choose(&self.config.kernels.available, &version);
                if let Selection::Selected(version) = &selection {
                    self.selected_kernel = Some(version.clone());
                }
                self.set_status(selection.message());
            }
            Command::Empty => self.set_status(EMPTY_INPUT),
        }
    }

    /// Leaving while a worker runs would orphan its package manager, so quit
    /// waits until the operation has reported back.
    fn request_quit(&mut self) {
        if self.mode == Mode::Busy {
            tracing::info!("quit requested while an operation is running");
            self.set_status("An operation is still running; quit again once it finishes");
            return;
        }
        self.should_quit = true;
    }

    fn install_dependencies(&mut self) {
        self.spawn_operation("Installing dependencies...", |system| {
            system.install_dependencies()
        });
    }

    /// Run `op` on a worker thread. Only one operation runs at a time.
    fn spawn_operation<F>(&mut self, label: &str, op: F)
    where
        F: FnOnce(&SystemManager) -> OperationResult + Send + 'static,
    {
        if self.mode == Mode::Busy {
            self.set_status("Another operation is still running");
            return;
        }

        self.mode = Mode::Busy;
        self.set_status(label);

        let system = Arc::clone(&self.system);
        let tx = self.event_tx.clone();
        thread::spawn(move || {
            let result = op(&system);
            if tx.send(Msg::OperationFinished(result)).is_err() {
                tracing::warn!("operation finished after the interface closed");
            }
        });
    }

    fn finish_operation(&mut self, result: OperationResult) {
        self.mode = Mode::Input;
        self.show_result(&result);
    }

    fn show_result(&mut self, result: &OperationResult) {
        if result.success {
            tracing::info!("{}", result.message);
        } else {
            tracing::warn!("{}", result.message);
        }
        self.set_status(result.to_string());
    }

    fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.notifications.push_back(message.clone());
        while self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.status_line = message;
    }

    fn status_summary(&self) -> String {
        let status = self.system.status();
        let kernel = self.selected_kernel.as_deref().unwrap_or("none");
        match status.backend_name {
            Some(backend) => format!(
                "Distribution: {} | Backend: {backend} | Kernel: {kernel}",
                status.distribution
            ),
            None => format!(
                "Distribution: {} | unsupported (supported: {}) | Kernel: {kernel}",
                status.distribution,
                supported_distributions()
            ),
        }
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // welcome + system
                Constraint::Min(3),    // kernels + log
                Constraint::Length(3), // input
                Constraint::Length(1), // status bar
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Min(1)])
            .split(chunks[1]);
        self.render_kernels(frame, body[0]);
        self.render_log(frame, body[1]);

        self.render_input(frame, chunks[2]);
        self.render_status_bar(frame, chunks[3]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let status = self.system.status();
        let backend_line = match (status.backend_name, &status.failure) {
            (Some(name), _) => Line::from(vec![
                Span::raw("Backend: "),
                Span::styled(name, Style::default().fg(Color::Green)),
            ]),
            (None, failure) => Line::from(vec![
                Span::raw("Backend: "),
                Span::styled(
                    failure.as_deref().unwrap_or("not loaded").to_string(),
                    Style::default().fg(Color::Red),
                ),
            ]),
        };

        let mut distribution = match &status.pretty_name {
            Some(pretty) => format!("Distribution: {pretty} ({})", status.distribution),
            None => format!("Distribution: {}", status.distribution),
        };
        if !status.id_like.is_empty() {
            distribution.push_str(&format!(", like {}", status.id_like.join(", ")));
        }
        let distribution_style = if status.supported {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Yellow)
        };

        let lines = vec![
            Line::from(Span::styled(
                "Welcome to the Kernel Toolkit",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(distribution, distribution_style)),
            backend_line,
        ];

        let header = Paragraph::new(lines).block(
            Block::default()
                .title(" tkt ")
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Rgb(15, 15, 24))),
        );
        frame.render_widget(header, area);
    }

    fn render_kernels(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = if self.config.kernels.available.is_empty() {
            vec![ListItem::new(Span::styled(
                "none configured",
                Style::default().fg(Color::DarkGray),
            ))]
        } else {
            self.config
                .kernels
                .available
                .iter()
                .map(|version| {
                    if self.selected_kernel.as_deref() == Some(version.as_str()) {
                        ListItem::new(format!("> {version}")).style(
                            Style::default()
                                .fg(Color::Black)
                                .bg(Color::Cyan)
                                .add_modifier(Modifier::BOLD),
                        )
                    } else {
                        ListItem::new(format!("  {version}"))
                    }
                })
                .collect()
        };

        let list = List::new(items).block(
            Block::default()
                .title(" Available kernels ")
                .borders(Borders::ALL),
        );
        frame.render_widget(list, area);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .notifications
            .iter()
            .map(|note| {
                let style = if note.starts_with('✗') {
                    Style::default().fg(Color::Red)
                } else if note.starts_with('✓') {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Gray)
                };
                Line::from(Span::styled(note.clone(), style))
            })
            .collect();

        let log = Paragraph::new(lines).block(Block::default().title(" Output ").borders(Borders::ALL));
        frame.render_widget(log, area);
    }

    fn render_input(&self, frame: &mut Frame, area: Rect) {
        let text = if self.input.is_empty() {
            Span::styled(self.placeholder(), Style::default().fg(Color::DarkGray))
        } else {
            Span::raw(self.input.clone())
        };

        let prompt = Paragraph::new(Line::from(text))
            .block(Block::default().title(" Command ").borders(Borders::ALL));
        frame.render_widget(prompt, area);

        if self.mode == Mode::Input && self.input_enabled() {
            let cursor_x = area.x + 1 + self.input.chars().count() as u16;
            frame.set_cursor_position((cursor_x, area.y + 1));
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mode_style = match self.mode {
            Mode::Input => Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            Mode::Busy => Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        };

        let label = match self.mode {
            Mode::Busy => format!(" {} {} ", self.mode.label(), SPINNER[self.tick % SPINNER.len()]),
            Mode::Input => format!(" {} ", self.mode.label()),
        };

        let bar = Line::from(vec![
            Span::styled(label, mode_style),
            Span::styled(
                format!(" {} ", self.status_line),
                Style::default().fg(Color::Gray).bg(Color::DarkGray),
            ),
        ]);
        frame.render_widget(
            Paragraph::new(bar).style(Style::default().bg(Color::DarkGray)),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::process::testing::RecordingRunner;

    fn app_on(distribution: &str, runner: Arc<RecordingRunner>) -> (App, mpsc::Receiver<Msg>) {
        let (tx, rx) = mpsc::channel();
        let config = AppConfig::defaults().unwrap();
        let system = SystemManager::for_distribution(distribution, runner);
        (App::new(config, system, tx), rx)
    }

    fn key(code: KeyCode) -> Msg {
        Msg::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(ch: char) -> Msg {
        Msg::Key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
    }

    fn type_line(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.update(key(KeyCode::Char(ch))).unwrap();
        }
        app.update(key(KeyCode::Enter)).unwrap();
    }

    fn wait_for_result(app: &mut App, rx: &mpsc::Receiver<Msg>) {
        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(msg, Msg::OperationFinished(_)));
        app.update(msg).unwrap();
    }

    #[test]
    fn backend_is_recorded_on_startup() {
        let (app, _rx) = app_on("arch", Arc::new(RecordingRunner::succeeding()));
        assert_eq!(app.config.settings.backend.as_deref(), Some("ArchBackend"));
    }

    #[test]
    fn unsupported_host_records_nothing() {
        let (app, _rx) = app_on("fedora", Arc::new(RecordingRunner::succeeding()));
        assert_eq!(app.config.settings.backend, None);
        assert!(app.status_line.contains("arch, debian, ubuntu"));
    }

    #[test]
    fn install_runs_on_worker_and_reports() {
        let runner = Arc::new(RecordingRunner::succeeding());
        let (mut app, rx) = app_on("arch", Arc::clone(&runner));

        type_line(&mut app, "DEPS");
        assert_eq!(app.mode, Mode::Busy);
        assert_eq!(app.status_line, "Installing dependencies...");

        wait_for_result(&mut app, &rx);
        assert_eq!(app.mode, Mode::Input);
        assert_eq!(app.status_line, "✓ Arch dependencies installed successfully");
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn second_install_is_rejected_while_busy() {
        let runner = Arc::new(RecordingRunner::succeeding());
        let (mut app, rx) = app_on("debian", Arc::clone(&runner));

        app.update(ctrl('d')).unwrap();
        app.update(ctrl('d')).unwrap();
        assert_eq!(app.status_line, "Another operation is still running");

        wait_for_result(&mut app, &rx);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn unsupported_install_reports_failure() {
        let runner = Arc::new(RecordingRunner::succeeding());
        let (mut app, rx) = app_on("nixos", Arc::clone(&runner));

        app.update(ctrl('d')).unwrap();
        wait_for_result(&mut app, &rx);
        assert_eq!(
            app.status_line,
            "✗ nixos is not supported for automatic dependency installation"
        );
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn kernel_selection_messages() {
        let (mut app, _rx) = app_on("arch", Arc::new(RecordingRunner::succeeding()));

        type_line(&mut app, "6.16");
        assert_eq!(app.status_line, " Kernel version 6.16 selected");
        assert_eq!(app.selected_kernel.as_deref(), Some("6.16"));

        type_line(&mut app, "4.19");
        assert_eq!(app.status_line, " Kernel version 4.19 not in available list");
        assert_eq!(app.selected_kernel.as_deref(), Some("6.16"));

        type_line(&mut app, "");
        assert_eq!(app.status_line, EMPTY_INPUT);
    }

    #[test]
    fn config_requires_a_selected_kernel() {
        let (mut app, _rx) = app_on("arch", Arc::new(RecordingRunner::succeeding()));
        type_line(&mut app, "config:/usr/src/linux");
        assert!(app.status_line.starts_with('✗'));
        assert_eq!(app.mode, Mode::Input);
    }

    #[test]
    fn typing_is_disabled_without_kernels() {
        let (mut app, _rx) = app_on("arch", Arc::new(RecordingRunner::succeeding()));
        app.config.kernels.available.clear();

        type_line(&mut app, "quit");
        assert!(!app.should_quit);

        app.update(ctrl('q')).unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn quit_waits_for_running_operation() {
        let (mut app, rx) = app_on("arch", Arc::new(RecordingRunner::succeeding()));

        app.update(ctrl('d')).unwrap();
        app.update(ctrl('q')).unwrap();
        app.update(ctrl('c')).unwrap();
        type_line(&mut app, "quit");
        assert!(!app.should_quit);
        assert!(app.status_line.starts_with("An operation is still running"));

        wait_for_result(&mut app, &rx);
        app.update(ctrl('q')).unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn quit_command() {
        let (mut app, _rx) = app_on("arch", Arc::new(RecordingRunner::succeeding()));
        type_line(&mut app, "exit");
        assert!(app.should_quit);
    }

    #[test]
    fn renders_system_and_kernels() {
        let (mut app, _rx) = app_on("ubuntu", Arc::new(RecordingRunner::succeeding()));
        type_line(&mut app, "6.15");

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| app.view(f)).unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("Welcome to the Kernel Toolkit"));
        assert!(screen.contains("UbuntuBackend"));
        assert!(screen.contains("> 6.15"));
        assert!(screen.contains("Kernel version 6.15 selected"));
    }
}
