use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, instrument};

use crate::api::{ApiError, RemoteApi};
use crate::board::Board;
use crate::cli::{Command, CredentialArgs, ShellCommand, ShellLine, split_words};
use crate::dnd::{DragResult, DropAction, DropLocation};
use crate::notify::Notifier;
use crate::render::Renderer;
use crate::session::Session;
use crate::task::{Credentials, DraftTask, Status, TaskId};

const LOGIN_FALLBACK: &str = "Login failed.";
const REGISTER_FALLBACK: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Application context: one session, one board and the collaborators they
/// share. Created at startup and dropped at exit.
pub struct App {
    session: Session,
    board: Board,
    notifier: Arc<dyn Notifier>,
    renderer: Renderer,
    login_defaults: CredentialArgs,
    board_loaded: bool,
}

impl App {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        notifier: Arc<dyn Notifier>,
        renderer: Renderer,
        login_defaults: CredentialArgs,
    ) -> Self {
        Self {
            session: Session::new(api.clone()),
            board: Board::new(api, notifier.clone()),
            notifier,
            renderer,
            login_defaults,
            board_loaded: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Resolves the session once, before any command runs.
    pub async fn start(&mut self) -> bool {
        self.session.check_session().await
    }

    #[instrument(skip(self))]
    pub async fn execute(&mut self, command: Command) -> anyhow::Result<()> {
        let result = self.dispatch(command).await;
        if self.board.take_session_expired() {
            self.session.expire();
            self.board_loaded = false;
        }
        result
    }

    async fn dispatch(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Whoami => {
                let message = if self.session.check_session().await {
                    "logged in"
                } else {
                    "not logged in"
                };
                self.renderer.print_message(message)?;
            }
            Command::Login(args) => {
                let credentials = self.credentials_from(&args)?;
                self.login(&credentials).await?;
            }
            Command::Logout => {
                let result = self.session.logout().await;
                self.board.clear();
                self.board_loaded = false;
                result.map_err(|err| anyhow!("logout failed: {}", err.user_message()))?;
                self.notifier.success("Logged out");
            }
            Command::Register(args) => {
                let credentials = self.credentials_from(&args)?;
                self.session
                    .register(&credentials)
                    .await
                    .map_err(|err| failure_message(&err, REGISTER_FALLBACK))?;
                self.notifier
                    .success("Registration successful! Please login.");
            }
            Command::Board => {
                self.ensure_board().await?;
                self.renderer.print_board(&self.board.columns())?;
            }
            Command::Refresh => {
                self.ensure_authenticated().await?;
                self.board_loaded = self.board.load_all().await;
                self.renderer.print_board(&self.board.columns())?;
            }
            Command::Add {
                title,
                description,
                status,
            } => {
                let draft = DraftTask::new(&title, description.as_deref(), status)?;
                self.ensure_board().await?;
                if let Some(task) = self.board.create(draft).await {
                    self.renderer.print_task(&task)?;
                }
            }
            Command::Move { id, status } => {
                self.ensure_board().await?;
                let task_id = self.resolve_id(&id);
                if let Some(task) = self.board.change_status(&task_id, status).await {
                    self.renderer.print_task(&task)?;
                }
            }
            Command::Advance { id } => {
                self.ensure_board().await?;
                let task_id = self.resolve_id(&id);
                match self.board.advance(&task_id).await {
                    Some(task) => self.renderer.print_task(&task)?,
                    None if self.board.find(&task_id).is_none() => {
                        self.renderer
                            .print_message(&format!("{id}: no such task on the board"))?;
                    }
                    None => {}
                }
            }
            Command::Delete { id } => {
                self.ensure_board().await?;
                let task_id = self.resolve_id(&id);
                self.board.delete(&task_id).await;
            }
            Command::Drag { id, to, index } => {
                self.ensure_board().await?;
                self.drag(&id, to, index).await?;
            }
        }

        Ok(())
    }

    /// Reads commands line by line until end of input, `quit` or Ctrl-C.
    pub async fn run_shell<R>(&mut self, input: R, prompt: bool) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let state = if self.session.is_authenticated() {
            "logged in"
        } else {
            "not logged in"
        };
        info!(state, "entering shell");

        loop {
            if prompt {
                let mut out = std::io::stdout().lock();
                write!(out, "taskboard> ")?;
                out.flush()?;
            }

            let next = tokio::select! {
                line = lines.next_line() => line.context("failed reading shell input")?,
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted; leaving shell");
                    None
                }
            };
            let Some(line) = next else {
                break;
            };

            match self.handle_line(&line).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => self.notifier.error(&format!("{err:#}")),
            }
        }

        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> anyhow::Result<Flow> {
        let words = split_words(line)?;
        if words.is_empty() {
            return Ok(Flow::Continue);
        }

        let parsed = match ShellLine::try_parse_from(&words) {
            Ok(parsed) => parsed,
            Err(err) => {
                // Covers `help` and `--help` as well as usage errors.
                err.print().context("failed writing shell usage")?;
                return Ok(Flow::Continue);
            }
        };

        match parsed.command {
            ShellCommand::Quit => Ok(Flow::Quit),
            ShellCommand::Run(command) => {
                self.execute(command).await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn drag(
        &mut self,
        raw_id: &str,
        to: Option<Status>,
        index: Option<usize>,
    ) -> anyhow::Result<()> {
        let tasks = self.board.tasks();
        let located = self
            .board
            .resolve(raw_id)
            .and_then(|task_id| DragResult::locate(&tasks, &task_id, None));
        let Some(mut drag) = located else {
            debug!(id = raw_id, "drag ignored because task is not on the board");
            return Ok(());
        };

        drag.destination = to.map(|status| {
            let default_index = if status == drag.source.status {
                drag.source.index
            } else {
                0
            };
            DropLocation::new(status, index.unwrap_or(default_index))
        });

        let action = self.board.apply_drop(&drag).await;
        if !matches!(action, DropAction::Ignore(_)) {
            self.renderer.print_board(&self.board.columns())?;
        }
        Ok(())
    }

    async fn login(&mut self, credentials: &Credentials) -> anyhow::Result<()> {
        self.session
            .login(credentials)
            .await
            .map_err(|err| failure_message(&err, LOGIN_FALLBACK))?;
        self.board_loaded = false;
        self.notifier.success("Login successful!");
        Ok(())
    }

    async fn ensure_authenticated(&mut self) -> anyhow::Result<()> {
        if self.session.is_authenticated() {
            return Ok(());
        }

        let Ok(credentials) = self.credentials_from(&CredentialArgs::default()) else {
            bail!("not logged in; run `login` or pass --email and --password");
        };
        self.login(&credentials).await
    }

    async fn ensure_board(&mut self) -> anyhow::Result<()> {
        self.ensure_authenticated().await?;
        if !self.board_loaded {
            self.board_loaded = self.board.load_all().await;
        }
        Ok(())
    }

    fn credentials_from(&self, args: &CredentialArgs) -> anyhow::Result<Credentials> {
        let email = args
            .email
            .as_deref()
            .or(self.login_defaults.email.as_deref());
        let password = args
            .password
            .as_deref()
            .or(self.login_defaults.password.as_deref());

        match (email, password) {
            (Some(email), Some(password)) => Ok(Credentials::new(email, password)?),
            _ => bail!("email and password are required (--email, --password or TASKBOARD_PASSWORD)"),
        }
    }

    fn resolve_id(&self, raw: &str) -> TaskId {
        self.board
            .resolve(raw)
            .unwrap_or_else(|| TaskId::new(raw.trim()))
    }
}

fn failure_message(err: &ApiError, fallback: &str) -> anyhow::Error {
    anyhow!(err.remote_message().unwrap_or(fallback).to_string())
}
