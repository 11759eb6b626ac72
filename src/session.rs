//! Session orchestration: login, greeting, chat turns, logout.
//!
//! All per-session state lives in [`SessionContext`]; every handler takes it
//! explicitly. Turns are never removed from the transcript, whatever fails.

use anyhow::Result;
use std::sync::Arc;

use crate::completion::{CompletionClient, GenerationParams, OpenAiClient};
use crate::config::{self, Backend, Config};
use crate::error::ChatError;
use crate::export::{ExportReceipt, Exporter};
use crate::heartbeat::{Heartbeat, Liveness};
use crate::identity::{IdentityProvider, IdentityToolkit, LocalDirectory, User};
use crate::terminal::Surface;
use crate::transcript::{Clock, Role, SystemClock, Transcript, TranscriptError, Turn, annotate};
use crate::upload::{GcsStore, LocalStore, ObjectStore};

pub const GREETING: &str = "Hi there! Ready to start your essay? I'm here to guide and help you \
improve your argumentative essay writing skills with activities like:\n\
1. **Topic Selection**\n\
2. **Outlining**\n\
3. **Drafting**\n\
4. **Reviewing**\n\
5. **Proofreading**\n\n\
What topic are you interested in writing about? If you'd like suggestions, just let me know!";

/// External collaborators shared by every session
pub struct Services {
    pub identity: Box<dyn IdentityProvider>,
    pub completion: Box<dyn CompletionClient>,
    pub exporter: Exporter,
    pub clock: Arc<dyn Clock>,
    pub system_prompt: Option<String>,
}

impl Services {
    /// Wire up the configured backend. Secrets come from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.zone()?));
        let timeout = config.request_timeout();

        let identity: Box<dyn IdentityProvider>;
        let store: Box<dyn ObjectStore>;
        match config.backend {
            Backend::Firebase => {
                if config.project_id.is_empty() || config.storage_bucket.is_empty() {
                    anyhow::bail!(
                        "project_id and storage_bucket must be set for the firebase backend \
                         (essaychat config set project_id ...)"
                    );
                }
                let token = config::secret(config::GOOGLE_TOKEN_ENV)?;
                identity = Box::new(IdentityToolkit::new(
                    &config.identity_url,
                    &config.project_id,
                    token.clone(),
                    timeout,
                ));
                store = Box::new(GcsStore::new(
                    &config.storage_url,
                    &config.storage_url,
                    &config.storage_bucket,
                    token,
                    timeout,
                ));
            }
            Backend::Local => {
                identity = Box::new(LocalDirectory);
                store = Box::new(LocalStore::new(config.local_bucket_dir()?));
            }
        }

        let completion = OpenAiClient::new(
            &config.completion_url,
            config::secret(config::OPENAI_API_KEY_ENV)?,
            GenerationParams::for_model(&config.model),
            timeout,
        );
        let exporter = Exporter::new(store, config.export_dir()?, clock.clone())
            .with_ledger(config::ledger_path()?);

        Ok(Self {
            identity,
            completion: Box::new(completion),
            exporter,
            clock,
            system_prompt: config.system_prompt.clone(),
        })
    }

    /// Look the user up and open an empty session. Nothing is created on failure.
    pub fn login(&self, email: &str) -> Result<SessionContext, ChatError> {
        let user = self.identity.lookup(email).map_err(ChatError::login)?;
        tracing::info!(uid = %user.uid, email = %user.email, "logged in");
        Ok(SessionContext {
            user,
            transcript: Transcript::new(),
            liveness: Liveness::new(true),
        })
    }

    fn record(
        &self,
        ctx: &mut SessionContext,
        role: Role,
        content: String,
    ) -> Result<Turn, ChatError> {
        let turn = annotate(Turn::new(role, content), self.clock.as_ref())?;
        Ok(ctx.transcript.append(turn).clone())
    }

    fn export(
        &self,
        ctx: &mut SessionContext,
        surface: &mut dyn Surface,
    ) -> Result<ExportReceipt, ChatError> {
        match self.exporter.export(&mut ctx.transcript, &ctx.user) {
            Ok(receipt) => {
                surface.show_notice(&format!("Chat log saved. Access it at {}", receipt.public_url));
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "chat log export failed");
                match err.downcast::<TranscriptError>() {
                    Ok(err) => Err(ChatError::Transcript(err)),
                    Err(err) => Err(ChatError::export(err)),
                }
            }
        }
    }

    /// Seed the greeting on first use, show the visible history, and export.
    /// Returns `None` when the session was already started.
    pub fn start(
        &self,
        ctx: &mut SessionContext,
        surface: &mut dyn Surface,
    ) -> Result<Option<ExportReceipt>, ChatError> {
        let seeded = ctx.transcript.is_empty();
        if seeded {
            if let Some(prompt) = &self.system_prompt {
                self.record(ctx, Role::System, prompt.clone())?;
            }
            self.record(ctx, Role::Assistant, GREETING.to_string())?;
        }
        for turn in ctx.transcript.visible() {
            surface.show_turn(turn);
        }
        if seeded {
            self.export(ctx, surface).map(Some)
        } else {
            Ok(None)
        }
    }

    /// One user message: append it, ask for a reply, append that, export.
    ///
    /// A completion failure leaves the user turn in place with no reply and
    /// no export. An export failure leaves both turns in place.
    pub fn handle_turn(
        &self,
        ctx: &mut SessionContext,
        prompt: &str,
        surface: &mut dyn Surface,
    ) -> Result<ExportReceipt, ChatError> {
        let user_turn = self.record(ctx, Role::User, prompt.to_string())?;
        surface.show_turn(&user_turn);

        let reply = self
            .completion
            .complete(&ctx.transcript.completion_messages())
            .map_err(ChatError::completion)?;

        let reply_turn = self.record(ctx, Role::Assistant, reply)?;
        surface.show_turn(&reply_turn);

        self.export(ctx, surface)
    }

    /// Run a session until the user quits. Failed turns are reported and the
    /// loop keeps going.
    pub fn run(&self, ctx: &mut SessionContext, surface: &mut dyn Surface) -> Result<()> {
        if let Err(err) = self.start(ctx, surface) {
            surface.show_error(&err.to_string());
        }
        while let Some(prompt) = surface.read_input()? {
            if prompt.trim().is_empty() {
                continue;
            }
            if let Err(err) = self.handle_turn(ctx, &prompt, surface) {
                surface.show_error(&err.to_string());
            }
        }
        Ok(())
    }
}

/// State owned by one logged-in session
#[derive(Debug)]
pub struct SessionContext {
    user: User,
    transcript: Transcript,
    liveness: Liveness,
}

impl SessionContext {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_logged_in(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Flag shared read-only with the heartbeat thread
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn spawn_heartbeat(&self, interval: std::time::Duration) -> Heartbeat {
        Heartbeat::spawn(self.liveness(), interval)
    }

    /// Drop the session. The in-memory transcript is discarded.
    pub fn logout(self) {
        self.liveness.set(false);
        tracing::info!(uid = %self.user.uid, turns = self.transcript.len(), "logged out");
    }
}
