use anyhow::Context;
use crewtrack_core::config::{Config, WarnLevel};
use crewtrack_core::identity::LocalIdentity;
use crewtrack_core::model::Actor;
use crewtrack_core::paths;
use crewtrack_core::store::YamlStore;
use crewtrack_core::workspace::Workspace;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type CliWorkspace = Workspace<YamlStore, LocalIdentity<YamlStore>>;

/// Everything one CLI invocation needs: the store on disk, the config and
/// the user named by `--as`.
pub struct Session {
    pub root: PathBuf,
    pub config: Config,
    store: Arc<YamlStore>,
    user: Option<String>,
}

impl Session {
    pub fn open(root: &Path, user: Option<&str>) -> anyhow::Result<Self> {
        if !paths::crewtrack_dir(root).is_dir() {
            anyhow::bail!(
                "no crewtrack workspace at {} (run `crewtrack init` first)",
                root.display()
            );
        }
        let config = Config::load(root).context("failed to load config")?;
        for w in config.validate() {
            match w.level {
                WarnLevel::Error => tracing::error!("config: {}", w.message),
                WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            config,
            store: Arc::new(YamlStore::open(root)),
            user: user.map(str::to_string),
        })
    }

    pub fn identity(&self) -> LocalIdentity<YamlStore> {
        let identity = LocalIdentity::new(self.store.clone(), self.config.auth.max_reauth_attempts)
            .with_lockout(chrono::Duration::minutes(i64::from(self.config.auth.lockout_minutes)));
        match &self.user {
            Some(username) => identity.signed_in(username.as_str()),
            None => identity,
        }
    }

    pub fn workspace(&self) -> CliWorkspace {
        Workspace::new(self.store.clone(), Arc::new(self.identity()))
    }

    /// The signed-in user, or an error telling the caller how to sign in.
    pub async fn actor(&self, ws: &CliWorkspace) -> anyhow::Result<Actor> {
        if self.user.is_none() {
            anyhow::bail!("no user given: pass --as <username> or set CREWTRACK_USER");
        }
        ws.current_actor()
            .await
            .with_context(|| format!("cannot act as '{}'", self.user.as_deref().unwrap_or_default()))
    }

    /// Map a username to its account id.
    pub async fn user_id(&self, username: &str) -> anyhow::Result<String> {
        self.identity()
            .find_user(username)
            .await?
            .map(|account| account.id)
            .with_context(|| format!("user '{username}' not found"))
    }
}

/// Drive one async command to completion on a fresh runtime.
pub fn block_on<F, T>(fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    rt.block_on(fut)
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> anyhow::Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}': expected YYYY-MM-DD"))
}
