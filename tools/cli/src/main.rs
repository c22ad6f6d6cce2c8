//! Trouprive CLI - command line host for an encrypted secrets vault.
//!
//! Items live in a JSON file. Every secret is encrypted on its own under
//! the master password, which is only ever held in memory.

mod store;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use store::VaultStore;
use trouprive_vault::{
    seal_verification, DecryptedContent, DecryptedItem, DecryptedView, ItemDraft, PasswordChange,
    PasswordCipher, SecretCipher, SessionAuthenticator, VaultConfig, VaultRekeyer,
};

#[derive(Parser)]
#[command(name = "trouprive-vault")]
#[command(about = "Trouprive - Encrypted secrets vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Vault file.
    #[arg(long, global = true, default_value = "vault.json")]
    vault: PathBuf,

    /// Configuration file (JSON).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty vault file.
    Init,

    /// Add an item to the vault.
    Add {
        #[command(subcommand)]
        item: AddItem,
    },

    /// List vault items.
    List {
        /// Decrypt and show item contents.
        #[arg(short, long)]
        reveal: bool,
    },

    /// Remove an item from the vault.
    Remove {
        /// Item id.
        id: String,
    },

    /// Change the master password.
    ChangePassword,

    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand)]
enum AddItem {
    /// Free-form secret text. The text is prompted for.
    Secret(ItemArgs),

    /// API key. The key is prompted for.
    ApiKey {
        #[command(flatten)]
        item: ItemArgs,

        /// Free-form notes.
        #[arg(long)]
        notes: Option<String>,
    },

    /// Website login. The password is prompted for.
    Login {
        #[command(flatten)]
        item: ItemArgs,

        /// Account username.
        #[arg(short, long)]
        username: String,
    },
}

#[derive(Args)]
struct ItemArgs {
    /// Item name.
    #[arg(short, long)]
    name: String,

    /// Associated website.
    #[arg(short, long)]
    website: Option<String>,
}

/// Everything a command needs to work on the vault.
struct Host {
    path: PathBuf,
    config: VaultConfig,
    cipher: Arc<dyn SecretCipher>,
    session: SessionAuthenticator,
}

impl Host {
    fn new(path: PathBuf, config: VaultConfig) -> Self {
        let cipher: Arc<dyn SecretCipher> = Arc::new(PasswordCipher::from_config(&config));
        let session = SessionAuthenticator::new(cipher.clone());
        Self {
            path,
            config,
            cipher,
            session,
        }
    }

    /// Prompt for the master password and verify it against the vault.
    async fn unlock(&self, store: &VaultStore) -> Result<()> {
        let password = prompt_password("Master password: ")?;
        self.unlock_with(&password, store).await
    }

    async fn unlock_with(&self, password: &str, store: &VaultStore) -> Result<()> {
        let verified = match (&store.verification, store.items.is_empty()) {
            (Some(record), _) => self.session.verify_with_record(password, record).await,
            (None, false) => {
                self.session
                    .verify_and_set_password(password, &store.items)
                    .await
            }
            (None, true) => bail!("No vault has been configured. Cannot verify password."),
        };
        if verified {
            return Ok(());
        }

        let reason = self
            .session
            .verification_error()
            .await
            .unwrap_or_else(|| "Invalid password.".to_string());
        bail!(reason)
    }

    /// Give files written without a verification record one, sealed under
    /// the unlocked session password.
    async fn ensure_verification(&self, store: &mut VaultStore) -> Result<()> {
        if store.verification.is_none() {
            let password = self.session.password().await?;
            store.verification =
                Some(seal_verification(self.cipher.as_ref(), password.as_str()).await?);
        }
        Ok(())
    }

    fn rekeyer(&self) -> VaultRekeyer {
        VaultRekeyer::from_config(self.cipher.clone(), &self.config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref())?;
    let host = Host::new(cli.vault, config);

    match cli.command {
        Commands::Init => cmd_init(&host).await,
        Commands::Add { item } => cmd_add(&host, item).await,
        Commands::List { reveal } => cmd_list(&host, reveal).await,
        Commands::Remove { id } => cmd_remove(&host, &id).await,
        Commands::ChangePassword => cmd_change_password(&host).await,
        Commands::Config => cmd_config(&host),
    }
}

fn load_config(path: Option<&Path>) -> Result<VaultConfig> {
    match path {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(VaultConfig::default()),
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Create an empty vault protected by a new master password.
async fn cmd_init(host: &Host) -> Result<()> {
    if host.path.exists() {
        bail!("Vault file {} already exists", host.path.display());
    }

    let password = prompt_password("New master password: ")?;
    let confirm = prompt_password("Confirm master password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let verification = host
        .session
        .set_initial_password(&password)
        .await
        .context("Failed to set master password")?;

    VaultStore {
        items: Vec::new(),
        verification: Some(verification),
    }
    .save(&host.path)?;
    info!("Created vault at {}", host.path.display());
    println!("Vault created.");

    Ok(())
}

/// Encrypt and store a new item.
async fn cmd_add(host: &Host, item: AddItem) -> Result<()> {
    let mut store = VaultStore::load(&host.path)?;
    host.unlock(&store).await?;

    let (args, content) = match item {
        AddItem::Secret(args) => {
            let text = prompt_password("Secret: ")?;
            (args, DecryptedContent::secret(text.as_str()))
        }
        AddItem::ApiKey { item, notes } => {
            let key = prompt_password("API key: ")?;
            (item, DecryptedContent::api_key(key.as_str(), notes))
        }
        AddItem::Login { item, username } => {
            let password = prompt_password("Login password: ")?;
            (
                item,
                DecryptedContent::login(username, Some(password.as_str().to_owned())),
            )
        }
    };

    let mut draft = ItemDraft::new(args.name, content);
    if let Some(website) = args.website {
        draft = draft.with_website(website);
    }

    let item = host.session.seal_item(&draft).await?;
    let id = item.id.clone();
    store.items.push(item);
    host.ensure_verification(&mut store).await?;
    store.save(&host.path)?;

    println!("Item added: {}", id);

    Ok(())
}

/// List items, decrypting them when asked.
async fn cmd_list(host: &Host, reveal: bool) -> Result<()> {
    let store = VaultStore::load(&host.path)?;

    if store.items.is_empty() {
        println!("Vault is empty.");
        return Ok(());
    }

    if !reveal {
        for item in &store.items {
            println!("  [{}] {} ({})", item.kind, item.name, item.id);
            if let Some(website) = &item.website {
                println!("         {}", website);
            }
        }
        return Ok(());
    }

    host.unlock(&store).await?;
    let mut view = DecryptedView::new(host.cipher.clone(), &host.config);
    let items = view.refresh(&host.session, &store.items).await?;

    for item in items {
        print_item(item);
    }

    Ok(())
}

fn print_item(item: &DecryptedItem) {
    println!("  [{}] {} ({})", item.kind, item.name, item.id);
    if let Some(website) = &item.website {
        println!("         Website:  {}", website);
    }

    match &item.content {
        DecryptedContent::Secret(text) => println!("         Secret:   {}", text.as_str()),
        DecryptedContent::ApiKey(entry) => {
            println!("         Key:      {}", entry.key);
            if let Some(notes) = &entry.notes {
                println!("         Notes:    {}", notes);
            }
        }
        DecryptedContent::Login(entry) => {
            println!("         Username: {}", entry.username);
            if let Some(password) = &entry.password {
                println!("         Password: {}", password);
            }
        }
    }
}

/// Remove an item by id.
async fn cmd_remove(host: &Host, id: &str) -> Result<()> {
    let mut store = VaultStore::load(&host.path)?;
    host.unlock(&store).await?;

    if !store.remove(id) {
        bail!("No item with id {}", id);
    }
    host.ensure_verification(&mut store).await?;
    store.save(&host.path)?;

    println!("Item removed: {}", id);

    Ok(())
}

/// Re-encrypt the whole vault under a new password.
async fn cmd_change_password(host: &Host) -> Result<()> {
    let store = VaultStore::load(&host.path)?;

    let current = prompt_password("Current password: ")?;
    host.unlock_with(&current, &store).await?;

    let new_password = prompt_password("New password: ")?;
    let confirm = prompt_password("Confirm new password: ")?;
    let change = PasswordChange::new(&current, &new_password, &confirm);

    let items = host
        .session
        .change_password(&change, &host.rekeyer(), &store.items)
        .await
        .context("Password has not been changed")?;

    let verification = seal_verification(host.cipher.as_ref(), change.new_password())
        .await
        .context("Password has not been changed")?;

    VaultStore {
        items,
        verification: Some(verification),
    }
    .save(&host.path)?;
    info!("Re-encrypted vault {}", host.path.display());
    println!("Password changed successfully!");

    Ok(())
}

/// Print the effective configuration.
fn cmd_config(host: &Host) -> Result<()> {
    println!("{}", host.config.to_json()?);
    Ok(())
}
