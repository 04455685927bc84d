use recruit_bot::bot::Bot;
use recruit_bot::channels::{ChannelManager, CliChannel, TelegramChannel};
use recruit_bot::config::BotConfig;
use recruit_bot::github::GitHubClient;
use recruit_bot::logging::{self, LoggingConfig};
use recruit_bot::lookup::EmailFinder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;

    let log_config = LoggingConfig::load(&config.log_config_path)?;
    let _log_guard = logging::init(&log_config);

    eprintln!("🤖 Recruit Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   GitHub API: {}", config.github.base_url);
    eprintln!(
        "   Pages: up to {} x {} per listing",
        config.github.max_pages, config.github.page_size
    );

    tracing::info!("Starting bot");

    let github = GitHubClient::new(&config.github)?;
    let finder = EmailFinder::new(github);

    let mut channels = ChannelManager::new();
    if let Some(telegram) = config.telegram {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if telegram.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                telegram.allowed_users.join(", ")
            }
        );
        channels.add(Box::new(TelegramChannel::new(
            telegram.bot_token,
            telegram.allowed_users,
        )?));
    }
    if config.cli_enabled {
        eprintln!("   CLI: enabled. Type a username or profile URL and press Enter.");
        channels.add(Box::new(CliChannel::new()));
    }
    eprintln!();

    Bot::new(finder, channels).run().await?;

    Ok(())
}
