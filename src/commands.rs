use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use crate::core::downloader::HttpTransport;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::http::build_http_client;
use crate::core::install::{InstallSummary, Installation, OptionalSelection};
use crate::core::profile::{InstallManifest, InstallerBundle, Side};
use crate::core::progress::{CancelToken, TracingProgress};
use crate::core::settings::InstallerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SideArg {
    Client,
    Server,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Client => Side::Client,
            SideArg::Server => Side::Server,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "installer")]
#[command(about = "Install a modded runtime profile into a launcher or server directory")]
pub struct Cli {
    /// Installer archive or unpacked profile directory
    #[arg(short, long)]
    pub installer: PathBuf,

    /// Install target (defaults to the settings file, then the launcher directory)
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "client")]
    pub side: SideArg,

    /// Optional library to install, by coordinate; repeatable
    #[arg(long = "select", value_name = "COORDINATE")]
    pub select: Vec<String>,

    /// Install every optional library
    #[arg(long, conflicts_with_all = ["select", "no_optionals"])]
    pub all_optionals: bool,

    /// Install no optional libraries
    #[arg(long, conflicts_with = "select")]
    pub no_optionals: bool,

    /// List the optional libraries and exit
    #[arg(long)]
    pub list_optionals: bool,

    /// JSON settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Java executable for JAR processors
    #[arg(long)]
    pub java: Option<PathBuf>,
}

impl Cli {
    fn selection(&self, manifest: &InstallManifest) -> InstallerResult<OptionalSelection> {
        if !self.select.is_empty() {
            OptionalSelection::from_names(manifest, &self.select)
        } else if self.all_optionals {
            Ok(OptionalSelection::all(manifest))
        } else if self.no_optionals {
            Ok(OptionalSelection::none())
        } else {
            Ok(OptionalSelection::defaults(manifest))
        }
    }

    fn settings(&self) -> InstallerResult<InstallerSettings> {
        let mut settings = InstallerSettings::load_or_default(self.settings.as_deref())?;
        if let Some(n) = self.concurrency {
            settings.concurrency = n;
        }
        if let Some(java) = &self.java {
            settings.java_path = java.clone();
        }
        Ok(settings)
    }
}

/// 0 on success, 2 when cancelled, 1 for every other failure.
pub fn exit_code<T>(result: &InstallerResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(InstallerError::Cancelled) => 2,
        Err(_) => 1,
    }
}

pub async fn execute(cli: Cli) -> i32 {
    if cli.list_optionals {
        let result = list_optionals(&cli).await;
        if let Err(e) = &result {
            error!("{}", e);
        }
        return exit_code(&result);
    }

    let result = install(&cli).await;
    match &result {
        Ok(summary) => println!("{}", summary.message()),
        Err(e) => eprintln!("{e}"),
    }
    exit_code(&result)
}

async fn list_optionals(cli: &Cli) -> InstallerResult<()> {
    let manifest = InstallerBundle::detect(&cli.installer).load_manifest().await?;
    for library in manifest.optionals() {
        let Some(info) = library.optional_info() else {
            continue;
        };
        let marker = if info.default_enabled { "*" } else { " " };
        println!("{} {}  {}", marker, library.artifact(), info.display_name);
        if !info.description.is_empty() {
            println!("      {}", info.description);
        }
    }
    Ok(())
}

pub async fn install(cli: &Cli) -> InstallerResult<InstallSummary> {
    let settings = cli.settings()?;
    let target = cli
        .target
        .clone()
        .unwrap_or_else(|| settings.target_or_default());

    let bundle = InstallerBundle::detect(&cli.installer);
    let manifest = bundle.load_manifest().await?;
    let selection = cli.selection(&manifest)?;
    info!(
        "{} of {} optional libraries selected",
        selection.len(),
        manifest.optionals().count()
    );

    let client = build_http_client(&settings.user_agent)?;
    let token = CancelToken::new();
    let installation = Installation::new(
        manifest,
        cli.side.into(),
        Arc::new(HttpTransport::new(client)),
        Arc::new(TracingProgress),
    )
    .with_bundle(Some(bundle))
    .with_settings(settings)
    .with_cancel_token(token.clone());

    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested, stopping after the current stage");
            token.cancel();
        }
    });

    let result = installation.run(&target, &selection).await;
    watcher.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selection_flags() {
        let cli = Cli::try_parse_from([
            "installer",
            "--installer",
            "forge-installer.jar",
            "--side",
            "server",
            "--select",
            "a:b:1",
            "--select",
            "c:d:2",
        ])
        .unwrap();
        assert_eq!(cli.side, SideArg::Server);
        assert_eq!(cli.select, vec!["a:b:1", "c:d:2"]);
        assert!(cli.target.is_none());
    }

    #[test]
    fn conflicting_optional_flags_are_rejected() {
        assert!(Cli::try_parse_from([
            "installer",
            "-i",
            "x.jar",
            "--all-optionals",
            "--no-optionals"
        ])
        .is_err());
    }

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(&Ok::<(), InstallerError>(())), 0);
        assert_eq!(exit_code::<()>(&Err(InstallerError::Cancelled)), 2);
        assert_eq!(exit_code::<()>(&Err(InstallerError::Other("x".into()))), 1);
    }

    #[test]
    fn overrides_apply_on_top_of_settings() {
        let cli = Cli::try_parse_from([
            "installer",
            "-i",
            "x.jar",
            "--concurrency",
            "3",
            "--java",
            "/opt/jdk/bin/java",
        ])
        .unwrap();
        let settings = cli.settings().unwrap();
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.java_path, PathBuf::from("/opt/jdk/bin/java"));
    }
}
