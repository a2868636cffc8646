//! `scopegate check`: validate configuration and show the origin policy.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use scopegate_auth::Authorizer;
use scopegate_config::{Config, CredentialSource, ResolvedConfig, Tenancy};

use crate::theme::Theme;

/// One line of the origin policy as printed by `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OriginSummary {
    pub(crate) pattern: String,
    pub(crate) credential: &'static str,
    /// `None` when tokens are not restricted (single-tenant mode).
    pub(crate) allowed_paths: Option<Vec<String>>,
}

impl OriginSummary {
    /// Whether every connection from this origin will be refused.
    pub(crate) fn is_unusable(&self) -> bool {
        self.credential == "none"
            || self.allowed_paths.as_ref().is_some_and(Vec::is_empty)
    }
}

fn credential_kind(source: Option<CredentialSource<'_>>) -> &'static str {
    match source {
        Some(CredentialSource::Secret(_)) => "shared secret",
        Some(CredentialSource::PublicKey(_)) => "RSA public key",
        None => "none",
    }
}

/// The configured origins in matching order.
pub(crate) fn summarize(config: &Config) -> Vec<OriginSummary> {
    match config.tenancy() {
        Some(Tenancy::Multi(origins)) => origins
            .iter()
            .map(|o| OriginSummary {
                pattern: o.pattern.clone(),
                credential: credential_kind(o.credential()),
                allowed_paths: Some(o.allowed_paths.clone()),
            })
            .collect(),
        Some(Tenancy::Single(section)) => {
            let credential = credential_kind(section.credential());
            section
                .allowed_origins
                .iter()
                .map(|pattern| OriginSummary {
                    pattern: pattern.clone(),
                    credential,
                    allowed_paths: None,
                })
                .collect()
        },
        None => Vec::new(),
    }
}

/// Build the authorizer (parsing every key) and print the policy.
pub(crate) async fn run_check(resolved: &ResolvedConfig) -> Result<()> {
    let config = &resolved.config;
    println!("{}", Theme::title("Scopegate configuration"));
    println!();

    let source = resolved
        .source
        .as_deref()
        .map_or_else(|| "environment only".to_owned(), |p| p.display().to_string());
    println!("  Source:       {source}");
    if resolved.env_fallbacks > 0 {
        println!(
            "  {}",
            Theme::note(&format!(
                "{} field(s) filled from environment variables",
                resolved.env_fallbacks
            ))
        );
    }
    println!("  Audience:     {}", config.server.app_host);
    println!("  Virtual root: {}", config.server.virtual_root.display());

    match tokio::fs::metadata(&config.server.virtual_root).await {
        Ok(meta) if meta.is_dir() => {},
        Ok(_) => bail!(
            "virtual root {} is not a directory",
            config.server.virtual_root.display()
        ),
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "virtual root {} is not accessible",
                    config.server.virtual_root.display()
                )
            });
        },
    }

    let authorizer =
        Authorizer::from_config(config).context("failed to build the origin policy")?;
    let mode = if authorizer.resolver().path_policy().is_some() {
        "multi-tenant"
    } else {
        "single-tenant"
    };

    println!();
    println!(
        "{}",
        Theme::section(&format!("Origins ({mode}, first match wins):"))
    );
    let summaries = summarize(config);
    for (index, summary) in summaries.iter().enumerate() {
        println!(
            "  {}. {}  [{}]",
            index.saturating_add(1),
            summary.pattern.bold(),
            summary.credential
        );
        println!(
            "     allowed paths: {}",
            Theme::allowed_paths(summary.allowed_paths.as_deref())
        );
    }

    let unusable = summaries.iter().filter(|s| s.is_unusable()).count();
    println!();
    if unusable > 0 {
        println!(
            "{}",
            Theme::caution(&format!(
                "{unusable} origin(s) will refuse every connection (missing credential or allowed paths)"
            ))
        );
    } else {
        println!("{}", Theme::passed("Configuration is valid"));
    }
    Ok(())
}
