//! `scopegate admit`: run the admission hook for one simulated connection.

use anyhow::{Context, Result, bail};
use scopegate_auth::{Admission, Authorizer, ConnectionRequest};
use scopegate_vfs::Vfs;

use crate::theme::Theme;

/// Result of a dry-run admission.
#[derive(Debug)]
pub(crate) struct DryRun {
    pub(crate) admission: Admission,
    /// Names seen when listing the requested directory, if accepted.
    pub(crate) listing: Option<Vec<String>>,
}

/// Admit a connection and optionally list `list_path` through its view.
pub(crate) async fn dry_run(
    authorizer: &Authorizer,
    origin: Option<&str>,
    url: &str,
    list_path: Option<&str>,
) -> Result<DryRun> {
    let admission = authorizer
        .admit(ConnectionRequest::new(origin, url))
        .await
        .context("admission failed")?;

    let listing = match (&admission, list_path) {
        (Admission::Accepted(init), Some(path)) => {
            let fs = &init.filesystem;
            let resolved = fs.resolve_path(path)?;
            let listing = fs
                .read_dir(&resolved)
                .await
                .with_context(|| format!("failed to list {path}"))?;
            Some(listing.names().into_iter().map(ToOwned::to_owned).collect())
        },
        _ => None,
    };

    Ok(DryRun { admission, listing })
}

/// Print the outcome; a refusal is an error exit.
pub(crate) async fn run_admit(
    authorizer: &Authorizer,
    origin: Option<&str>,
    url: &str,
    list_path: Option<&str>,
) -> Result<()> {
    let outcome = dry_run(authorizer, origin, url, list_path).await?;

    let init = match &outcome.admission {
        Admission::Refused(reason) => {
            println!("{}", Theme::refused(&reason.to_string()));
            bail!("connection refused");
        },
        Admission::Accepted(init) => init,
    };

    println!("{}", Theme::accepted());
    println!("  Root:  {}", init.grant.root().display());
    println!("  Paths: {}", init.grant.authorized_paths().join(", "));
    if let Some(subject) = init.grant.subject() {
        println!("  Subject: {subject}");
    }

    if let (Some(path), Some(names)) = (list_path, &outcome.listing) {
        println!();
        println!("{}", Theme::section(&format!("Listing of {path}:")));
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}
