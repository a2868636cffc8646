//! Shared helpers for scopegate integration tests.

#![allow(dead_code)]

use std::path::Path;

use scopegate_auth::{Admission, Authorizer, ConnectionRequest, SessionInit};
use scopegate_config::{Config, parse_str, validate::validate};
use scopegate_test::{FileTree, base64_secret};
use scopegate_vfs::{ScopedVfs, Vfs};

pub const AUDIENCE: &str = "files.example:443";
pub const ORIGIN_A: &str = "https://a.example";
pub const ORIGIN_B: &str = "https://b.example";
pub const SECRET_A: &[u8] = b"secret-for-a";
pub const SECRET_B: &[u8] = b"secret-for-b";

/// A multi-tenant `[[origins]]` entry with an HMAC secret.
pub fn hmac_origin(pattern: &str, secret: &[u8], allowed_paths: &[&str]) -> String {
    let paths: Vec<String> = allowed_paths.iter().map(|p| format!("'{p}'")).collect();
    format!(
        "[[origins]]\npattern = '{pattern}'\nsecret = '{}'\nallowed_paths = [{}]\n",
        base64_secret(secret),
        paths.join(", ")
    )
}

/// A full validated config serving `root` with the given origin entries.
pub fn config(root: &Path, origins: &[String]) -> Config {
    let text = format!(
        "[server]\napp_host = '{AUDIENCE}'\nvirtual_root = '{}'\n\n{}",
        root.display(),
        origins.join("\n")
    );
    let config = parse_str(&text).unwrap();
    validate(&config).unwrap();
    config
}

/// The standard two-tenant authorizer over `tree`.
pub fn two_tenant_authorizer(tree: &FileTree) -> Authorizer {
    let config = config(
        tree.root(),
        &[
            hmac_origin("https://a\\.example", SECRET_A, &["client-a"]),
            hmac_origin("https://b\\.example", SECRET_B, &["client-b", "shared"]),
        ],
    );
    Authorizer::from_config(&config).unwrap()
}

pub fn request(origin: &str, token: &str) -> ConnectionRequest {
    ConnectionRequest::new(Some(origin), format!("/sftp?token={token}"))
}

pub async fn admit(authorizer: &Authorizer, origin: &str, token: &str) -> Admission {
    authorizer.admit(request(origin, token)).await.unwrap()
}

pub fn accepted(admission: Admission) -> SessionInit {
    match admission {
        Admission::Accepted(init) => init,
        Admission::Refused(reason) => panic!("expected acceptance, refused: {reason}"),
    }
}

/// Names in the listing of `path` as seen through `fs`.
pub async fn list(fs: &ScopedVfs, path: &str) -> Vec<String> {
    let resolved = fs.resolve_path(path).unwrap();
    fs.read_dir(&resolved)
        .await
        .unwrap()
        .names()
        .into_iter()
        .map(ToOwned::to_owned)
        .collect()
}
