//! Export/import URL construction for single- and multi-tenant endpoints.

use reqwest::Url;

use crate::error::{MigrateError, Result};

pub const NATIVE_EXPORT_PATH: &str = "api/v1/export/native";
pub const NATIVE_IMPORT_PATH: &str = "api/v1/import/native";

/// Source export URL. An empty tenant selects the single-tenant path.
pub fn export_url(src_addr: &str, tenant: &str) -> String {
    let addr = src_addr.trim_end_matches('/');
    if tenant.is_empty() {
        format!("{}/{}", addr, NATIVE_EXPORT_PATH)
    } else {
        format!("{}/select/{}/prometheus/{}", addr, tenant, NATIVE_EXPORT_PATH)
    }
}

/// Destination import URL with `extra_label` query parameters appended.
pub fn import_url(dst_addr: &str, tenant: &str, extra_labels: &[String]) -> Result<String> {
    let addr = dst_addr.trim_end_matches('/');
    let raw = if tenant.is_empty() {
        format!("{}/{}", addr, NATIVE_IMPORT_PATH)
    } else {
        format!("{}/insert/{}/prometheus/{}", addr, tenant, NATIVE_IMPORT_PATH)
    };
    let mut url = Url::parse(&raw).map_err(|e| {
        MigrateError::Config(format!("invalid destination address {:?}: {}", dst_addr, e))
    })?;
    add_extra_labels(&mut url, extra_labels)?;
    Ok(url.into())
}

/// Append one `extra_label=k=v` query parameter per label.
///
/// Every label must have the form `key=value` with a non-empty key.
fn add_extra_labels(url: &mut Url, extra_labels: &[String]) -> Result<()> {
    if extra_labels.is_empty() {
        return Ok(());
    }
    for label in extra_labels {
        validate_extra_label(label)?;
    }
    let mut query = url.query_pairs_mut();
    for label in extra_labels {
        query.append_pair("extra_label", label);
    }
    Ok(())
}

/// Check that an extra label has the form `key=value`.
pub fn validate_extra_label(label: &str) -> Result<()> {
    match label.split_once('=') {
        Some((key, _)) if !key.trim().is_empty() => Ok(()),
        _ => Err(MigrateError::Config(format!(
            "bad format for extra label {:?}: expected key=value",
            label
        ))),
    }
}
