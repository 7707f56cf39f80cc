use crate::{config::Session, format};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, warn};

const LATEST_RELEASE_URL: &str = "https://api.github.com/repos/el2zay/freetranscli/releases/latest";
const NOTICE_INTERVAL: time::Duration = time::Duration::hours(12);

#[derive(Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Print a notice when a newer release exists, at most once every 12 hours.
///
/// Never fails the command it runs in front of.
pub fn notify_if_outdated(session: &mut Session) {
    let now = format::local_now();
    if !session.config.update_check
        || !notice_due(session.config.last_update_notice, now)
    {
        return;
    }
    let latest = match fetch_latest_tag() {
        Ok(tag) => tag,
        Err(err) => {
            warn!("unable to fetch the latest published version: {err:#}");
            return;
        }
    };
    if !is_newer(&latest, env!("CARGO_PKG_VERSION")) {
        debug!("running the latest version ({latest})");
        return;
    }

    println!(
        "A new version is available {} → {latest}\nRun '{} set' to manage update notices\n",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_NAME")
    );
    session.config.last_update_notice = Some(now);
    if let Err(err) = session.save() {
        warn!("failed to persist update notice time: {err}");
    }
}

fn fetch_latest_tag() -> Result<String> {
    let release = reqwest::blocking::Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(Duration::from_secs(5))
        .build()?
        .get(LATEST_RELEASE_URL)
        .send()
        .context("release request failed before response")?
        .error_for_status()?
        .json::<LatestRelease>()?;
    Ok(release.tag_name)
}

fn notice_due(last: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    last.is_none_or(|last| now - last >= NOTICE_INTERVAL)
}

/// Whether `candidate` is a strictly greater dotted version than `current`.
/// A leading `v` is ignored and non-numeric parts count as zero.
fn is_newer(candidate: &str, current: &str) -> bool {
    fn parts(version: &str) -> Vec<u64> {
        version
            .trim()
            .trim_start_matches('v')
            .split(['.', '-', '+'])
            .take(3)
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    }
    let (mut candidate, mut current) = (parts(candidate), parts(current));
    let len = candidate.len().max(current.len());
    candidate.resize(len, 0);
    current.resize(len, 0);
    candidate > current
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn versions_compare_numerically() {
        assert!(is_newer("v0.2.0", "0.1.0"));
        assert!(is_newer("1.10.0", "1.9.3"));
        assert!(is_newer("1.0.1", "1.0"));
        assert!(!is_newer("v0.1.0", "0.1.0"));
        assert!(!is_newer("0.0.9", "0.1.0"));
        assert!(!is_newer("garbage", "0.1.0"));
    }

    #[test]
    fn notice_is_throttled_to_twelve_hours() {
        let now = datetime!(2026-10-16 12:00:00 UTC);
        assert!(notice_due(None, now));
        assert!(notice_due(Some(datetime!(2026-10-16 00:00:00 UTC)), now));
        assert!(!notice_due(Some(datetime!(2026-10-16 00:00:01 UTC)), now));
    }
}
