// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use url::Url;

/// The focused site context when the UI runs as an injected popup.
/// Computed once at startup and immutable for the life of the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TabInfo {
    pub url: String,
    pub fav_icon_url: Option<String>,
    pub title: Option<String>,
}

/// Host-shell view of the browser's active tab.
pub trait TabProvider {
    fn active_tab(&self) -> Option<TabInfo>;
}

impl Session {
    /// Derives the session from the active tab. `None` when there is no tab
    /// or the tab's URL has no tuple origin (`about:`, `data:`, ...).
    pub fn from_active_tab(provider: &dyn TabProvider) -> Option<Session> {
        let tab = provider.active_tab()?;
        let origin = origin_of(&tab.url)?;
        Some(Session {
            origin,
            icon: tab.fav_icon_url,
            title: tab.title,
        })
    }
}

fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
