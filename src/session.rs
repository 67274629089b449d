use std::collections::HashMap;

use futures_util::StreamExt;

use crate::dispatch::HostedProvider;
use crate::error::TierError;
use crate::health::StartupStatus;
use crate::prompts::{self, TIER_2_SYSTEM_PROMPT, TIER_3_SYSTEM_PROMPT};
use crate::router::{Route, Router};

/// Cache slot: one per tier, and one per provider for the commercial tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Raw,
    Guided,
    Anthropic,
    OpenAi,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Raw, Slot::Guided, Slot::Anthropic, Slot::OpenAi];
}

impl From<Route> for Slot {
    fn from(route: Route) -> Self {
        match route {
            Route::Raw => Slot::Raw,
            Route::Guided => Slot::Guided,
            Route::Commercial(HostedProvider::Anthropic) => Slot::Anthropic,
            Route::Commercial(HostedProvider::OpenAi) => Slot::OpenAi,
        }
    }
}

/// Last complete response per slot. Every write replaces a whole slot.
#[derive(Debug, Default)]
pub struct ResponseCache {
    slots: HashMap<Slot, String>,
}

impl ResponseCache {
    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn set(&mut self, slot: Slot, text: String) {
        self.slots.insert(slot, text);
    }

    pub fn clear_all(&mut self) {
        self.slots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Per-user interactive state: the prompt being edited, the last-sent prompt,
/// cached responses, and the editable system prompts.
///
/// `send` takes `&mut self`, so one session has at most one request in flight.
#[derive(Debug)]
pub struct Session {
    prompt: String,
    active_prompt: String,
    cache: ResponseCache,
    selected: Option<HostedProvider>,
    guided_system_prompt: String,
    commercial_system_prompt: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            prompt: String::new(),
            active_prompt: String::new(),
            cache: ResponseCache::default(),
            selected: Some(HostedProvider::Anthropic),
            guided_system_prompt: TIER_2_SYSTEM_PROMPT.to_string(),
            commercial_system_prompt: TIER_3_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Update the edited prompt. Cached responses are dropped as soon as it
    /// differs from the last-sent prompt.
    pub fn set_prompt(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.active_prompt && !self.cache.is_empty() {
            tracing::debug!("prompt changed, clearing cached responses");
            self.cache.clear_all();
        }
        self.prompt = text;
    }

    /// Load a preset prompt by title. Presets become the active prompt at once.
    pub fn use_preset(&mut self, title: &str) -> bool {
        let Some(text) = prompts::preset(title) else {
            return false;
        };
        self.prompt = text.to_string();
        self.active_prompt = text.to_string();
        self.cache.clear_all();
        true
    }

    pub fn cached(&self, slot: Slot) -> Option<&str> {
        self.cache.get(slot)
    }

    pub fn selected_provider(&self) -> Option<HostedProvider> {
        self.selected
    }

    pub fn select_provider(&mut self, provider: Option<HostedProvider>) {
        self.selected = provider;
    }

    pub fn system_prompt(&self, route: Route) -> Option<&str> {
        match route {
            Route::Raw => None,
            Route::Guided => Some(&self.guided_system_prompt),
            Route::Commercial(_) => Some(&self.commercial_system_prompt),
        }
    }

    /// Replace the editable system prompt for `route`. Tier 1 has none.
    pub fn set_system_prompt(&mut self, route: Route, text: impl Into<String>) {
        match route {
            Route::Raw => {}
            Route::Guided => self.guided_system_prompt = text.into(),
            Route::Commercial(_) => self.commercial_system_prompt = text.into(),
        }
    }

    /// Whether the send control for `route` is enabled.
    pub fn can_send(&self, route: Route, status: &StartupStatus) -> bool {
        if self.prompt.trim().is_empty() {
            return false;
        }
        match route {
            Route::Raw | Route::Guided => status.ollama_ready,
            Route::Commercial(p) => status.has_key(p),
        }
    }

    pub fn send_label(&self, route: Route) -> String {
        let verb = if self.cached(route.into()).is_some() {
            "Re-send"
        } else {
            "Send"
        };
        format!("{verb} to Tier {}", route.tier())
    }

    /// Send the current prompt on `route`, feeding each fragment to
    /// `on_fragment` as it arrives. The slot is written only after the stream
    /// drains without error; a failure leaves it as it was.
    pub async fn send<F>(
        &mut self,
        router: &Router,
        route: Route,
        mut on_fragment: F,
    ) -> Result<&str, TierError>
    where
        F: FnMut(&str),
    {
        self.active_prompt = self.prompt.clone();

        let mut tokens = router
            .route(route, &self.active_prompt, self.system_prompt(route))
            .await?;

        let mut text = String::new();
        while let Some(fragment) = tokens.next().await {
            let fragment = fragment?;
            on_fragment(&fragment);
            text.push_str(&fragment);
        }

        let slot = Slot::from(route);
        self.cache.set(slot, text);
        Ok(self.cache.get(slot).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> StartupStatus {
        StartupStatus {
            ollama_ready: true,
            ollama_error: String::new(),
            has_anthropic_key: true,
            has_openai_key: false,
        }
    }

    fn filled(session: &mut Session) {
        for slot in Slot::ALL {
            session.cache.set(slot, format!("{slot:?} answer"));
        }
    }

    #[test]
    fn changing_prompt_clears_every_slot() {
        let mut session = Session::new();
        session.set_prompt("first");
        session.active_prompt = "first".to_string();
        filled(&mut session);

        session.set_prompt("second");
        for slot in Slot::ALL {
            assert!(session.cached(slot).is_none(), "{slot:?} should be empty");
        }
    }

    #[test]
    fn same_prompt_keeps_cache() {
        let mut session = Session::new();
        session.set_prompt("first");
        session.active_prompt = "first".to_string();
        filled(&mut session);

        session.set_prompt("first");
        assert_eq!(session.cached(Slot::Raw), Some("Raw answer"));
    }

    #[test]
    fn missing_key_disables_slot_regardless_of_prompt() {
        let mut session = Session::new();
        session.set_prompt("I can't sleep");
        let status = ready();

        assert!(session.can_send(Route::Commercial(HostedProvider::Anthropic), &status));
        assert!(!session.can_send(Route::Commercial(HostedProvider::OpenAi), &status));
    }

    #[test]
    fn blank_prompt_or_offline_service_disables_local_tiers() {
        let mut session = Session::new();
        session.set_prompt("   ");
        assert!(!session.can_send(Route::Raw, &ready()));

        session.set_prompt("hello");
        let offline = StartupStatus {
            ollama_ready: false,
            ..ready()
        };
        assert!(!session.can_send(Route::Guided, &offline));
        assert!(session.can_send(Route::Guided, &ready()));
    }

    #[test]
    fn preset_becomes_active_prompt() {
        let mut session = Session::new();
        filled(&mut session);
        assert!(session.use_preset("Anxiety & Sleep"));
        assert!(session.prompt().starts_with("I can't stop worrying"));
        assert!(session.cached(Slot::Guided).is_none());
        assert!(!session.use_preset("nope"));
    }

    #[test]
    fn send_label_reflects_cache() {
        let mut session = Session::new();
        assert_eq!(session.send_label(Route::Raw), "Send to Tier 1");
        session.cache.set(Slot::Raw, "done".to_string());
        assert_eq!(session.send_label(Route::Raw), "Re-send to Tier 1");
    }

    #[test]
    fn raw_route_has_no_system_prompt() {
        let mut session = Session::new();
        session.set_system_prompt(Route::Raw, "ignored");
        session.set_system_prompt(Route::Guided, "be gentle");
        assert_eq!(session.system_prompt(Route::Raw), None);
        assert_eq!(session.system_prompt(Route::Guided), Some("be gentle"));
    }
}
