use sekretarz_core::domain::conversation::{Role, Turn};

/// Token-bounded suffix of the conversation history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryWindow {
    token_limit: usize,
}

impl MemoryWindow {
    pub fn new(token_limit: usize) -> Self {
        Self { token_limit }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Newest turns that fit the budget. The latest user utterance is always kept,
    /// along with everything after it, even when that alone exceeds the budget.
    pub fn view<'a>(&self, history: &'a [Turn]) -> &'a [Turn] {
        let mut start = history.len();
        let mut used = 0usize;

        while start > 0 {
            let cost = history[start - 1].approx_tokens();
            if used + cost > self.token_limit {
                break;
            }
            used += cost;
            start -= 1;
        }

        if let Some(latest_user) = history.iter().rposition(|turn| turn.role == Role::User) {
            start = start.min(latest_user);
        }

        &history[start..]
    }
}
