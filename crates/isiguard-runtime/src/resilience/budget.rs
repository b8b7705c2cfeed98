//! Token budgets for LLM calls within one run.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::BudgetConfig;
use crate::pipeline::Collaborator;
use crate::providers::TokenUsage;

/// Token budget for one scope (a collaborator or the whole run).
pub struct TokenBudget {
    pub max_tokens: u32,
    used: AtomicU32,
}

impl TokenBudget {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    pub fn record(&self, tokens: u32) {
        // fetch_update only fails when the closure returns None, which it never does
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| Some(used.saturating_add(tokens)));
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used())
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }
}

/// Accumulated LLM usage for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    /// Calls that read from the prompt cache (Anthropic)
    pub cache_hits: u32,
    pub cache_creation_tokens: u32,
    pub cache_read_tokens: u32,
}

impl LlmUsage {
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.cache_creation_tokens += usage.cache_creation_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;

        if usage.cache_read_tokens > 0 {
            self.cache_hits += 1;
        }

        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens: input, output, cache write, cache read
        let (input_rate, output_rate, cache_write_rate, cache_read_rate) = match model {
            m if m.contains("sonnet-4-5") => (3.0, 15.0, 3.75, 0.3),
            m if m.contains("opus-4-5") => (5.0, 25.0, 6.25, 0.5),
            m if m.contains("haiku-4-5") => (1.0, 5.0, 1.25, 0.1),
            m if m.contains("gpt-4o-mini") => (0.15, 0.6, 0.0, 0.0),
            m if m.contains("gpt-4o") => (2.5, 10.0, 0.0, 0.0),
            _ => (3.0, 15.0, 3.75, 0.3),
        };

        let per_million = |tokens: u32, rate: f64| f64::from(tokens) / 1_000_000.0 * rate;

        per_million(usage.prompt_tokens, input_rate)
            + per_million(usage.completion_tokens, output_rate)
            + per_million(usage.cache_creation_tokens, cache_write_rate)
            + per_million(usage.cache_read_tokens, cache_read_rate)
    }
}

/// Per-collaborator and global budgets for one run.
pub struct BudgetTracker {
    budgets: HashMap<Collaborator, TokenBudget>,
    global_budget: TokenBudget,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    pub fn new(config: &BudgetConfig) -> Self {
        let budgets = HashMap::from([
            (Collaborator::Extraction, TokenBudget::new(config.extraction_max_tokens)),
            (Collaborator::Reasoning, TokenBudget::new(config.reasoning_max_tokens)),
        ]);

        Self {
            budgets,
            global_budget: TokenBudget::new(config.global_max_tokens),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    /// Collaborators without a budget of their own are bounded by the
    /// global budget only.
    pub fn can_afford(&self, collaborator: Collaborator, estimated_tokens: u32) -> bool {
        let own_ok = self
            .budgets
            .get(&collaborator)
            .map(|b| b.can_afford(estimated_tokens))
            .unwrap_or(true);

        own_ok && self.global_budget.can_afford(estimated_tokens)
    }

    pub fn record_usage(&self, collaborator: Collaborator, usage: &TokenUsage, model: &str) {
        let total = usage.total();

        if let Some(budget) = self.budgets.get(&collaborator) {
            budget.record(total);
        }
        self.global_budget.record(total);
        self.usage.write().add(usage, model);
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn remaining_global(&self) -> u32 {
        self.global_budget.remaining()
    }

    pub fn remaining(&self, collaborator: Collaborator) -> u32 {
        self.budgets
            .get(&collaborator)
            .map(|b| b.remaining())
            .unwrap_or_else(|| self.remaining_global())
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(&BudgetConfig::default())
    }
}
