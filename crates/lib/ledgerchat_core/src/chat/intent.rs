//! Decides whether a user message needs QuickBooks data to answer.

/// Words that mark a message as being about accounting data.
pub const DATA_KEYWORDS: &[&str] = &[
    "invoice", "invoices", "bill", "bills", "payment", "payments", "customer", "customers", "due",
    "overdue", "balance",
];

/// Pluggable utterance → "needs data" strategy.
pub trait IntentClassifier: Send + Sync {
    fn is_data_relevant(&self, utterance: &str) -> bool;
}

impl<F> IntentClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_data_relevant(&self, utterance: &str) -> bool {
        self(utterance)
    }
}

/// Case-insensitive substring match against [`DATA_KEYWORDS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentClassifier;

impl IntentClassifier for KeywordIntentClassifier {
    fn is_data_relevant(&self, utterance: &str) -> bool {
        let lowered = utterance.to_lowercase();
        let relevant = DATA_KEYWORDS.iter().any(|kw| lowered.contains(kw));
        tracing::debug!(relevant, "classified utterance");
        relevant
    }
}
