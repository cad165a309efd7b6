use crate::routing::strategy::{Correlation, MatchStrategy};

/// One configured source-to-destination forwarding unit. Built once at
/// startup and never changed afterwards.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    source_topics: Vec<String>,
    destination_topic: String,
    reference_topics: Vec<String>,
    strategy: MatchStrategy,
}

impl Route {
    pub fn new(
        name: Option<String>,
        source_topics: Vec<String>,
        destination_topic: String,
        reference_topics: Vec<String>,
        strategy: MatchStrategy,
    ) -> Self {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{} -> {}", source_topics.join(","), destination_topic));

        Self {
            name,
            source_topics,
            destination_topic,
            reference_topics,
            strategy,
        }
    }

    /// Identifies the route in logs and metrics, and partitions the match store.
    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn source_topics(&self) -> &[String] {
        &self.source_topics
    }

    pub fn destination_topic(&self) -> &str {
        &self.destination_topic
    }

    pub fn reference_topics(&self) -> &[String] {
        &self.reference_topics
    }

    pub fn strategy(&self) -> &MatchStrategy {
        &self.strategy
    }

    /// The correlation strategy, when the route has reference topics to learn from.
    pub fn reference_correlation(&self) -> Option<&Correlation> {
        if self.reference_topics.is_empty() {
            return None;
        }
        self.strategy.as_correlation()
    }

    /// Lowercased display name, safe to embed in a consumer group id.
    pub fn slug(&self) -> String {
        slug(&self.name)
    }
}

pub fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | '.' => '-',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FieldPath;
    use crate::routing::strategy::AllowList;

    fn allow_all() -> MatchStrategy {
        MatchStrategy::AllowList(AllowList::new(FieldPath::parse("data.isn").unwrap(), []))
    }

    #[test]
    fn test_display_name_falls_back_to_topics() {
        let route = Route::new(
            None,
            vec!["orders".to_string(), "orders.eu".to_string()],
            "orders_routed".to_string(),
            vec![],
            allow_all(),
        );
        assert_eq!(route.display_name(), "orders,orders.eu -> orders_routed");

        let blank = Route::new(
            Some("  ".to_string()),
            vec!["a".to_string()],
            "b".to_string(),
            vec![],
            allow_all(),
        );
        assert_eq!(blank.display_name(), "a -> b");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Orders EU/Main.v2\\x"), "orders-eu-main-v2-x");
        assert_eq!(slug("plain"), "plain");
    }

    #[test]
    fn test_reference_correlation_requires_reference_topics() {
        let correlation =
            MatchStrategy::Correlation(Correlation::new(vec![FieldPath::parse("id").unwrap()]));

        let without = Route::new(
            Some("r".to_string()),
            vec!["src".to_string()],
            "dst".to_string(),
            vec![],
            correlation.clone(),
        );
        assert!(without.reference_correlation().is_none());

        let with = Route::new(
            Some("r".to_string()),
            vec!["src".to_string()],
            "dst".to_string(),
            vec!["ref".to_string()],
            correlation,
        );
        assert!(with.reference_correlation().is_some());

        let allow_list = Route::new(
            Some("r".to_string()),
            vec!["src".to_string()],
            "dst".to_string(),
            vec!["ref".to_string()],
            allow_all(),
        );
        assert!(allow_list.reference_correlation().is_none());
    }
}
