/// Counter for records read from a route's source topics
pub const RECORDS_RECEIVED: &str = "kafka_router_records_received_total";

/// Counter for records published to a route's destination topic
pub const RECORDS_FORWARDED: &str = "kafka_router_records_forwarded_total";

/// Counter for source records not forwarded, labelled by reason
pub const RECORDS_SKIPPED: &str = "kafka_router_records_skipped_total";

/// Counter for records dropped because the publish failed
pub const PUBLISH_FAILURES: &str = "kafka_router_publish_failures_total";

/// Counter for reference records, labelled by outcome (added/duplicate/invalid)
pub const REFERENCE_RECORDS: &str = "kafka_router_reference_records_total";

/// Gauge for the number of fingerprints remembered per route
pub const MATCH_STORE_FINGERPRINTS: &str = "kafka_router_match_store_fingerprints";

/// Gauge for the number of running route units
pub const ACTIVE_UNITS: &str = "kafka_router_active_units";
