use chrono::Utc;
use uuid::Uuid;

/// Id prefixes for the records this crate creates.
pub const ROUTE_PREFIX: &str = "kml";
pub const STOP_PREFIX: &str = "kml_stop";
pub const RECORD_PREFIX: &str = "kml_import";

/// Returns `{prefix}_{unix millis}_{uuid v4, simple form}`.
pub fn next_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    format!("{prefix}_{millis}_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_prefixed() {
        let ids: HashSet<String> = (0..1000).map(|_| next_id(ROUTE_PREFIX)).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.starts_with("kml_")));
    }

    #[test]
    fn test_id_ends_with_random_uuid() {
        let id = next_id(RECORD_PREFIX);
        let rest = id.strip_prefix("kml_import_").unwrap();
        let (millis, suffix) = rest.split_once('_').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        let parsed = Uuid::parse_str(suffix).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(suffix.len(), 32);
    }
}
