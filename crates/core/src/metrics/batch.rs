use crate::error::Result;

/// Never request more than this many series in one query, whatever the
/// server claims.
pub const UNLIMITED_CEILING: usize = 10_000;

/// Default for servers older than 6.5 or with an unparseable version
pub const LEGACY_DEFAULT: usize = 64;

/// Default for 6.5 and newer
pub const MODERN_DEFAULT: usize = 256;

/// Resolve the batch ceiling from the server's `maxQueryMetrics` option,
/// falling back to a version-inferred default when the option is unset or
/// unreadable.
pub fn batch_ceiling(option: Result<Option<i64>>, version: &str) -> usize {
    match option {
        Ok(Some(value)) if value < 0 => UNLIMITED_CEILING,
        Ok(Some(value)) => usize::try_from(value).unwrap_or(UNLIMITED_CEILING),
        Ok(None) => ceiling_for_version(version),
        Err(e) => {
            tracing::debug!("maxQueryMetrics unreadable ({}), inferring from version", e);
            ceiling_for_version(version)
        }
    }
}

/// Default ceiling for a `major.minor[.patch]` version string
pub fn ceiling_for_version(version: &str) -> usize {
    let mut parts = version.trim().split('.');
    let parsed = match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => major.parse::<u32>().ok().map(|major| (major, minor)),
        _ => None,
    };
    let Some((major, minor)) = parsed else {
        tracing::warn!(
            "vCenter returned an invalid version string: {:?}, using query size {}",
            version,
            LEGACY_DEFAULT
        );
        return LEGACY_DEFAULT;
    };

    tracing::debug!("vCenter version is {}", version);
    if major < 6 || (major == 6 && minor == "0") {
        LEGACY_DEFAULT
    } else {
        MODERN_DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_configured_value_wins() {
        assert_eq!(batch_ceiling(Ok(Some(128)), "5.5.0"), 128);
    }

    #[test]
    fn test_unlimited_is_capped() {
        assert_eq!(batch_ceiling(Ok(Some(-1)), "7.0.3"), UNLIMITED_CEILING);
    }

    #[test]
    fn test_unset_or_unreadable_uses_version() {
        assert_eq!(batch_ceiling(Ok(None), "6.0.0"), LEGACY_DEFAULT);
        assert_eq!(
            batch_ceiling(Err(CoreError::query("denied")), "6.7.0"),
            MODERN_DEFAULT
        );
    }

    #[test]
    fn test_version_inference() {
        assert_eq!(ceiling_for_version("5.5"), LEGACY_DEFAULT);
        assert_eq!(ceiling_for_version("6.0.0"), LEGACY_DEFAULT);
        assert_eq!(ceiling_for_version("6.5.0"), MODERN_DEFAULT);
        assert_eq!(ceiling_for_version("8.0.2"), MODERN_DEFAULT);
    }

    #[test]
    fn test_malformed_versions_are_conservative() {
        assert_eq!(ceiling_for_version(""), LEGACY_DEFAULT);
        assert_eq!(ceiling_for_version("7"), LEGACY_DEFAULT);
        assert_eq!(ceiling_for_version("vcsim.1"), LEGACY_DEFAULT);
    }
}
