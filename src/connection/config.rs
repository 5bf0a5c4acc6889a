//! Structured access to the property-style configuration consumed by the
//! connection manager. Values are read once per arm cycle so an operator can
//! retune scan behavior without restarting the stack.

/// List of properties read by the connection manager. Add new ones here as
/// they become necessary.
#[derive(Copy, Clone, Debug)]
pub enum Property {
    // bluetooth.core.le
    MinConnInterval,
    MaxConnInterval,
    ConnLatency,
    ConnSupervisionTimeout,
    DirectConnTimeoutMs,
    ConnScanIntervalFast,
    ConnScanWindowFast,
    ConnScanWindow2mFast,
    ConnScanWindowCodedFast,
    ConnScanIntervalSlow,
    ConnScanWindowSlow,
    // bluetooth.core.gap.le
    EnableBlePrivacy,
    OnlyInit1mPhy,
}

impl Property {
    /// The property key name and its default value.
    fn key_and_default(self) -> (&'static str, u32) {
        match self {
            Property::MinConnInterval => ("bluetooth.core.le.min_connection_interval", 0x0018),
            Property::MaxConnInterval => ("bluetooth.core.le.max_connection_interval", 0x0028),
            Property::ConnLatency => ("bluetooth.core.le.connection_latency", 0x0000),
            Property::ConnSupervisionTimeout => {
                ("bluetooth.core.le.connection_supervision_timeout", 0x01f4)
            }
            Property::DirectConnTimeoutMs => {
                ("bluetooth.core.le.direct_connection_timeout", 30 * 1000)
            }
            // Fast scan interval 30 ~ 60 ms (use 60) = 96 * 0.625
            Property::ConnScanIntervalFast => {
                ("bluetooth.core.le.connection_scan_interval_fast", 0x0060)
            }
            // Fast scan window 30 ms = 48 * 0.625
            Property::ConnScanWindowFast => {
                ("bluetooth.core.le.connection_scan_window_fast", 0x0030)
            }
            // 15 ms = 24 * 0.625
            Property::ConnScanWindow2mFast => {
                ("bluetooth.core.le.connection_scan_window_2m_fast", 0x0018)
            }
            Property::ConnScanWindowCodedFast => {
                ("bluetooth.core.le.connection_scan_window_coded_fast", 0x0018)
            }
            // Slow scan interval 1.28 s = 2048 * 0.625
            Property::ConnScanIntervalSlow => {
                ("bluetooth.core.le.connection_scan_interval_slow", 0x0800)
            }
            Property::ConnScanWindowSlow => {
                ("bluetooth.core.le.connection_scan_window_slow", 0x0030)
            }
            Property::EnableBlePrivacy => ("bluetooth.core.gap.le.privacy.enabled", 1),
            Property::OnlyInit1mPhy => {
                ("bluetooth.core.gap.le.conn.only_init_1m_phy.enabled", 0)
            }
        }
    }
}

/// Scan interval used while the system is suspended: 640 ms = 1024 * 0.625
pub const SCAN_INTERVAL_SYSTEM_SUSPEND: u16 = 0x0400;
/// Scan window used while the system is suspended: 11.25 ms = 18 * 0.625
pub const SCAN_WINDOW_SYSTEM_SUSPEND: u16 = 0x0012;

/// Get the u32 value for a property, falling back to its default if unset
/// or unparseable.
pub fn get_u32(property: Property) -> u32 {
    let (key, default_value) = property.key_and_default();
    std::env::var(key).ok().and_then(|value| value.parse().ok()).unwrap_or(default_value)
}

/// Get the u16 value for a property. Values are truncated, matching the
/// width of the HCI command fields they feed.
pub fn get_u16(property: Property) -> u16 {
    get_u32(property) as u16
}

/// Get the bool value for a property ("true"/"false" or "1"/"0").
pub fn get_bool(property: Property) -> bool {
    let (key, default_value) = property.key_and_default();
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default_value != 0,
    }
}

/// Validate connection parameters against the ranges the controller accepts
/// (interval 0x0006..=0x0C80, latency <= 0x01F3, supervision timeout
/// 0x000A..=0x0C80) and the supervision-timeout-vs-latency relationship:
/// the timeout in ms must exceed (1 + latency) * interval_max_ms * 2.
pub fn check_connection_parameters(
    conn_interval_min: u16,
    conn_interval_max: u16,
    conn_latency: u16,
    supervision_timeout: u16,
) -> bool {
    if conn_interval_min < 0x0006
        || conn_interval_min > 0x0C80
        || conn_interval_max < 0x0006
        || conn_interval_max > 0x0C80
        || conn_latency > 0x01F3
        || supervision_timeout < 0x000A
        || supervision_timeout > 0x0C80
    {
        return false;
    }

    // The interval unit is 1.25 ms and the timeout unit is 10 ms, so
    // comparing timeout * 8 against (1 + latency) * interval_max * 2 + 1
    // checks the relationship without leaving integer arithmetic.
    let supervision_timeout_min = (1 + conn_latency as u32) * conn_interval_max as u32 * 2 + 1;
    if (supervision_timeout as u32) * 8 < supervision_timeout_min
        || conn_interval_max < conn_interval_min
    {
        return false;
    }

    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_parameters_are_valid() {
        assert!(check_connection_parameters(
            get_u16(Property::MinConnInterval),
            get_u16(Property::MaxConnInterval),
            get_u16(Property::ConnLatency),
            get_u16(Property::ConnSupervisionTimeout),
        ));
    }

    #[test]
    fn test_interval_out_of_range() {
        assert!(!check_connection_parameters(0x0005, 0x0028, 0, 0x01f4));
        assert!(!check_connection_parameters(0x0018, 0x0C81, 0, 0x01f4));
    }

    #[test]
    fn test_interval_max_below_min() {
        assert!(!check_connection_parameters(0x0028, 0x0018, 0, 0x01f4));
    }

    #[test]
    fn test_latency_out_of_range() {
        assert!(!check_connection_parameters(0x0018, 0x0028, 0x01F4, 0x01f4));
    }

    #[test]
    fn test_supervision_timeout_out_of_range() {
        assert!(!check_connection_parameters(0x0018, 0x0028, 0, 0x0009));
        assert!(!check_connection_parameters(0x0018, 0x0028, 0, 0x0C81));
    }

    #[test]
    fn test_supervision_timeout_too_small_for_latency() {
        // timeout of 100 ms (0x000A) cannot cover 2 * (1 + 30) * 50 ms
        assert!(!check_connection_parameters(0x0018, 0x0028, 30, 0x000A));
    }
}
