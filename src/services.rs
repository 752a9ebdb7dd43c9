//! Service identification from banners and well-known port numbers.
//!
//! Pure lookups, no I/O: the same port and banner always yield the same label.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Label used when neither the banner nor the port number is recognized.
pub const UNKNOWN_SERVICE: &str = "Unknown";

/// Static map of well-known ports to service labels.
static PORT_SERVICES: LazyLock<HashMap<u16, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        (21, "FTP"),
        (22, "SSH"),
        (23, "Telnet"),
        (25, "SMTP"),
        (53, "DNS"),
        (80, "HTTP"),
        (110, "POP3"),
        (143, "IMAP"),
        (443, "HTTPS"),
        (445, "SMB"),
        (3306, "MySQL"),
        (3389, "RDP"),
        (5432, "PostgreSQL"),
        (6379, "Redis"),
        (8080, "HTTP-Proxy"),
        (8443, "HTTPS-Alt"),
        (27017, "MongoDB"),
    ])
});

/// A banner fingerprint: every fragment must appear for the rule to match.
struct BannerRule {
    all_of: &'static [&'static str],
    label: &'static str,
}

/// Banner fingerprints, checked in order; the first match wins.
const BANNER_RULES: &[BannerRule] = &[
    BannerRule { all_of: &["SSH-"], label: "SSH" },
    BannerRule { all_of: &["HTTP/"], label: "HTTP" },
    BannerRule { all_of: &["220", "FTP"], label: "FTP" },
    BannerRule { all_of: &["220", "SMTP"], label: "SMTP" },
    BannerRule { all_of: &["PONG"], label: "Redis" },
    BannerRule { all_of: &["mysql"], label: "MySQL" },
    BannerRule { all_of: &["PostgreSQL"], label: "PostgreSQL" },
    BannerRule { all_of: &["MongoDB"], label: "MongoDB" },
];

/// Look up the label registered for a port, if any.
pub fn get_service_name(port: u16) -> Option<&'static str> {
    PORT_SERVICES.get(&port).copied()
}

/// Port-number default label, `"Unknown"` for unregistered ports.
pub fn default_service(port: u16) -> &'static str {
    get_service_name(port).unwrap_or(UNKNOWN_SERVICE)
}

/// Match a banner against the known fingerprints.
pub fn identify_banner(banner: &str) -> Option<&'static str> {
    BANNER_RULES
        .iter()
        .find(|rule| rule.all_of.iter().all(|frag| banner.contains(frag)))
        .map(|rule| rule.label)
}

/// Identify the service on a port from its banner, falling back to the port table.
pub fn identify(port: u16, banner: &str) -> &'static str {
    if banner.is_empty() {
        return default_service(port);
    }
    identify_banner(banner).unwrap_or_else(|| default_service(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_ports() {
        assert_eq!(get_service_name(22), Some("SSH"));
        assert_eq!(get_service_name(8080), Some("HTTP-Proxy"));
        assert_eq!(get_service_name(27017), Some("MongoDB"));
    }

    #[test]
    fn test_unknown_port() {
        assert_eq!(get_service_name(12345), None);
        assert_eq!(default_service(12345), "Unknown");
        assert_eq!(identify(12345, ""), "Unknown");
    }

    #[test]
    fn test_banner_beats_port() {
        assert_eq!(identify(2222, "SSH-2.0-OpenSSH_8.9"), "SSH");
        assert_eq!(identify(22, "HTTP/1.1 200 OK"), "HTTP");
        assert_eq!(identify(6380, "+PONG"), "Redis");
        assert_eq!(identify(2121, "220 ProFTPD FTP server ready"), "FTP");
        assert_eq!(identify(2525, "220 mail.example.com ESMTP SMTP ready"), "SMTP");
    }

    #[test]
    fn test_rule_order_is_significant() {
        // Both an FTP greeting and an HTTP token: HTTP is checked first.
        assert_eq!(identify(21, "220 FTP HTTP/1.0"), "HTTP");
    }

    #[test]
    fn test_greeting_code_alone_is_not_enough() {
        assert_eq!(identify(2121, "220 welcome"), "Unknown");
        assert_eq!(identify(21, "220 welcome"), "FTP");
    }

    #[test]
    fn test_identify_is_deterministic() {
        let banner = "5.7.33-0ubuntu mysql_native_password";
        assert_eq!(identify(3307, banner), identify(3307, banner));
        assert_eq!(identify(3307, banner), "MySQL");
    }
}
