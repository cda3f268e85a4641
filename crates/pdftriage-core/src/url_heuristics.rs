use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::model::SuspicionReason;

/// TLDs that are free to register or easily confused with file names.
pub const SUSPICIOUS_TLDS: &[&str] = &[
    "tk", "ml", "ga", "cf", "gq", "xyz", "top", "zip", "mov", "click", "work", "loan", "country", "kim", "review",
];

pub const EXECUTABLE_EXTENSIONS: &[&str] = &[
    "exe", "scr", "bat", "cmd", "com", "pif", "msi", "msix", "ps1", "vbs", "vbe", "js", "jse", "wsf", "hta", "jar",
    "apk", "dmg", "pkg", "sh", "dll", "lnk",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlVerdict {
    pub suspicious: bool,
    pub reason: Option<SuspicionReason>,
}

impl UrlVerdict {
    const CLEAN: UrlVerdict = UrlVerdict { suspicious: false, reason: None };

    fn flagged(reason: SuspicionReason) -> Self {
        Self { suspicious: true, reason: Some(reason) }
    }
}

/// Classifies one hyperlink. The first matching rule wins: raw IP host,
/// then suspicious TLD, then executable target.
pub fn classify(url: &str) -> UrlVerdict {
    let parts = split_url(url.trim());
    if let Some(host) = parts.host.as_deref() {
        if is_ip_host(host) {
            return UrlVerdict::flagged(SuspicionReason::RawIpHost);
        }
        if has_suspicious_tld(host) {
            return UrlVerdict::flagged(SuspicionReason::SuspiciousTld);
        }
    }
    if targets_executable(parts.path) {
        return UrlVerdict::flagged(SuspicionReason::ExecutableTarget);
    }
    UrlVerdict::CLEAN
}

#[derive(Debug, PartialEq, Eq)]
struct UrlParts<'u> {
    scheme: Option<&'u str>,
    /// Lowercased, without userinfo, port, brackets or trailing dots.
    host: Option<String>,
    /// Without query or fragment.
    path: &'u str,
}

fn split_url(url: &str) -> UrlParts<'_> {
    let (scheme, rest) = split_scheme(url);
    let rest = &rest[..rest.find(['?', '#']).unwrap_or(rest.len())];
    // No scheme: treat `example.com/x` as authority-first, like a browser bar.
    let authority_first = scheme.is_none() || rest.starts_with("//");
    if !authority_first {
        return UrlParts { scheme, host: None, path: rest };
    }
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    UrlParts { scheme, host: host_of(authority), path }
}

fn split_scheme(url: &str) -> (Option<&str>, &str) {
    let Some(idx) = url.find(':') else {
        return (None, url);
    };
    let candidate = &url[..idx];
    let valid = candidate.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && candidate.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    // `host:8080/x` has no scheme, only a port.
    let is_port = url[idx + 1..].starts_with(|c: char| c.is_ascii_digit());
    if valid && !is_port {
        (Some(candidate), &url[idx + 1..])
    } else {
        (None, url)
    }
}

fn host_of(authority: &str) -> Option<String> {
    let hostport = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = if let Some(inner) = hostport.strip_prefix('[') {
        &inner[..inner.find(']')?]
    } else {
        hostport.split(':').next().unwrap_or(hostport)
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    (!host.is_empty()).then_some(host)
}

fn is_ip_host(host: &str) -> bool {
    parse_numeric_ipv4(host).is_some() || host.parse::<Ipv6Addr>().is_ok()
}

/// Reads an IPv4 host the way browsers do: one to four dot-separated parts,
/// each decimal, `0x` hex or leading-zero octal, the last part filling the
/// remaining bytes. `3221225994`, `0xc0.0x2.10` and `192.2.10` all resolve.
fn parse_numeric_ipv4(host: &str) -> Option<Ipv4Addr> {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    let numbers = parts.iter().map(|part| parse_ipv4_part(part)).collect::<Option<Vec<u64>>>()?;
    let (last, leading) = numbers.split_last()?;
    if leading.iter().any(|&n| n > 255) {
        return None;
    }
    let last_bits = 8 * (5 - numbers.len() as u32);
    if *last >= 1u64 << last_bits {
        return None;
    }
    let mut value = *last;
    for (i, n) in leading.iter().enumerate() {
        value |= n << (8 * (3 - i as u32));
    }
    u32::try_from(value).ok().map(Ipv4Addr::from)
}

fn parse_ipv4_part(part: &str) -> Option<u64> {
    let (digits, radix) = if let Some(hex) = part.strip_prefix("0x").or_else(|| part.strip_prefix("0X")) {
        (hex, 16)
    } else if part.len() > 1 && part.starts_with('0') {
        (&part[1..], 8)
    } else {
        (part, 10)
    };
    if digits.is_empty() {
        // `0x` alone is zero; an empty label is not a number.
        return (radix == 16).then_some(0);
    }
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

fn has_suspicious_tld(host: &str) -> bool {
    match host.rsplit_once('.') {
        Some((_, tld)) => SUSPICIOUS_TLDS.contains(&tld),
        None => false,
    }
}

fn targets_executable(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    let decoded = urlencoding::decode_binary(last.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);
    let last = decoded.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            EXECUTABLE_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_is_split_from_userinfo_port_and_path() {
        let parts = split_url("https://user:pw@Login.Example.COM.:8443/a/b.exe?x=1#frag");
        assert_eq!(parts.scheme, Some("https"));
        assert_eq!(parts.host.as_deref(), Some("login.example.com"));
        assert_eq!(parts.path, "/a/b.exe");
    }

    #[test]
    fn bracketed_ipv6_host_is_unwrapped() {
        let parts = split_url("http://[2001:db8::1]:8080/");
        assert_eq!(parts.host.as_deref(), Some("2001:db8::1"));
        assert!(is_ip_host("2001:db8::1"));
    }

    #[test]
    fn scheme_less_links_are_read_authority_first() {
        assert_eq!(split_url("example.tk/login").host.as_deref(), Some("example.tk"));
        assert_eq!(split_url("10.0.0.1:8080/x").host.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn opaque_schemes_have_no_host() {
        let parts = split_url("mailto:billing@example.tk");
        assert_eq!(parts.host, None);
        assert!(!classify("mailto:billing@example.tk").suspicious);
    }

    #[test]
    fn extension_rule_looks_at_the_last_segment_only() {
        assert!(targets_executable("/downloads/setup.EXE"));
        assert!(!targets_executable("/app.exe/readme"));
        assert!(!targets_executable("/.exe"));
        assert!(!targets_executable(""));
    }

    #[test]
    fn extension_is_read_after_percent_decoding() {
        assert!(targets_executable("/update.ex%65"));
        assert!(targets_executable("/a.exe%00%20"));
        assert!(!targets_executable("/dir%2Fsetup.exe%2Fnotes"));
    }

    #[test]
    fn numeric_ipv4_parts_fill_the_remaining_bytes() {
        assert_eq!(parse_numeric_ipv4("3221225994"), Some(Ipv4Addr::new(192, 0, 2, 10)));
        assert_eq!(parse_numeric_ipv4("10.1"), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(parse_numeric_ipv4("0x7f.1"), Some(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(parse_numeric_ipv4("4294967296"), None);
        assert_eq!(parse_numeric_ipv4("256.1.1.1"), None);
        assert_eq!(parse_numeric_ipv4("example.com"), None);
    }

    #[test]
    fn tld_must_match_a_whole_label() {
        assert!(has_suspicious_tld("free-prizes.tk"));
        assert!(!has_suspicious_tld("example.tko"));
        assert!(!has_suspicious_tld("tk"));
    }
}
