use pdftriage_core::{classify, SuspicionReason, UrlVerdict};

fn reason(url: &str) -> Option<SuspicionReason> {
    classify(url).reason
}

#[test]
fn raw_ipv4_host_is_suspicious() {
    let verdict = classify("http://192.0.2.10/pay");
    assert_eq!(verdict, UrlVerdict { suspicious: true, reason: Some(SuspicionReason::RawIpHost) });
}

#[test]
fn executable_target_is_suspicious() {
    assert_eq!(reason("http://example.com/update.exe"), Some(SuspicionReason::ExecutableTarget));
    assert_eq!(reason("https://cdn.example.com/a/b/Setup.MSI?download=1#now"), Some(SuspicionReason::ExecutableTarget));
}

#[test]
fn ordinary_link_is_clean() {
    let verdict = classify("https://example.com/invoice");
    assert!(!verdict.suspicious);
    assert_eq!(verdict.reason, None);
}

#[test]
fn first_matching_rule_wins() {
    assert_eq!(reason("http://10.1.2.3/tool.exe"), Some(SuspicionReason::RawIpHost));
    assert_eq!(reason("http://login.example.tk/tool.exe"), Some(SuspicionReason::SuspiciousTld));
}

#[test]
fn ipv6_and_ports_and_userinfo_are_handled() {
    assert_eq!(reason("http://[2001:db8::7]/"), Some(SuspicionReason::RawIpHost));
    assert_eq!(reason("https://admin@203.0.113.5:8443/login"), Some(SuspicionReason::RawIpHost));
    assert_eq!(reason("HTTP://Payments.Example.ZIP./"), Some(SuspicionReason::SuspiciousTld));
}

#[test]
fn query_and_fragment_do_not_count_as_path() {
    assert_eq!(reason("https://example.com/download?file=setup.exe"), None);
    assert_eq!(reason("https://example.com/page#section.js"), None);
}

#[test]
fn lookalike_numeric_hosts_are_not_ips() {
    assert_eq!(reason("http://192.0.2.300/"), None);
    assert_eq!(reason("http://1.2.3.4.5/"), None);
    assert_eq!(reason("http://0x1g.0.2.10/"), None);
    assert_eq!(reason("http://09.0.2.10/"), None);
}

#[test]
fn obfuscated_ipv4_forms_are_raw_ip_hosts() {
    // All of these are 192.0.2.10.
    for url in [
        "http://3221225994/",
        "http://0xc000020a/login",
        "http://0300.0.02.012/",
        "http://0xC0.0x0.0x2.0xA/",
        "http://192.0.522/",
        "http://192.522/",
    ] {
        assert_eq!(reason(url), Some(SuspicionReason::RawIpHost), "{url}");
    }
}

#[test]
fn percent_encoded_extensions_are_decoded() {
    assert_eq!(reason("http://example.com/update.ex%65"), Some(SuspicionReason::ExecutableTarget));
    assert_eq!(reason("http://example.com/a.exe%00"), Some(SuspicionReason::ExecutableTarget));
    assert_eq!(reason("http://example.com/setup%2Eexe"), Some(SuspicionReason::ExecutableTarget));
    assert_eq!(reason("http://example.com/report%2Epdf"), None);
}
